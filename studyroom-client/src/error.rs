use thiserror::Error;

use crate::media::TrackKind;
use crate::peer::LinkState;
use studyroom_core::ParticipantId;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid relay url: {0}")]
    Url(#[from] url::ParseError),

    #[error("Relay connection failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Relay closed the connection before sending welcome")]
    NoWelcome,

    #[error("Timed out waiting for the relay")]
    Timeout,

    #[error("Session has stopped")]
    Closed,

    #[error("Invalid frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Media(#[from] MediaError),
}

/// Failures of the local capture devices.
///
/// None of these end a session: the controller degrades and the session
/// carries on with whatever media it has.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MediaError {
    #[error("Media unavailable: {0}")]
    Unavailable(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Expected a {expected} track, got {actual}")]
    WrongKind { expected: TrackKind, actual: TrackKind },

    #[error("Screen share already running")]
    ScreenShareActive,

    #[error("No screen share running")]
    NoScreenShare,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LinkError {
    /// Negotiation or connectivity failure reported by the transport.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid link transition {from:?} -> {to:?}")]
    InvalidTransition { from: LinkState, to: LinkState },

    #[error("Malformed signaling payload: {0}")]
    Payload(String),

    #[error("No link to {0}")]
    UnknownPeer(ParticipantId),
}

impl From<anyhow::Error> for LinkError {
    fn from(err: anyhow::Error) -> Self {
        Self::Transport(format!("{:#}", err))
    }
}
