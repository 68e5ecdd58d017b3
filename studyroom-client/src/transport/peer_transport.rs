use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::LinkError;
use crate::media::{LocalTrack, TrackKind};
use studyroom_core::ParticipantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Connecting,
    Connected,
    /// Connectivity lost, may still recover on its own.
    Disconnected,
    Failed,
    Closed,
}

/// Events a transport raises on its own, outside any call into it.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// A local ICE candidate to trickle to the remote.
    LocalCandidate {
        remote: ParticipantId,
        payload: Value,
    },
    StateChanged {
        remote: ParticipantId,
        state: TransportState,
    },
    RemoteTrack {
        remote: ParticipantId,
        track_id: String,
        kind: TrackKind,
    },
}

impl LinkEvent {
    pub fn remote(&self) -> ParticipantId {
        match self {
            LinkEvent::LocalCandidate { remote, .. }
            | LinkEvent::StateChanged { remote, .. }
            | LinkEvent::RemoteTrack { remote, .. } => *remote,
        }
    }
}

/// The direct media path to one remote participant.
///
/// Session descriptions and candidates are opaque JSON values: they travel
/// through the relay as `payload` and are only interpreted here.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Creates an offer and installs it as the local description.
    async fn create_offer(&self) -> Result<Value, LinkError>;

    /// Installs a remote offer, rolling back a pending local offer if needed.
    async fn apply_offer(&self, offer: Value) -> Result<(), LinkError>;

    /// Creates an answer to the applied offer and installs it locally.
    async fn create_answer(&self) -> Result<Value, LinkError>;

    async fn apply_answer(&self, answer: Value) -> Result<(), LinkError>;

    async fn add_ice_candidate(&self, candidate: Value) -> Result<(), LinkError>;

    async fn add_track(&self, track: &LocalTrack) -> Result<(), LinkError>;

    async fn remove_track(&self, track: &LocalTrack) -> Result<(), LinkError>;

    /// Swaps `old` for `new` on the wire without renegotiating.
    ///
    /// Returns `false` when that is not possible here; the caller then
    /// removes `old`, adds `new` and renegotiates.
    async fn replace_track(&self, old: &LocalTrack, new: &LocalTrack) -> Result<bool, LinkError>;

    async fn close(&self) -> Result<(), LinkError>;
}

#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Opens a transport towards `remote` that reports into `events`.
    async fn create(
        &self,
        remote: ParticipantId,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Result<Arc<dyn PeerTransport>, LinkError>;
}
