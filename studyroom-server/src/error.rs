use std::path::PathBuf;
use studyroom_core::RoomId;
use thiserror::Error;

/// Errors raised by the relay service itself.
///
/// Dropped signals are deliberately not represented here: the relay never
/// reports a failed delivery back to the sender.
#[derive(Error, Debug)]
pub enum RelayError {
    /// The relay task is gone, no further commands can be processed.
    #[error("Relay task has stopped")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors from the session lookup collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("Unknown session {0}")]
    UnknownSession(RoomId),

    #[error("{user} is not booked into session {room}")]
    NotBooked { user: String, room: RoomId },

    #[error("Session directory unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Session {0} is listed more than once")]
    DuplicateSession(RoomId),
}
