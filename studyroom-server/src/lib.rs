//! WebSocket relay for live tutoring sessions.
//!
//! Participants connect to `/ws`, join a room named after their session and
//! then use the relay to exchange connection-setup signals pairwise and to fan
//! out chat, whiteboard and file-announcement events to the rest of the room.

mod app;
mod config;
mod directory;
mod error;
mod relay;
mod room;
mod signaling;

pub use app::*;
pub use config::*;
pub use directory::*;
pub use error::*;
pub use relay::*;
pub use room::*;
pub use signaling::*;
