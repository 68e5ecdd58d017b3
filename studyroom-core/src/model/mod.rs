mod broadcast;
mod participant;
mod protocol;
mod room;
mod session;
mod signaling;

pub use broadcast::{BroadcastEvent, ChatMessage, DrawSegment, FileAnnouncement, Point};
pub use participant::{Identity, ParticipantId};
pub use protocol::{ClientMessage, ServerMessage};
pub use room::RoomId;
pub use session::SessionInfo;
pub use signaling::{IceServerConfig, Signal, SignalKind};
