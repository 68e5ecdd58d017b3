use tokio::sync::oneshot;

use crate::room::RegistrySnapshot;
use studyroom_core::{BroadcastEvent, Identity, ParticipantId, RoomId, SessionInfo, Signal};

/// Commands fed to the relay actor by connection tasks.
#[derive(Debug)]
pub enum RelayCommand {
    /// The participant passed the session lookup and enters `room`.
    Join {
        participant: ParticipantId,
        room: RoomId,
        identity: Option<Identity>,
        session: SessionInfo,
    },

    Leave {
        participant: ParticipantId,
        room: RoomId,
    },

    /// Offer, answer or candidate to forward to `signal.to`.
    Signal(Signal),

    /// Chat, whiteboard or file event for everyone else in `room`.
    Broadcast {
        participant: ParticipantId,
        room: RoomId,
        event: BroadcastEvent,
    },

    /// The participant's socket is gone, however it ended.
    Disconnect { participant: ParticipantId },

    Snapshot {
        reply: oneshot::Sender<RegistrySnapshot>,
    },
}
