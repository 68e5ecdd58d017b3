use tokio::sync::oneshot;

use crate::error::LinkError;
use crate::media::{MediaStatus, TrackKind};
use crate::peer::LinkState;
use studyroom_core::{BroadcastEvent, Identity, ParticipantId, RoomId, SessionInfo};

/// Requests from a [`SessionHandle`](crate::session::SessionHandle) to the session task.
#[derive(Debug)]
pub enum SessionCommand {
    Join(RoomId),
    Leave,
    Broadcast(BroadcastEvent),
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Shutdown,
}

/// Everything the application gets to see of a running session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Joined {
        room: RoomId,
        /// Members present before us. They will offer to us.
        participants: Vec<ParticipantId>,
        session: SessionInfo,
    },
    JoinRejected {
        room: RoomId,
        reason: String,
    },
    ParticipantJoined {
        participant: ParticipantId,
        identity: Option<Identity>,
    },
    ParticipantLeft {
        participant: ParticipantId,
    },
    LinkStateChanged {
        remote: ParticipantId,
        state: LinkState,
    },
    LinkFailed {
        remote: ParticipantId,
        error: LinkError,
    },
    RemoteTrack {
        remote: ParticipantId,
        track_id: String,
        kind: TrackKind,
    },
    /// Local capture is degraded. The session keeps running.
    MediaNotice {
        status: MediaStatus,
        message: String,
    },
    /// A broadcast from another member.
    Broadcast {
        from: ParticipantId,
        event: BroadcastEvent,
    },
    /// The relay connection is gone and the session has stopped.
    Disconnected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub participant: ParticipantId,
    pub room: Option<RoomId>,
    pub links: Vec<(ParticipantId, LinkState)>,
    pub pending_offers: usize,
    pub media: MediaStatus,
}

impl SessionSnapshot {
    /// Remotes with a connected link, in id order.
    pub fn connected(&self) -> Vec<ParticipantId> {
        self.links
            .iter()
            .filter(|(_, state)| *state == LinkState::Connected)
            .map(|(remote, _)| *remote)
            .collect()
    }
}
