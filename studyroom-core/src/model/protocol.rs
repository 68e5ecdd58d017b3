//! JSON frames exchanged over the relay socket.
//!
//! Every frame is an object tagged by `type`. Signaling frames carry an opaque
//! `payload`; broadcast frames carry one of the typed surface payloads.

use crate::model::broadcast::{BroadcastEvent, ChatMessage, DrawSegment, FileAnnouncement};
use crate::model::participant::{Identity, ParticipantId};
use crate::model::room::RoomId;
use crate::model::session::SessionInfo;
use crate::model::signaling::{IceServerConfig, Signal, SignalKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frames sent by a participant to the relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    JoinSession {
        room: RoomId,
    },
    LeaveSession {
        room: RoomId,
    },
    Offer {
        room: RoomId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<ParticipantId>,
        to: ParticipantId,
        payload: Value,
    },
    Answer {
        room: RoomId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<ParticipantId>,
        to: ParticipantId,
        payload: Value,
    },
    IceCandidate {
        room: RoomId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<ParticipantId>,
        to: ParticipantId,
        payload: Value,
    },
    ChatMessage {
        room: RoomId,
        payload: ChatMessage,
    },
    WhiteboardDraw {
        room: RoomId,
        payload: DrawSegment,
    },
    WhiteboardClear {
        room: RoomId,
    },
    FileShared {
        room: RoomId,
        payload: FileAnnouncement,
    },
}

impl ClientMessage {
    pub fn signal(kind: SignalKind, room: RoomId, to: ParticipantId, payload: Value) -> Self {
        match kind {
            SignalKind::Offer => Self::Offer {
                room,
                from: None,
                to,
                payload,
            },
            SignalKind::Answer => Self::Answer {
                room,
                from: None,
                to,
                payload,
            },
            SignalKind::IceCandidate => Self::IceCandidate {
                room,
                from: None,
                to,
                payload,
            },
        }
    }

    pub fn broadcast(room: RoomId, event: BroadcastEvent) -> Self {
        match event {
            BroadcastEvent::Chat(payload) => Self::ChatMessage { room, payload },
            BroadcastEvent::Draw(payload) => Self::WhiteboardDraw { room, payload },
            BroadcastEvent::Clear => Self::WhiteboardClear { room },
            BroadcastEvent::File(payload) => Self::FileShared { room, payload },
        }
    }

    pub fn room(&self) -> &RoomId {
        match self {
            Self::JoinSession { room }
            | Self::LeaveSession { room }
            | Self::Offer { room, .. }
            | Self::Answer { room, .. }
            | Self::IceCandidate { room, .. }
            | Self::ChatMessage { room, .. }
            | Self::WhiteboardDraw { room, .. }
            | Self::WhiteboardClear { room }
            | Self::FileShared { room, .. } => room,
        }
    }
}

/// Frames sent by the relay to a participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// First frame on every connection.
    Welcome {
        participant: ParticipantId,
        ice_servers: Vec<IceServerConfig>,
    },
    /// Sent to the joiner only, listing who was already present.
    SessionJoined {
        room: RoomId,
        participants: Vec<ParticipantId>,
        #[serde(default)]
        session: SessionInfo,
    },
    JoinRejected {
        room: RoomId,
        reason: String,
    },
    ParticipantJoined {
        room: RoomId,
        participant: ParticipantId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        identity: Option<Identity>,
    },
    ParticipantLeft {
        room: RoomId,
        participant: ParticipantId,
    },
    Offer {
        room: RoomId,
        from: ParticipantId,
        to: ParticipantId,
        payload: Value,
    },
    Answer {
        room: RoomId,
        from: ParticipantId,
        to: ParticipantId,
        payload: Value,
    },
    IceCandidate {
        room: RoomId,
        from: ParticipantId,
        to: ParticipantId,
        payload: Value,
    },
    ChatMessage {
        room: RoomId,
        from: ParticipantId,
        payload: ChatMessage,
    },
    WhiteboardDraw {
        room: RoomId,
        from: ParticipantId,
        payload: DrawSegment,
    },
    WhiteboardClear {
        room: RoomId,
        from: ParticipantId,
    },
    FileShared {
        room: RoomId,
        from: ParticipantId,
        payload: FileAnnouncement,
    },
}

impl ServerMessage {
    pub fn from_signal(signal: Signal) -> Self {
        let Signal {
            kind,
            room,
            from,
            to,
            payload,
        } = signal;
        match kind {
            SignalKind::Offer => Self::Offer {
                room,
                from,
                to,
                payload,
            },
            SignalKind::Answer => Self::Answer {
                room,
                from,
                to,
                payload,
            },
            SignalKind::IceCandidate => Self::IceCandidate {
                room,
                from,
                to,
                payload,
            },
        }
    }

    pub fn from_broadcast(room: RoomId, from: ParticipantId, event: BroadcastEvent) -> Self {
        match event {
            BroadcastEvent::Chat(payload) => Self::ChatMessage { room, from, payload },
            BroadcastEvent::Draw(payload) => Self::WhiteboardDraw { room, from, payload },
            BroadcastEvent::Clear => Self::WhiteboardClear { room, from },
            BroadcastEvent::File(payload) => Self::FileShared { room, from, payload },
        }
    }

    /// Splits a relayed signaling frame back into a [`Signal`].
    pub fn into_signal(self) -> Result<Signal, Self> {
        match self {
            Self::Offer {
                room,
                from,
                to,
                payload,
            } => Ok(Signal::new(SignalKind::Offer, room, from, to, payload)),
            Self::Answer {
                room,
                from,
                to,
                payload,
            } => Ok(Signal::new(SignalKind::Answer, room, from, to, payload)),
            Self::IceCandidate {
                room,
                from,
                to,
                payload,
            } => Ok(Signal::new(SignalKind::IceCandidate, room, from, to, payload)),
            other => Err(other),
        }
    }

    /// Splits a broadcast frame into `(room, sender, event)`.
    pub fn into_broadcast(self) -> Result<(RoomId, ParticipantId, BroadcastEvent), Self> {
        match self {
            Self::ChatMessage { room, from, payload } => {
                Ok((room, from, BroadcastEvent::Chat(payload)))
            }
            Self::WhiteboardDraw { room, from, payload } => {
                Ok((room, from, BroadcastEvent::Draw(payload)))
            }
            Self::WhiteboardClear { room, from } => Ok((room, from, BroadcastEvent::Clear)),
            Self::FileShared { room, from, payload } => {
                Ok((room, from, BroadcastEvent::File(payload)))
            }
            other => Err(other),
        }
    }
}
