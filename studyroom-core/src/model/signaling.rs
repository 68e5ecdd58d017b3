use crate::model::participant::ParticipantId;
use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

/// A negotiation message travelling from one participant to another.
///
/// `payload` is opaque to the relay: SDP blobs, candidate objects or anything
/// a future negotiation scheme needs are forwarded without inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub kind: SignalKind,
    pub room: RoomId,
    pub from: ParticipantId,
    pub to: ParticipantId,
    pub payload: Value,
}

impl Signal {
    pub fn new(
        kind: SignalKind,
        room: RoomId,
        from: ParticipantId,
        to: ParticipantId,
        payload: Value,
    ) -> Self {
        Self {
            kind,
            room,
            from,
            to,
            payload,
        }
    }
}
