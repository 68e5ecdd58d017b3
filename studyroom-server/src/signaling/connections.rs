use async_trait::async_trait;
use axum::extract::ws::Message;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::signaling::Outbound;
use studyroom_core::{ParticipantId, ServerMessage};

/// Live socket writers keyed by participant.
///
/// Connection tasks insert on accept and remove on close; the relay only
/// reads. Cloning shares the same table.
#[derive(Clone, Default)]
pub struct Connections {
    peers: Arc<DashMap<ParticipantId, mpsc::UnboundedSender<Message>>>,
}

impl Connections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, participant: ParticipantId, tx: mpsc::UnboundedSender<Message>) {
        self.peers.insert(participant, tx);
    }

    pub fn remove(&self, participant: &ParticipantId) {
        self.peers.remove(participant);
    }

    pub fn contains(&self, participant: &ParticipantId) -> bool {
        self.peers.contains_key(participant)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Serializes `msg` and queues it on the participant's writer.
    pub fn send(&self, participant: &ParticipantId, msg: &ServerMessage) -> bool {
        let Some(peer) = self.peers.get(participant) else {
            debug!("No live connection for {}, dropping frame", participant);
            return false;
        };

        match serde_json::to_string(msg) {
            Ok(json) => {
                if let Err(e) = peer.send(Message::Text(json.into())) {
                    error!("Failed to queue WS message for {}: {:?}", participant, e);
                    return false;
                }
                true
            }
            Err(e) => {
                error!("Failed to serialize server message: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl Outbound for Connections {
    async fn deliver(&self, participant: &ParticipantId, msg: ServerMessage) -> bool {
        self.send(participant, &msg)
    }
}
