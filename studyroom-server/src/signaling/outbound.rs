use async_trait::async_trait;
use studyroom_core::{ParticipantId, ServerMessage};

/// Where the relay pushes frames destined for a participant.
///
/// Implemented by the live socket table in production and by recorders in tests.
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Queue `msg` on `participant`'s connection.
    ///
    /// Returns `false` when the participant has no live connection. Callers
    /// treat that as a silent drop.
    async fn deliver(&self, participant: &ParticipantId, msg: ServerMessage) -> bool;
}
