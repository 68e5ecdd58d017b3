use std::collections::VecDeque;

use studyroom_core::ParticipantId;

/// Remotes that joined before local media settled, in arrival order.
#[derive(Debug, Default)]
pub struct PendingOfferQueue {
    queue: VecDeque<ParticipantId>,
}

impl PendingOfferQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if `remote` was already queued.
    pub fn push(&mut self, remote: ParticipantId) -> bool {
        if self.queue.contains(&remote) {
            return false;
        }
        self.queue.push_back(remote);
        true
    }

    pub fn remove(&mut self, remote: &ParticipantId) -> bool {
        let before = self.queue.len();
        self.queue.retain(|p| p != remote);
        self.queue.len() != before
    }

    pub fn contains(&self, remote: &ParticipantId) -> bool {
        self.queue.contains(remote)
    }

    /// Empties the queue.
    pub fn drain(&mut self) -> Vec<ParticipantId> {
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
