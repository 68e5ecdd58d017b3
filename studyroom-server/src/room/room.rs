use std::collections::HashMap;
use std::time::Instant;

use studyroom_core::{Identity, ParticipantId, RoomId, SessionInfo};

/// A member's entry inside a room.
#[derive(Debug, Clone)]
pub struct Member {
    pub identity: Option<Identity>,
    /// Position in the room's join order, used to list members deterministically.
    pub(crate) seq: u64,
}

/// Live membership of one tutoring session.
///
/// Rooms only know their members by id; everything that needs the member's
/// connection goes back through the registry and the connection table.
#[derive(Debug)]
pub struct Room {
    pub id: RoomId,
    pub session: SessionInfo,
    pub created_at: Instant,
    pub(crate) members: HashMap<ParticipantId, Member>,
    next_seq: u64,
}

impl Room {
    pub(crate) fn new(id: RoomId, session: SessionInfo) -> Self {
        Self {
            id,
            session,
            created_at: Instant::now(),
            members: HashMap::new(),
            next_seq: 0,
        }
    }

    pub(crate) fn insert(&mut self, participant: ParticipantId, identity: Option<Identity>) -> bool {
        if self.members.contains_key(&participant) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.members.insert(participant, Member { identity, seq });
        true
    }

    pub(crate) fn remove(&mut self, participant: &ParticipantId) -> bool {
        self.members.remove(participant).is_some()
    }

    pub fn contains(&self, participant: &ParticipantId) -> bool {
        self.members.contains_key(participant)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn identity_of(&self, participant: &ParticipantId) -> Option<&Identity> {
        self.members.get(participant).and_then(|m| m.identity.as_ref())
    }

    /// Members in join order.
    pub fn members(&self) -> Vec<ParticipantId> {
        let mut members: Vec<_> = self.members.iter().map(|(id, m)| (m.seq, *id)).collect();
        members.sort_unstable_by_key(|(seq, _)| *seq);
        members.into_iter().map(|(_, id)| id).collect()
    }

    /// Members in join order, without `participant`.
    pub fn others(&self, participant: &ParticipantId) -> Vec<ParticipantId> {
        self.members()
            .into_iter()
            .filter(|id| id != participant)
            .collect()
    }
}
