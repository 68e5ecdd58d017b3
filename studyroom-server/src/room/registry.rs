use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use crate::room::room::Room;
use studyroom_core::{Identity, ParticipantId, RoomId, SessionInfo};

/// Result of a participant leaving a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub room: RoomId,
    pub participant: ParticipantId,
    /// Members still present, to be told `participant-left`.
    pub remaining: Vec<ParticipantId>,
    /// True when the room became empty and was deleted.
    pub room_closed: bool,
}

/// Result of a join.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    /// False when the participant was already a member of this room.
    pub newly_joined: bool,
    /// Members present before the participant, in join order.
    pub existing: Vec<ParticipantId>,
    /// Set when joining moved the participant out of another room.
    pub previous: Option<Departure>,
    pub session: SessionInfo,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub rooms: usize,
    pub participants: usize,
    pub room_sizes: BTreeMap<String, usize>,
}

/// In-memory arena of live rooms.
///
/// Owned by the relay actor; every method runs to completion without
/// suspension, so no locking is needed. None of the operations fail: joining
/// an unknown room creates it, leaving a room one is not in does nothing.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, Room>,
    placements: HashMap<ParticipantId, RoomId>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `participant` to `room`, creating the room on first join.
    ///
    /// A participant is in at most one room: joining a different room leaves
    /// the current one first. Joining the same room again changes nothing.
    pub fn join(
        &mut self,
        room_id: RoomId,
        participant: ParticipantId,
        identity: Option<Identity>,
        session: SessionInfo,
    ) -> JoinOutcome {
        let previous = match self.placements.get(&participant) {
            Some(current) if *current == room_id => {
                let room = &self.rooms[current];
                return JoinOutcome {
                    newly_joined: false,
                    existing: room.others(&participant),
                    previous: None,
                    session: room.session.clone(),
                };
            }
            Some(current) => {
                let current = current.clone();
                self.leave(&current, &participant)
            }
            None => None,
        };

        let room = self.rooms.entry(room_id.clone()).or_insert_with(|| {
            info!("Creating room {}", room_id);
            Room::new(room_id.clone(), session)
        });

        let existing = room.members();
        room.insert(participant, identity);
        self.placements.insert(participant, room_id);

        JoinOutcome {
            newly_joined: true,
            existing,
            previous,
            session: room.session.clone(),
        }
    }

    /// Removes `participant` from `room`, deleting the room once empty.
    pub fn leave(&mut self, room_id: &RoomId, participant: &ParticipantId) -> Option<Departure> {
        let room = self.rooms.get_mut(room_id)?;
        if !room.remove(participant) {
            debug!("{} is not a member of {}, ignoring leave", participant, room_id);
            return None;
        }
        self.placements.remove(participant);

        let remaining = room.members();
        let room_closed = room.is_empty();
        if room_closed {
            self.rooms.remove(room_id);
            info!("Room {} is empty, deleting", room_id);
        }

        Some(Departure {
            room: room_id.clone(),
            participant: *participant,
            remaining,
            room_closed,
        })
    }

    /// Removes `participant` from whichever room it is in.
    pub fn leave_all(&mut self, participant: &ParticipantId) -> Option<Departure> {
        let room_id = self.placements.get(participant)?.clone();
        self.leave(&room_id, participant)
    }

    pub fn room_of(&self, participant: &ParticipantId) -> Option<&RoomId> {
        self.placements.get(participant)
    }

    pub fn is_member(&self, room_id: &RoomId, participant: &ParticipantId) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|room| room.contains(participant))
    }

    pub fn members(&self, room_id: &RoomId) -> Vec<ParticipantId> {
        self.rooms
            .get(room_id)
            .map(Room::members)
            .unwrap_or_default()
    }

    pub fn room(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            rooms: self.rooms.len(),
            participants: self.placements.len(),
            room_sizes: self
                .rooms
                .values()
                .map(|room| (room.id.to_string(), room.len()))
                .collect(),
        }
    }
}
