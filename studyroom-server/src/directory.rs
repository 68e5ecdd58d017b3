use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{ConfigError, DirectoryError};
use studyroom_core::{Identity, RoomId, SessionInfo};

/// Booking lookup consulted once when a participant joins a room.
///
/// Identities are trusted as handed over by the upstream auth layer; the
/// directory only decides whether the session exists and who may attend it.
#[async_trait]
pub trait SessionDirectory: Send + Sync {
    async fn lookup(
        &self,
        room: &RoomId,
        identity: Option<&Identity>,
    ) -> Result<SessionInfo, DirectoryError>;
}

/// Admits every join and returns empty session metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenDirectory;

#[async_trait]
impl SessionDirectory for OpenDirectory {
    async fn lookup(
        &self,
        _room: &RoomId,
        _identity: Option<&Identity>,
    ) -> Result<SessionInfo, DirectoryError> {
        Ok(SessionInfo::default())
    }
}

/// A session entry as written in the server config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionEntry {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub tutor: Option<String>,
    #[serde(default)]
    pub learners: Vec<String>,
}

impl SessionEntry {
    fn roster_contains(&self, user_id: &str) -> bool {
        self.tutor.as_deref() == Some(user_id) || self.learners.iter().any(|l| l == user_id)
    }

    fn has_roster(&self) -> bool {
        self.tutor.is_some() || !self.learners.is_empty()
    }
}

/// Directory backed by a fixed list of sessions.
///
/// Unknown sessions are rejected. When a session lists a tutor or learners,
/// only those user ids may join it.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    sessions: HashMap<RoomId, SessionEntry>,
}

impl StaticDirectory {
    pub fn new(entries: Vec<SessionEntry>) -> Result<Self, ConfigError> {
        let mut sessions = HashMap::with_capacity(entries.len());
        for entry in entries {
            let id = RoomId::from(entry.id.clone());
            if sessions.insert(id.clone(), entry).is_some() {
                return Err(ConfigError::DuplicateSession(id));
            }
        }
        Ok(Self { sessions })
    }
}

#[async_trait]
impl SessionDirectory for StaticDirectory {
    async fn lookup(
        &self,
        room: &RoomId,
        identity: Option<&Identity>,
    ) -> Result<SessionInfo, DirectoryError> {
        let entry = self
            .sessions
            .get(room)
            .ok_or_else(|| DirectoryError::UnknownSession(room.clone()))?;

        if entry.has_roster() {
            let user = identity.map(|i| i.user_id.as_str()).unwrap_or("anonymous");
            if !entry.roster_contains(user) {
                return Err(DirectoryError::NotBooked {
                    user: user.to_owned(),
                    room: room.clone(),
                });
            }
        }

        Ok(SessionInfo {
            title: entry.title.clone(),
            tutor: entry.tutor.clone(),
            learners: entry.learners.clone(),
        })
    }
}
