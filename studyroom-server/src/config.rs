use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use crate::directory::{OpenDirectory, SessionDirectory, SessionEntry, StaticDirectory};
use crate::error::ConfigError;
use studyroom_core::IceServerConfig;
use studyroom_core::utils::default_ice_servers;

/// Relay configuration, usually read from a TOML file.
///
/// ```toml
/// bind = "0.0.0.0:3000"
///
/// [[ice_servers]]
/// urls = ["stun:stun.l.google.com:19302"]
///
/// [[sessions]]
/// id = "booking-1842"
/// title = "Calculus I"
/// tutor = "tutor-17"
/// learners = ["learner-3"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Handed to every participant in its `welcome` frame.
    #[serde(default = "default_ice_servers")]
    pub ice_servers: Vec<IceServerConfig>,

    /// Capacity of the relay's command queue.
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,

    /// Known sessions. When empty every room id is accepted.
    #[serde(default)]
    pub sessions: Vec<SessionEntry>,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_command_buffer() -> usize {
    256
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            ice_servers: default_ice_servers(),
            command_buffer: default_command_buffer(),
            sessions: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Builds the session lookup described by this config.
    pub fn directory(&self) -> Result<Arc<dyn SessionDirectory>, ConfigError> {
        if self.sessions.is_empty() {
            return Ok(Arc::new(OpenDirectory));
        }
        Ok(Arc::new(StaticDirectory::new(self.sessions.clone())?))
    }
}
