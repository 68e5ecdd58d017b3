use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::info;

use crate::config::ServerConfig;
use crate::directory::SessionDirectory;
use crate::error::RelayError;
use crate::relay::{Relay, RelayCommand};
use crate::room::RegistrySnapshot;
use crate::signaling::Connections;
use studyroom_core::IceServerConfig;

/// Cloneable front door to a running relay.
///
/// Built once at startup and handed to every connection handler as axum
/// state. Holds the command queue into the relay actor, the live connection
/// table and the session lookup used at join time.
#[derive(Clone)]
pub struct RelayHandle {
    command_tx: mpsc::Sender<RelayCommand>,
    connections: Connections,
    directory: Arc<dyn SessionDirectory>,
    ice_servers: Arc<Vec<IceServerConfig>>,
}

impl RelayHandle {
    /// Spawns the relay actor on the current runtime.
    pub fn spawn(config: &ServerConfig, directory: Arc<dyn SessionDirectory>) -> Self {
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer.max(1));
        let connections = Connections::new();

        let relay = Relay::new(command_rx, Arc::new(connections.clone()));
        tokio::spawn(relay.run());
        info!("Relay spawned");

        Self {
            command_tx,
            connections,
            directory,
            ice_servers: Arc::new(config.ice_servers.clone()),
        }
    }

    pub async fn send(&self, cmd: RelayCommand) -> Result<(), RelayError> {
        self.command_tx
            .send(cmd)
            .await
            .map_err(|_| RelayError::Closed)
    }

    pub async fn snapshot(&self) -> Result<RegistrySnapshot, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.send(RelayCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| RelayError::Closed)
    }

    pub fn connections(&self) -> &Connections {
        &self.connections
    }

    pub fn directory(&self) -> &dyn SessionDirectory {
        self.directory.as_ref()
    }

    pub fn ice_servers(&self) -> Vec<IceServerConfig> {
        self.ice_servers.as_ref().clone()
    }
}
