use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;
use studyroom_core::{ClientMessage, IceServerConfig, ParticipantId, ServerMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A live socket to the relay.
///
/// Frames are written and read by two background tasks; callers talk to
/// them through channels, so the outgoing side can be cloned freely.
pub struct RelayConnection {
    participant: ParticipantId,
    ice_servers: Vec<IceServerConfig>,
    outgoing: mpsc::UnboundedSender<ClientMessage>,
    incoming: mpsc::UnboundedReceiver<ServerMessage>,
    reader: JoinHandle<()>,
}

impl RelayConnection {
    /// Connects and waits for the relay's `welcome`.
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let url = config.connect_url()?;
        let timeout = Duration::from_millis(config.connect_timeout_ms);

        let (stream, _) = tokio::time::timeout(timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| ClientError::Timeout)??;
        let (mut write, mut read) = stream.split();

        let welcome = tokio::time::timeout(timeout, next_server_message(&mut read))
            .await
            .map_err(|_| ClientError::Timeout)?;
        let (participant, ice_servers) = match welcome {
            Some(ServerMessage::Welcome {
                participant,
                ice_servers,
            }) => (participant, ice_servers),
            Some(other) => {
                warn!("Expected welcome from relay, got {:?}", other);
                return Err(ClientError::NoWelcome);
            }
            None => return Err(ClientError::NoWelcome),
        };
        info!("Connected to relay as {}", participant);

        let (outgoing, mut out_rx) = mpsc::unbounded_channel::<ClientMessage>();
        let (in_tx, incoming) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let json = match serde_json::to_string(&msg) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize {:?}: {}", msg, e);
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::text(json)).await {
                    error!("Failed to send to relay: {}", e);
                    break;
                }
            }
            let _ = write.close().await;
            debug!("Relay writer finished");
        });

        let reader = tokio::spawn(async move {
            while let Some(msg) = next_server_message(&mut read).await {
                if in_tx.send(msg).is_err() {
                    break;
                }
            }
            debug!("Relay reader finished");
        });

        Ok(Self {
            participant,
            ice_servers,
            outgoing,
            incoming,
            reader,
        })
    }

    pub fn participant(&self) -> ParticipantId {
        self.participant
    }

    /// ICE servers handed out by the relay.
    pub fn ice_servers(&self) -> &[IceServerConfig] {
        &self.ice_servers
    }

    /// A cloneable sender for outgoing frames.
    pub fn sender(&self) -> mpsc::UnboundedSender<ClientMessage> {
        self.outgoing.clone()
    }

    pub fn send(&self, msg: ClientMessage) -> Result<(), ClientError> {
        self.outgoing.send(msg).map_err(|_| ClientError::Closed)
    }

    /// Next frame from the relay, `None` once the socket is gone.
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        self.incoming.recv().await
    }
}

impl Drop for RelayConnection {
    fn drop(&mut self) {
        // The writer stops by itself once every sender is gone.
        self.reader.abort();
    }
}

async fn next_server_message(read: &mut SplitStream<WsStream>) -> Option<ServerMessage> {
    while let Some(frame) = read.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str(text.as_str()) {
                Ok(msg) => return Some(msg),
                Err(e) => warn!("Invalid frame from relay: {}", e),
            },
            Ok(Message::Close(_)) => {
                info!("Relay closed the connection");
                return None;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Relay socket error: {}", e);
                return None;
            }
        }
    }
    None
}
