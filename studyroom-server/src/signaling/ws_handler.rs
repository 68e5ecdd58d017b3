use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::error::RelayError;
use crate::relay::{RelayCommand, RelayHandle};
use studyroom_core::{
    BroadcastEvent, ClientMessage, Identity, ParticipantId, RoomId, ServerMessage, Signal,
    SignalKind,
};

/// Identity claim forwarded by the authenticating proxy in front of the relay.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    pub identity: Option<String>,
    pub name: Option<String>,
}

impl ConnectParams {
    fn into_identity(self) -> Option<Identity> {
        let identity = Identity::new(self.identity?);
        Some(match self.name {
            Some(name) => identity.with_display_name(name),
            None => identity,
        })
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(relay): State<RelayHandle>,
) -> impl IntoResponse {
    let identity = params.into_identity();

    ws.on_upgrade(move |socket| handle_socket(socket, identity, relay))
}

async fn handle_socket(socket: WebSocket, identity: Option<Identity>, relay: RelayHandle) {
    let participant = ParticipantId::new();
    info!(
        "New WebSocket connection: {} ({})",
        participant,
        identity.as_ref().map(Identity::label).unwrap_or("anonymous")
    );

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    relay.connections().insert(participant, tx);
    relay.connections().send(
        &participant,
        &ServerMessage::Welcome {
            participant,
            ice_servers: relay.ice_servers(),
        },
    );

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let relay = relay.clone();
        let identity = identity.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(client_msg) => {
                            if let Err(e) =
                                handle_client_message(&relay, participant, identity.as_ref(), client_msg)
                                    .await
                            {
                                error!("Relay died: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Invalid ClientMessage from {}: {:?}", participant, e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    // Runs on every exit path: clean close, socket error or writer failure.
    relay.connections().remove(&participant);
    let _ = relay.send(RelayCommand::Disconnect { participant }).await;
    info!("WebSocket disconnected: {}", participant);
}

/// Turns one inbound frame into a relay command.
///
/// Join requests are checked against the session directory here, on the
/// connection's own task, so a slow lookup never stalls the relay.
pub(crate) async fn handle_client_message(
    relay: &RelayHandle,
    participant: ParticipantId,
    identity: Option<&Identity>,
    msg: ClientMessage,
) -> Result<(), RelayError> {
    let cmd = match msg {
        ClientMessage::JoinSession { room } => {
            match relay.directory().lookup(&room, identity).await {
                Ok(session) => RelayCommand::Join {
                    participant,
                    room,
                    identity: identity.cloned(),
                    session,
                },
                Err(e) => {
                    warn!("Join of {} into {} rejected: {}", participant, room, e);
                    relay.connections().send(
                        &participant,
                        &ServerMessage::JoinRejected {
                            room,
                            reason: e.to_string(),
                        },
                    );
                    return Ok(());
                }
            }
        }

        ClientMessage::LeaveSession { room } => RelayCommand::Leave { participant, room },

        ClientMessage::Offer {
            room,
            from,
            to,
            payload,
        } => match signal_from(participant, SignalKind::Offer, room, from, to, payload) {
            Some(signal) => RelayCommand::Signal(signal),
            None => return Ok(()),
        },

        ClientMessage::Answer {
            room,
            from,
            to,
            payload,
        } => match signal_from(participant, SignalKind::Answer, room, from, to, payload) {
            Some(signal) => RelayCommand::Signal(signal),
            None => return Ok(()),
        },

        ClientMessage::IceCandidate {
            room,
            from,
            to,
            payload,
        } => match signal_from(participant, SignalKind::IceCandidate, room, from, to, payload) {
            Some(signal) => RelayCommand::Signal(signal),
            None => return Ok(()),
        },

        ClientMessage::ChatMessage { room, payload } => RelayCommand::Broadcast {
            participant,
            room,
            event: BroadcastEvent::Chat(payload),
        },

        ClientMessage::WhiteboardDraw { room, payload } => RelayCommand::Broadcast {
            participant,
            room,
            event: BroadcastEvent::Draw(payload),
        },

        ClientMessage::WhiteboardClear { room } => RelayCommand::Broadcast {
            participant,
            room,
            event: BroadcastEvent::Clear,
        },

        ClientMessage::FileShared { room, payload } => RelayCommand::Broadcast {
            participant,
            room,
            event: BroadcastEvent::File(payload),
        },
    };

    relay.send(cmd).await
}

/// The connection's own id is the sender. A different claimed `from` is dropped.
fn signal_from(
    participant: ParticipantId,
    kind: SignalKind,
    room: RoomId,
    claimed: Option<ParticipantId>,
    to: ParticipantId,
    payload: Value,
) -> Option<Signal> {
    if let Some(claimed) = claimed
        && claimed != participant
    {
        warn!(
            "{} sent {:?} claiming to be {}, dropping",
            participant, kind, claimed
        );
        return None;
    }
    Some(Signal::new(kind, room, participant, to, payload))
}
