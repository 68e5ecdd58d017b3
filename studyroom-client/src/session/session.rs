use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::board::Board;
use crate::config::ClientConfig;
use crate::error::{ClientError, MediaError};
use crate::media::{LocalMediaController, LocalStream, MediaDevices, MediaStatus};
use crate::peer::{ManagerIo, PeerConnectionManager, PeerEvent};
use crate::session::{SessionCommand, SessionEvent, SessionHandle, SessionSnapshot};
use crate::signaling::RelayConnection;
use crate::transport::{RtcTransportFactory, TransportFactory};
use studyroom_core::{BroadcastEvent, ClientMessage, ParticipantId, RoomId, ServerMessage};

const COMMAND_BUFFER: usize = 64;

pub type SessionEvents = mpsc::UnboundedReceiver<SessionEvent>;

/// One participant's side of a tutoring session.
///
/// Runs as a single task that owns the peer connection manager and
/// multiplexes relay frames, transport events, local media changes and
/// application commands. Device acquisition runs on its own task and
/// reports back, so a slow permission prompt never stalls signaling.
pub struct Session {
    relay: RelayConnection,
    manager: PeerConnectionManager,
    io: ManagerIo,
    media: LocalMediaController,
    media_rx: watch::Receiver<LocalStream>,
    board: watch::Sender<Board>,
    commands: mpsc::Receiver<SessionCommand>,
    events: mpsc::UnboundedSender<SessionEvent>,
    acquired_tx: mpsc::UnboundedSender<Result<MediaStatus, MediaError>>,
    acquired_rx: mpsc::UnboundedReceiver<Result<MediaStatus, MediaError>>,
    acquiring: bool,
    /// Cleared by leave, set again by the next join.
    wants_media: bool,
}

impl Session {
    /// Connects to the relay and starts a session with WebRTC transports.
    ///
    /// ICE servers come from the config when set, else from the relay's welcome.
    pub async fn connect(
        config: ClientConfig,
        devices: Arc<dyn MediaDevices>,
    ) -> Result<(SessionHandle, SessionEvents), ClientError> {
        let relay = RelayConnection::connect(&config).await?;
        let ice_servers = config
            .ice_servers
            .clone()
            .unwrap_or_else(|| relay.ice_servers().to_vec());

        let factory = Arc::new(RtcTransportFactory::new(ice_servers));
        Ok(Self::start(&config, relay, devices, factory))
    }

    /// Like [`connect`](Self::connect), with an explicit transport factory.
    pub async fn connect_with_transport(
        config: ClientConfig,
        devices: Arc<dyn MediaDevices>,
        factory: Arc<dyn TransportFactory>,
    ) -> Result<(SessionHandle, SessionEvents), ClientError> {
        let relay = RelayConnection::connect(&config).await?;
        Ok(Self::start(&config, relay, devices, factory))
    }

    fn start(
        config: &ClientConfig,
        relay: RelayConnection,
        devices: Arc<dyn MediaDevices>,
        factory: Arc<dyn TransportFactory>,
    ) -> (SessionHandle, SessionEvents) {
        let participant = relay.participant();
        let (manager, io) =
            PeerConnectionManager::new(participant, factory, config.glare, relay.sender());

        let media = LocalMediaController::new(devices);
        let media_rx = media.subscribe();
        let (board, board_rx) = watch::channel(Board::new());
        let (command_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (events, events_rx) = mpsc::unbounded_channel();
        let (acquired_tx, acquired_rx) = mpsc::unbounded_channel();

        let handle = SessionHandle::new(
            command_tx,
            participant,
            config.sender_name(),
            media.clone(),
            board_rx,
        );

        let session = Self {
            relay,
            manager,
            io,
            media,
            media_rx,
            board,
            commands,
            events,
            acquired_tx,
            acquired_rx,
            acquiring: false,
            wants_media: true,
        };
        tokio::spawn(session.run());

        (handle, events_rx)
    }

    fn participant(&self) -> ParticipantId {
        self.manager.local()
    }

    async fn run(mut self) {
        info!("Session {} started", self.participant());
        self.start_acquisition();

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(SessionCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd).await,
                },

                msg = self.relay.recv() => match msg {
                    Some(msg) => self.handle_server_message(msg).await,
                    None => {
                        warn!("Lost the relay connection");
                        self.emit(SessionEvent::Disconnected);
                        break;
                    }
                },

                Some(event) = self.io.link_events.recv() => {
                    self.manager.handle_link_event(event).await;
                }

                Some(event) = self.io.events.recv() => self.forward_peer_event(event),

                Ok(()) = self.media_rx.changed() => {
                    let stream = self.media_rx.borrow_and_update().clone();
                    self.manager.sync_local_media(&stream).await;
                }

                Some(result) = self.acquired_rx.recv() => self.on_acquired(result),
            }
        }

        self.leave_room().await;
        info!("Session {} finished", self.participant());
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Join(room) => {
                self.wants_media = true;
                self.start_acquisition();
                self.send(ClientMessage::JoinSession { room });
            }

            SessionCommand::Leave => self.leave_room().await,

            SessionCommand::Broadcast(event) => self.broadcast(event),

            SessionCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }

            // Handled by the run loop.
            SessionCommand::Shutdown => {}
        }
    }

    async fn handle_server_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::Welcome { .. } => debug!("Ignoring repeated welcome"),

            ServerMessage::SessionJoined {
                room,
                participants,
                session,
            } => {
                if self.manager.room() != Some(&room) {
                    self.board.send_replace(Board::new());
                }
                self.manager.joined_room(room.clone()).await;
                info!(
                    "Joined {} with {} other participant(s)",
                    room,
                    participants.len()
                );
                self.emit(SessionEvent::Joined {
                    room,
                    participants,
                    session,
                });
            }

            ServerMessage::JoinRejected { room, reason } => {
                warn!("Join of {} rejected: {}", room, reason);
                self.emit(SessionEvent::JoinRejected { room, reason });
            }

            ServerMessage::ParticipantJoined {
                room,
                participant,
                identity,
            } => {
                if !self.in_room(&room) {
                    return;
                }
                self.manager.participant_joined(participant).await;
                self.emit(SessionEvent::ParticipantJoined {
                    participant,
                    identity,
                });
            }

            ServerMessage::ParticipantLeft { room, participant } => {
                if !self.in_room(&room) {
                    return;
                }
                self.manager.participant_left(participant).await;
                self.emit(SessionEvent::ParticipantLeft { participant });
            }

            msg @ (ServerMessage::Offer { .. }
            | ServerMessage::Answer { .. }
            | ServerMessage::IceCandidate { .. }) => {
                if let Ok(signal) = msg.into_signal() {
                    self.manager.handle_signal(signal).await;
                }
            }

            msg @ (ServerMessage::ChatMessage { .. }
            | ServerMessage::WhiteboardDraw { .. }
            | ServerMessage::WhiteboardClear { .. }
            | ServerMessage::FileShared { .. }) => {
                if let Ok((room, from, event)) = msg.into_broadcast() {
                    self.on_broadcast(room, from, event);
                }
            }
        }
    }

    fn on_broadcast(&mut self, room: RoomId, from: ParticipantId, event: BroadcastEvent) {
        if !self.in_room(&room) {
            return;
        }
        self.board.send_modify(|board| board.apply(from, event.clone()));
        self.emit(SessionEvent::Broadcast { from, event });
    }

    /// Sends to the room and applies to our own board right away.
    fn broadcast(&mut self, event: BroadcastEvent) {
        let Some(room) = self.manager.room().cloned() else {
            warn!("Not in a room, dropping broadcast");
            return;
        };
        let local = self.participant();
        self.send(ClientMessage::broadcast(room, event.clone()));
        self.board.send_modify(|board| board.apply(local, event));
    }

    async fn leave_room(&mut self) {
        if let Some(room) = self.manager.room().cloned() {
            info!("Leaving {}", room);
            self.send(ClientMessage::LeaveSession { room });
            self.board.send_replace(Board::new());
        }
        self.manager.leave().await;
        self.wants_media = false;
        self.media.release_all();
    }

    fn start_acquisition(&mut self) {
        if self.acquiring || self.media.status().is_settled() {
            return;
        }
        self.acquiring = true;

        let media = self.media.clone();
        let done = self.acquired_tx.clone();
        tokio::spawn(async move {
            let _ = done.send(media.acquire().await);
        });
    }

    fn on_acquired(&mut self, result: Result<MediaStatus, MediaError>) {
        self.acquiring = false;

        if !self.wants_media {
            // Left before the devices answered.
            self.media.release_all();
            return;
        }

        let (status, message) = match result {
            Ok(MediaStatus::Pending) => {
                // Released mid-capture by a leave, and joined again since.
                self.start_acquisition();
                return;
            }
            Ok(MediaStatus::AudioOnly) => (
                MediaStatus::AudioOnly,
                "Camera unavailable, continuing with audio only".to_owned(),
            ),
            Ok(MediaStatus::Unavailable) => (
                MediaStatus::Unavailable,
                "No camera or microphone available".to_owned(),
            ),
            Ok(_) => return,
            Err(e) => (MediaStatus::Unavailable, e.to_string()),
        };
        self.emit(SessionEvent::MediaNotice { status, message });
    }

    fn forward_peer_event(&self, event: PeerEvent) {
        let event = match event {
            PeerEvent::StateChanged { remote, state } => {
                SessionEvent::LinkStateChanged { remote, state }
            }
            PeerEvent::Failed { remote, error } => SessionEvent::LinkFailed { remote, error },
            PeerEvent::RemoteTrack {
                remote,
                track_id,
                kind,
            } => SessionEvent::RemoteTrack {
                remote,
                track_id,
                kind,
            },
        };
        self.emit(event);
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            participant: self.participant(),
            room: self.manager.room().cloned(),
            links: self.manager.link_states(),
            pending_offers: self.manager.pending().len(),
            media: self.media.status(),
        }
    }

    fn in_room(&self, room: &RoomId) -> bool {
        let inside = self.manager.room() == Some(room);
        if !inside {
            debug!("Dropping frame for {}: not in that room", room);
        }
        inside
    }

    fn send(&self, msg: ClientMessage) {
        if self.relay.send(msg).is_err() {
            debug!("Relay connection closed, dropping outgoing frame");
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}
