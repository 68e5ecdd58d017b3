use std::sync::Arc;
use tokio::sync::mpsc;

use studyroom_client::{
    GlarePolicy, LinkState, LocalMediaController, LocalStream, LocalTrack, ManagerIo, MediaStatus,
    PeerConnectionManager, PeerEvent, TrackSource,
};
use studyroom_core::{ClientMessage, ParticipantId, RoomId, Signal, SignalKind};

use crate::utils::{FakeDevices, FakeTransport, FakeTransportFactory};

pub const ROOM: &str = "booking-1842";

/// One participant's manager with its channels, driven by hand.
pub struct Peer {
    pub id: ParticipantId,
    pub manager: PeerConnectionManager,
    pub io: ManagerIo,
    pub signals: mpsc::UnboundedReceiver<ClientMessage>,
    pub factory: Arc<FakeTransportFactory>,
}

impl Peer {
    pub fn new() -> Self {
        Self::with(FakeTransportFactory::new(), GlarePolicy::default())
    }

    pub fn with(factory: Arc<FakeTransportFactory>, glare: GlarePolicy) -> Self {
        Self::with_id(ParticipantId::new(), factory, glare)
    }

    pub fn with_id(
        id: ParticipantId,
        factory: Arc<FakeTransportFactory>,
        glare: GlarePolicy,
    ) -> Self {
        let (signals_tx, signals) = mpsc::unbounded_channel();
        let (manager, io) = PeerConnectionManager::new(id, factory.clone(), glare, signals_tx);
        Self {
            id,
            manager,
            io,
            signals,
            factory,
        }
    }

    /// Joins [`ROOM`] with settled audio and video.
    pub async fn ready(mut self) -> Self {
        self.manager.joined_room(RoomId::from(ROOM)).await;
        self.manager.sync_local_media(&full_stream()).await;
        self
    }

    pub fn state(&self, remote: &Peer) -> Option<LinkState> {
        self.manager.state(&remote.id)
    }

    pub fn transport(&self, remote: &Peer) -> Arc<FakeTransport> {
        self.factory
            .transport(&remote.id)
            .expect("no transport created")
    }

    /// Drains outgoing frames.
    pub fn outgoing(&mut self) -> Vec<ClientMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = self.signals.try_recv() {
            out.push(msg);
        }
        out
    }

    pub fn events(&mut self) -> Vec<PeerEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.io.events.try_recv() {
            out.push(event);
        }
        out
    }

    /// Feeds queued transport events back into the manager.
    pub async fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.io.link_events.try_recv() {
            self.manager.handle_link_event(event).await;
            handled += 1;
        }
        handled
    }

    pub async fn deliver(&mut self, from: ParticipantId, msgs: Vec<ClientMessage>) -> usize {
        let mut delivered = 0;
        for msg in msgs {
            if let Some(signal) = relayed(from, msg) {
                self.manager.handle_signal(signal).await;
                delivered += 1;
            }
        }
        delivered
    }
}

/// What the relay would forward for a signaling frame sent by `from`.
pub fn relayed(from: ParticipantId, msg: ClientMessage) -> Option<Signal> {
    match msg {
        ClientMessage::Offer {
            room, to, payload, ..
        } => Some(Signal::new(SignalKind::Offer, room, from, to, payload)),
        ClientMessage::Answer {
            room, to, payload, ..
        } => Some(Signal::new(SignalKind::Answer, room, from, to, payload)),
        ClientMessage::IceCandidate {
            room, to, payload, ..
        } => Some(Signal::new(SignalKind::IceCandidate, room, from, to, payload)),
        _ => None,
    }
}

/// Moves signals and transport events between two peers until both are quiet.
pub async fn exchange(a: &mut Peer, b: &mut Peer) {
    for _ in 0..50 {
        let mut moved = a.pump().await + b.pump().await;

        let from_a = a.outgoing();
        moved += b.deliver(a.id, from_a).await;
        let from_b = b.outgoing();
        moved += a.deliver(b.id, from_b).await;

        if moved == 0 {
            return;
        }
    }
    panic!("Peers never settled");
}

/// Has `a` offer to `b` and runs the exchange to completion.
pub async fn connect(a: &mut Peer, b: &mut Peer) {
    a.manager.participant_joined(b.id).await;
    exchange(a, b).await;
}

/// A peer in [`ROOM`] following a real media controller over `devices`.
pub async fn peer_with_media(
    factory: Arc<FakeTransportFactory>,
    devices: Arc<FakeDevices>,
) -> (Peer, LocalMediaController) {
    let media = LocalMediaController::new(devices);
    media.acquire().await.ok();

    let mut peer = Peer::with(factory, GlarePolicy::default());
    peer.manager.joined_room(RoomId::from(ROOM)).await;
    peer.manager.sync_local_media(&media.stream()).await;
    (peer, media)
}

pub fn full_stream() -> LocalStream {
    LocalStream {
        status: MediaStatus::Full,
        tracks: vec![
            LocalTrack::new(TrackSource::Microphone),
            LocalTrack::new(TrackSource::Camera),
        ],
    }
}

pub fn offers_in(msgs: &[ClientMessage]) -> Vec<ParticipantId> {
    msgs.iter()
        .filter_map(|msg| match msg {
            ClientMessage::Offer { to, .. } => Some(*to),
            _ => None,
        })
        .collect()
}
