use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::LinkError;
use crate::media::{LocalStream, LocalTrack, TrackKind};
use crate::peer::{LinkState, PeerLink, PendingOfferQueue};
use crate::transport::{LinkEvent, PeerTransport, TransportFactory, TransportState};
use studyroom_core::{ClientMessage, ParticipantId, RoomId, Signal, SignalKind};

/// What to do with an inbound offer while our own offer to the same remote
/// is still unanswered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GlarePolicy {
    /// Apply the remote offer and answer it; our own offer is abandoned.
    #[default]
    LastOfferWins,
    /// The side with the lower participant id yields, the other side ignores
    /// the colliding offer and waits for its answer.
    Polite,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    StateChanged {
        remote: ParticipantId,
        state: LinkState,
    },
    /// Emitted right before the link is closed. Failed links are not retried.
    Failed {
        remote: ParticipantId,
        error: LinkError,
    },
    RemoteTrack {
        remote: ParticipantId,
        track_id: String,
        kind: TrackKind,
    },
}

/// Receiving ends of the manager's output channels.
pub struct ManagerIo {
    pub events: mpsc::UnboundedReceiver<PeerEvent>,
    /// Transport events, to be fed back through
    /// [`PeerConnectionManager::handle_link_event`].
    pub link_events: mpsc::UnboundedReceiver<LinkEvent>,
}

/// Owns every peer link of one local participant.
///
/// The existing member always initiates: a `participant-joined` makes this
/// side offer, while the newcomer waits for offers. Remotes that show up
/// before local media has settled are queued and offered to once it has.
/// Outgoing signaling goes to the relay through `signals`.
pub struct PeerConnectionManager {
    local: ParticipantId,
    room: Option<RoomId>,
    links: HashMap<ParticipantId, PeerLink>,
    pending: PendingOfferQueue,
    factory: Arc<dyn TransportFactory>,
    glare: GlarePolicy,
    local_tracks: Vec<LocalTrack>,
    media_ready: bool,
    signals: mpsc::UnboundedSender<ClientMessage>,
    events: mpsc::UnboundedSender<PeerEvent>,
    link_events: mpsc::UnboundedSender<LinkEvent>,
}

impl PeerConnectionManager {
    pub fn new(
        local: ParticipantId,
        factory: Arc<dyn TransportFactory>,
        glare: GlarePolicy,
        signals: mpsc::UnboundedSender<ClientMessage>,
    ) -> (Self, ManagerIo) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (link_events, link_events_rx) = mpsc::unbounded_channel();

        let manager = Self {
            local,
            room: None,
            links: HashMap::new(),
            pending: PendingOfferQueue::new(),
            factory,
            glare,
            local_tracks: Vec::new(),
            media_ready: false,
            signals,
            events,
            link_events,
        };

        let io = ManagerIo {
            events: events_rx,
            link_events: link_events_rx,
        };

        (manager, io)
    }

    pub fn local(&self) -> ParticipantId {
        self.local
    }

    pub fn room(&self) -> Option<&RoomId> {
        self.room.as_ref()
    }

    pub fn state(&self, remote: &ParticipantId) -> Option<LinkState> {
        self.links.get(remote).map(PeerLink::state)
    }

    pub fn link(&self, remote: &ParticipantId) -> Option<&PeerLink> {
        self.links.get(remote)
    }

    /// Every known link, closed ones included, ordered by remote id.
    pub fn link_states(&self) -> Vec<(ParticipantId, LinkState)> {
        let mut states: Vec<_> = self
            .links
            .iter()
            .map(|(remote, link)| (*remote, link.state()))
            .collect();
        states.sort_by_key(|(remote, _)| *remote);
        states
    }

    pub fn connected(&self) -> Vec<ParticipantId> {
        let mut remotes: Vec<_> = self
            .links
            .iter()
            .filter(|(_, link)| link.state() == LinkState::Connected)
            .map(|(remote, _)| *remote)
            .collect();
        remotes.sort();
        remotes
    }

    pub fn pending(&self) -> &PendingOfferQueue {
        &self.pending
    }

    pub fn is_media_ready(&self) -> bool {
        self.media_ready
    }

    /// Records the room this participant is now in.
    ///
    /// Members already present are not contacted; they offer to us.
    pub async fn joined_room(&mut self, room: RoomId) {
        if self.room.as_ref() == Some(&room) {
            return;
        }
        if self.room.is_some() {
            self.close_all("moved to another room").await;
        }
        info!("{} joined {}", self.local, room);
        self.room = Some(room);
    }

    pub async fn participant_joined(&mut self, remote: ParticipantId) {
        if remote == self.local {
            return;
        }

        match self.state(&remote) {
            // Signals may have created the link already.
            None | Some(LinkState::Idle) => {}
            Some(LinkState::Closed) => {
                self.links.remove(&remote);
            }
            Some(state) => {
                debug!("Already linked to {} ({:?})", remote, state);
                return;
            }
        }
        self.links
            .entry(remote)
            .or_insert_with(|| PeerLink::new(remote));

        if self.media_ready {
            self.send_offer(remote).await;
        } else if self.set_state(remote, LinkState::PendingLocalMedia) {
            self.pending.push(remote);
            debug!("Local media not ready, queued offer to {}", remote);
        }
    }

    pub async fn participant_left(&mut self, remote: ParticipantId) {
        self.close_link(remote, "participant left").await;
    }

    /// Closes every link and forgets the room and its links.
    pub async fn leave(&mut self) {
        self.close_all("left the room").await;
        self.room = None;
    }

    /// Handles an offer, answer or candidate relayed from a remote.
    pub async fn handle_signal(&mut self, signal: Signal) {
        if signal.to != self.local || signal.from == self.local {
            debug!(
                "Dropping {:?} from {} to {}: not addressed to {}",
                signal.kind, signal.from, signal.to, self.local
            );
            return;
        }
        if self.room.as_ref() != Some(&signal.room) {
            debug!(
                "Dropping {:?} from {} for {}: not in that room",
                signal.kind, signal.from, signal.room
            );
            return;
        }

        match signal.kind {
            SignalKind::Offer => self.on_offer(signal.from, signal.payload).await,
            SignalKind::Answer => self.on_answer(signal.from, signal.payload).await,
            SignalKind::IceCandidate => self.on_candidate(signal.from, signal.payload).await,
        }
    }

    pub async fn handle_link_event(&mut self, event: LinkEvent) {
        let remote = event.remote();
        let Some(link) = self.links.get_mut(&remote) else {
            debug!("Transport event for unknown link {}", remote);
            return;
        };
        if !link.state().is_live() {
            debug!("Transport event for {:?} link {}", link.state(), remote);
            return;
        }

        match event {
            LinkEvent::LocalCandidate { payload, .. } => {
                self.send_signal(SignalKind::IceCandidate, remote, payload);
            }

            LinkEvent::StateChanged {
                state: TransportState::Connected,
                ..
            } => {
                link.transport_connected = true;
                // Only the first negotiation completes on connectivity.
                // Renegotiations finish on their answer.
                if !link.has_connected()
                    && matches!(link.state(), LinkState::OfferSent | LinkState::Answered)
                    && self.set_state(remote, LinkState::Connected)
                {
                    self.renegotiate_if_needed(remote).await;
                }
            }

            LinkEvent::StateChanged {
                state: TransportState::Failed,
                ..
            } => {
                self.fail_link(remote, LinkError::Transport("connectivity failed".into()))
                    .await;
            }

            LinkEvent::StateChanged {
                state: TransportState::Closed,
                ..
            } => self.close_link(remote, "transport closed").await,

            LinkEvent::StateChanged { state, .. } => {
                debug!("Transport to {} is {:?}", remote, state);
            }

            LinkEvent::RemoteTrack { track_id, kind, .. } => {
                let _ = self.events.send(PeerEvent::RemoteTrack {
                    remote,
                    track_id,
                    kind,
                });
            }
        }
    }

    /// Follows the local stream.
    ///
    /// The first settled stream releases the queue of waiting offers, exactly
    /// once. Later changes are pushed to every live link: a replaced track is
    /// swapped in place when the transport can, anything else renegotiates.
    pub async fn sync_local_media(&mut self, stream: &LocalStream) {
        if !stream.status.is_settled() {
            // Released: the next settle starts over.
            if self.media_ready {
                debug!("Local media released, waiting for a new capture");
                self.media_ready = false;
                self.local_tracks.clear();
            }
            return;
        }

        let previous = std::mem::replace(&mut self.local_tracks, stream.tracks.clone());

        if !self.media_ready {
            self.media_ready = true;
            info!(
                "Local media ready ({:?}, {} track(s))",
                stream.status,
                stream.tracks.len()
            );
            // Links answered before media settled carry no local tracks yet.
            if !stream.tracks.is_empty() {
                self.apply_track_changes(&[], &[], &stream.tracks).await;
            }
            self.drain_pending().await;
            return;
        }

        let mut added: Vec<LocalTrack> = stream
            .tracks
            .iter()
            .filter(|t| !previous.contains(t))
            .cloned()
            .collect();
        let mut removed: Vec<LocalTrack> = previous
            .into_iter()
            .filter(|t| !stream.tracks.contains(t))
            .collect();

        let mut replaced = Vec::new();
        for kind in [TrackKind::Audio, TrackKind::Video] {
            let new = added.iter().position(|t| t.kind() == kind);
            let old = removed.iter().position(|t| t.kind() == kind);
            if let (Some(new), Some(old)) = (new, old) {
                replaced.push((removed.remove(old), added.remove(new)));
            }
        }

        if !(replaced.is_empty() && removed.is_empty() && added.is_empty()) {
            self.apply_track_changes(&replaced, &removed, &added).await;
        }
    }

    async fn drain_pending(&mut self) -> usize {
        let queued = self.pending.drain();
        if !queued.is_empty() {
            info!("Offering to {} queued participant(s)", queued.len());
        }
        for remote in &queued {
            if self.state(remote) == Some(LinkState::PendingLocalMedia) {
                self.send_offer(*remote).await;
            }
        }
        queued.len()
    }

    async fn on_offer(&mut self, remote: ParticipantId, offer: Value) {
        match self.implicit_link(remote) {
            state @ (LinkState::Failed | LinkState::Closed) => {
                debug!("Ignoring offer from {} on a {:?} link", remote, state);
                return;
            }
            LinkState::OfferSent => {
                if self.glare == GlarePolicy::Polite {
                    if self.local > remote {
                        debug!("Offer collision with {}: keeping our own offer", remote);
                        return;
                    }
                    // Our offer is dropped, so offer again once connected.
                    if let Some(link) = self.links.get_mut(&remote) {
                        link.needs_renegotiation = true;
                    }
                }
                debug!("Offer collision with {}: answering theirs", remote);
            }
            LinkState::PendingLocalMedia => {
                self.pending.remove(&remote);
            }
            _ => {}
        }

        let transport = match self.ensure_transport(remote).await {
            Ok(transport) => transport,
            Err(e) => return self.fail_link(remote, e).await,
        };
        if !self.set_state(remote, LinkState::OfferReceived) {
            return;
        }

        if let Err(e) = transport.apply_offer(offer).await {
            return self.fail_link(remote, e).await;
        }
        self.flush_candidates(remote, &transport).await;

        let answer = match transport.create_answer().await {
            Ok(answer) => answer,
            Err(e) => return self.fail_link(remote, e).await,
        };
        if !self.set_state(remote, LinkState::Answered) {
            return;
        }
        self.send_signal(SignalKind::Answer, remote, answer);

        // A renegotiation over a working transport raises no new connect event.
        let already_connected = self
            .links
            .get(&remote)
            .is_some_and(|link| link.transport_connected || link.has_connected());
        if already_connected && self.set_state(remote, LinkState::Connected) {
            self.renegotiate_if_needed(remote).await;
        }
    }

    async fn on_answer(&mut self, remote: ParticipantId, answer: Value) {
        let Some(link) = self.links.get(&remote) else {
            debug!("Answer from {} without a link", remote);
            return;
        };
        if link.state() != LinkState::OfferSent {
            debug!("Stale answer from {} in {:?}", remote, link.state());
            return;
        }
        let Some(transport) = link.transport.clone() else {
            return;
        };

        if let Err(e) = transport.apply_answer(answer).await {
            return self.fail_link(remote, e).await;
        }
        self.flush_candidates(remote, &transport).await;

        if self.set_state(remote, LinkState::Connected) {
            self.renegotiate_if_needed(remote).await;
        }
    }

    async fn on_candidate(&mut self, remote: ParticipantId, candidate: Value) {
        self.implicit_link(remote);
        let Some(link) = self.links.get_mut(&remote) else {
            return;
        };
        if !link.state().is_live() {
            debug!("Dropping candidate from {} on a {:?} link", remote, link.state());
            return;
        }

        match (&link.transport, link.remote_description_set) {
            (Some(transport), true) => {
                let transport = transport.clone();
                if let Err(e) = transport.add_ice_candidate(candidate).await {
                    warn!("Dropping candidate from {}: {}", remote, e);
                }
            }
            _ => {
                link.pending_candidates.push(candidate);
                debug!(
                    "Buffered candidate from {} ({} waiting)",
                    remote,
                    link.pending_candidates.len()
                );
            }
        }
    }

    /// Marks the remote description as applied and replays buffered candidates.
    async fn flush_candidates(&mut self, remote: ParticipantId, transport: &Arc<dyn PeerTransport>) {
        let buffered = match self.links.get_mut(&remote) {
            Some(link) => {
                link.remote_description_set = true;
                std::mem::take(&mut link.pending_candidates)
            }
            None => return,
        };

        if !buffered.is_empty() {
            debug!("Applying {} buffered candidate(s) from {}", buffered.len(), remote);
        }
        for candidate in buffered {
            if let Err(e) = transport.add_ice_candidate(candidate).await {
                warn!("Dropping buffered candidate from {}: {}", remote, e);
            }
        }
    }

    /// Creates and sends an offer, for a first connection or a renegotiation.
    async fn send_offer(&mut self, remote: ParticipantId) {
        let transport = match self.ensure_transport(remote).await {
            Ok(transport) => transport,
            Err(e) => return self.fail_link(remote, e).await,
        };
        if let Some(link) = self.links.get_mut(&remote) {
            link.needs_renegotiation = false;
        }

        match transport.create_offer().await {
            Ok(offer) => {
                if self.set_state(remote, LinkState::OfferSent) {
                    self.send_signal(SignalKind::Offer, remote, offer);
                }
            }
            Err(e) => self.fail_link(remote, e).await,
        }
    }

    async fn request_renegotiation(&mut self, remote: ParticipantId) {
        let Some(link) = self.links.get_mut(&remote) else {
            return;
        };
        match link.state() {
            LinkState::Connected => {
                info!("Renegotiating with {}", remote);
                self.send_offer(remote).await;
            }
            LinkState::OfferSent | LinkState::OfferReceived | LinkState::Answered => {
                link.needs_renegotiation = true;
            }
            _ => {}
        }
    }

    async fn renegotiate_if_needed(&mut self, remote: ParticipantId) {
        let needed = self.links.get(&remote).is_some_and(|link| {
            link.needs_renegotiation && link.state() == LinkState::Connected
        });
        if needed {
            info!("Renegotiating with {} for tracks changed mid-exchange", remote);
            self.send_offer(remote).await;
        }
    }

    async fn apply_track_changes(
        &mut self,
        replaced: &[(LocalTrack, LocalTrack)],
        removed: &[LocalTrack],
        added: &[LocalTrack],
    ) {
        for (remote, transport) in self.live_transports() {
            match update_transport(transport.as_ref(), replaced, removed, added).await {
                Ok(false) => debug!("Replaced tracks in place for {}", remote),
                Ok(true) => self.request_renegotiation(remote).await,
                Err(e) => self.fail_link(remote, e).await,
            }
        }
    }

    fn live_transports(&self) -> Vec<(ParticipantId, Arc<dyn PeerTransport>)> {
        self.links
            .iter()
            .filter(|(_, link)| link.state().is_live())
            .filter_map(|(remote, link)| Some((*remote, link.transport.clone()?)))
            .collect()
    }

    async fn ensure_transport(
        &mut self,
        remote: ParticipantId,
    ) -> Result<Arc<dyn PeerTransport>, LinkError> {
        let link = self
            .links
            .get(&remote)
            .ok_or(LinkError::UnknownPeer(remote))?;
        if let Some(transport) = &link.transport {
            return Ok(transport.clone());
        }

        let transport = self
            .factory
            .create(remote, self.link_events.clone())
            .await?;
        if let Some(link) = self.links.get_mut(&remote) {
            link.transport = Some(transport.clone());
        }

        for track in self.local_tracks.clone() {
            transport.add_track(&track).await?;
        }
        Ok(transport)
    }

    fn implicit_link(&mut self, remote: ParticipantId) -> LinkState {
        self.links
            .entry(remote)
            .or_insert_with(|| {
                debug!("Implicit link to {}", remote);
                PeerLink::new(remote)
            })
            .state()
    }

    async fn fail_link(&mut self, remote: ParticipantId, error: LinkError) {
        warn!("Link to {} failed: {}", remote, error);
        if !self.set_state(remote, LinkState::Failed) {
            return;
        }
        let _ = self.events.send(PeerEvent::Failed { remote, error });
        self.close_link(remote, "failed").await;
    }

    async fn close_link(&mut self, remote: ParticipantId, reason: &str) {
        self.pending.remove(&remote);
        let Some(link) = self.links.get_mut(&remote) else {
            return;
        };
        if link.state().is_closed() {
            return;
        }
        let transport = link.transport.take();
        link.pending_candidates.clear();

        self.set_state(remote, LinkState::Closed);
        info!("Link to {} closed ({})", remote, reason);

        if let Some(transport) = transport
            && let Err(e) = transport.close().await
        {
            debug!("Closing transport to {}: {}", remote, e);
        }
    }

    /// Closes and forgets every link.
    async fn close_all(&mut self, reason: &str) {
        let remotes: Vec<ParticipantId> = self.links.keys().copied().collect();
        for remote in remotes {
            self.close_link(remote, reason).await;
        }
        self.links.clear();
        self.pending.drain();
    }

    fn set_state(&mut self, remote: ParticipantId, to: LinkState) -> bool {
        let Some(link) = self.links.get_mut(&remote) else {
            return false;
        };
        match link.transition(to) {
            Ok(from) => {
                debug!("{} -> {}: {:?} -> {:?}", self.local, remote, from, to);
                let _ = self.events.send(PeerEvent::StateChanged { remote, state: to });
                true
            }
            Err(e) => {
                warn!("Link to {}: {}", remote, e);
                false
            }
        }
    }

    fn send_signal(&self, kind: SignalKind, remote: ParticipantId, payload: Value) {
        let Some(room) = &self.room else {
            warn!("Not in a room, dropping {:?} to {}", kind, remote);
            return;
        };
        let msg = ClientMessage::signal(kind, room.clone(), remote, payload);
        if self.signals.send(msg).is_err() {
            warn!("Relay connection gone, dropping {:?} to {}", kind, remote);
        }
    }
}

/// Pushes track changes to one transport. Returns whether it needs a new offer.
async fn update_transport(
    transport: &dyn PeerTransport,
    replaced: &[(LocalTrack, LocalTrack)],
    removed: &[LocalTrack],
    added: &[LocalTrack],
) -> Result<bool, LinkError> {
    let mut renegotiate = false;

    for (old, new) in replaced {
        if !transport.replace_track(old, new).await? {
            transport.remove_track(old).await?;
            transport.add_track(new).await?;
            renegotiate = true;
        }
    }
    for track in removed {
        transport.remove_track(track).await?;
        renegotiate = true;
    }
    for track in added {
        transport.add_track(track).await?;
        renegotiate = true;
    }

    Ok(renegotiate)
}
