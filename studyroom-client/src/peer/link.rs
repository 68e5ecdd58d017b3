use serde_json::Value;
use std::sync::Arc;

use crate::error::LinkError;
use crate::transport::PeerTransport;
use studyroom_core::ParticipantId;

/// Negotiation state of one peer link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkState {
    Idle,
    /// The remote is known but local media has not settled yet.
    PendingLocalMedia,
    OfferSent,
    OfferReceived,
    Answered,
    Connected,
    Failed,
    Closed,
}

impl LinkState {
    pub fn is_closed(self) -> bool {
        self == LinkState::Closed
    }

    /// Failed and Closed links never negotiate again.
    pub fn is_live(self) -> bool {
        !matches!(self, LinkState::Failed | LinkState::Closed)
    }

    pub fn can_transition_to(self, to: LinkState) -> bool {
        use LinkState::*;

        match (self, to) {
            (Closed, _) => false,
            (Failed, Closed) => true,
            (Failed, _) => false,
            (_, Failed | Closed) => true,

            (Idle, PendingLocalMedia | OfferSent | OfferReceived) => true,
            (PendingLocalMedia, OfferSent | OfferReceived) => true,
            // Glare: a remote offer replaces our own.
            (OfferSent, Connected | OfferReceived) => true,
            (OfferReceived, Answered) => true,
            (Answered, Connected | OfferReceived) => true,
            // Renegotiation over an established link, from either side.
            (Connected, OfferSent | OfferReceived) => true,
            _ => false,
        }
    }
}

/// One local participant's view of its link to one remote.
pub struct PeerLink {
    remote: ParticipantId,
    state: LinkState,
    pub(crate) transport: Option<Arc<dyn PeerTransport>>,
    /// Remote candidates that arrived before any remote description.
    pub(crate) pending_candidates: Vec<Value>,
    pub(crate) remote_description_set: bool,
    /// The transport itself has reported connectivity at least once.
    pub(crate) transport_connected: bool,
    /// Local tracks changed while an exchange was in flight.
    pub(crate) needs_renegotiation: bool,
    has_connected: bool,
}

impl PeerLink {
    pub fn new(remote: ParticipantId) -> Self {
        Self {
            remote,
            state: LinkState::Idle,
            transport: None,
            pending_candidates: Vec::new(),
            remote_description_set: false,
            transport_connected: false,
            needs_renegotiation: false,
            has_connected: false,
        }
    }

    pub fn remote(&self) -> ParticipantId {
        self.remote
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// The link has completed at least one negotiation.
    pub fn has_connected(&self) -> bool {
        self.has_connected
    }

    pub fn buffered_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    pub(crate) fn transition(&mut self, to: LinkState) -> Result<LinkState, LinkError> {
        if !self.state.can_transition_to(to) {
            return Err(LinkError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        let from = std::mem::replace(&mut self.state, to);
        if to == LinkState::Connected {
            self.has_connected = true;
        }
        Ok(from)
    }
}
