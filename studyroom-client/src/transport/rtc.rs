use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

use crate::error::LinkError;
use crate::media::{LocalTrack, TrackKind};
use crate::transport::{LinkEvent, PeerTransport, TransportFactory, TransportState};
use studyroom_core::{IceServerConfig, ParticipantId};

const STREAM_ID: &str = "studyroom";

/// Opens real WebRTC peer connections.
#[derive(Debug, Clone)]
pub struct RtcTransportFactory {
    ice_servers: Vec<IceServerConfig>,
}

impl RtcTransportFactory {
    pub fn new(ice_servers: Vec<IceServerConfig>) -> Self {
        Self { ice_servers }
    }
}

#[async_trait]
impl TransportFactory for RtcTransportFactory {
    async fn create(
        &self,
        remote: ParticipantId,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Result<Arc<dyn PeerTransport>, LinkError> {
        let transport = RtcTransport::new(remote, &self.ice_servers, events).await?;
        Ok(Arc::new(transport))
    }
}

pub struct RtcTransport {
    remote: ParticipantId,
    peer_connection: Arc<RTCPeerConnection>,
    /// Outgoing senders keyed by local track id.
    senders: Mutex<HashMap<String, Arc<RTCRtpSender>>>,
}

impl RtcTransport {
    pub async fn new(
        remote: ParticipantId,
        ice_servers: &[IceServerConfig],
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .context("Failed to create peer connection")?,
        );

        let state_tx = events.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                Box::pin(async move {
                    info!("Peer connection to {} is {:?}", remote, s);
                    let state = match s {
                        RTCPeerConnectionState::Connecting => TransportState::Connecting,
                        RTCPeerConnectionState::Connected => TransportState::Connected,
                        RTCPeerConnectionState::Disconnected => TransportState::Disconnected,
                        RTCPeerConnectionState::Failed => TransportState::Failed,
                        RTCPeerConnectionState::Closed => TransportState::Closed,
                        _ => return,
                    };
                    let _ = tx.send(LinkEvent::StateChanged { remote, state });
                })
            },
        ));

        let ice_tx = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let Ok(payload) = serde_json::to_value(&init) else {
                    return;
                };
                let _ = tx.send(LinkEvent::LocalCandidate { remote, payload });
            })
        }));

        let track_tx = events;
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let tx = track_tx.clone();
                Box::pin(async move {
                    let kind = match track.kind() {
                        RTPCodecType::Audio => TrackKind::Audio,
                        RTPCodecType::Video => TrackKind::Video,
                        _ => return,
                    };
                    debug!("Remote {} track from {}", kind, remote);
                    let _ = tx.send(LinkEvent::RemoteTrack {
                        remote,
                        track_id: track.id(),
                        kind,
                    });
                })
            },
        ));

        Ok(Self {
            remote,
            peer_connection,
            senders: Mutex::new(HashMap::new()),
        })
    }

    fn local_track(track: &LocalTrack) -> Arc<dyn TrackLocal + Send + Sync> {
        let codec = match track.kind() {
            TrackKind::Audio => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            },
            TrackKind::Video => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                clock_rate: 90000,
                ..Default::default()
            },
        };
        Arc::new(TrackLocalStaticSample::new(
            codec,
            track.id().to_owned(),
            STREAM_ID.to_owned(),
        ))
    }

    async fn set_local(&self, desc: RTCSessionDescription) -> Result<Value, LinkError> {
        self.peer_connection
            .set_local_description(desc.clone())
            .await
            .map_err(transport_error)?;
        serde_json::to_value(&desc).map_err(|e| LinkError::Payload(e.to_string()))
    }
}

#[async_trait]
impl PeerTransport for RtcTransport {
    async fn create_offer(&self) -> Result<Value, LinkError> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(transport_error)?;
        self.set_local(offer).await
    }

    async fn apply_offer(&self, offer: Value) -> Result<(), LinkError> {
        let desc = parse_description(offer)?;

        if self.peer_connection.signaling_state() == RTCSignalingState::HaveLocalOffer {
            debug!("Rolling back local offer to {} for remote offer", self.remote);
            let mut rollback = RTCSessionDescription::default();
            rollback.sdp_type = RTCSdpType::Rollback;
            self.peer_connection
                .set_local_description(rollback)
                .await
                .map_err(transport_error)?;
        }

        self.peer_connection
            .set_remote_description(desc)
            .await
            .map_err(transport_error)
    }

    async fn create_answer(&self) -> Result<Value, LinkError> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .map_err(transport_error)?;
        self.set_local(answer).await
    }

    async fn apply_answer(&self, answer: Value) -> Result<(), LinkError> {
        let desc = parse_description(answer)?;
        self.peer_connection
            .set_remote_description(desc)
            .await
            .map_err(transport_error)
    }

    async fn add_ice_candidate(&self, candidate: Value) -> Result<(), LinkError> {
        let init: RTCIceCandidateInit =
            serde_json::from_value(candidate).map_err(|e| LinkError::Payload(e.to_string()))?;
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .map_err(transport_error)
    }

    async fn add_track(&self, track: &LocalTrack) -> Result<(), LinkError> {
        let sender = self
            .peer_connection
            .add_track(Self::local_track(track))
            .await
            .map_err(transport_error)?;
        self.senders
            .lock()
            .await
            .insert(track.id().to_owned(), sender);
        Ok(())
    }

    async fn remove_track(&self, track: &LocalTrack) -> Result<(), LinkError> {
        let Some(sender) = self.senders.lock().await.remove(track.id()) else {
            return Ok(());
        };
        self.peer_connection
            .remove_track(&sender)
            .await
            .map_err(transport_error)
    }

    async fn replace_track(&self, old: &LocalTrack, new: &LocalTrack) -> Result<bool, LinkError> {
        let mut senders = self.senders.lock().await;
        let Some(sender) = senders.get(old.id()).cloned() else {
            return Ok(false);
        };
        sender
            .replace_track(Some(Self::local_track(new)))
            .await
            .map_err(transport_error)?;
        senders.remove(old.id());
        senders.insert(new.id().to_owned(), sender);
        Ok(true)
    }

    async fn close(&self) -> Result<(), LinkError> {
        self.peer_connection.close().await.map_err(transport_error)
    }
}

fn parse_description(payload: Value) -> Result<RTCSessionDescription, LinkError> {
    serde_json::from_value(payload).map_err(|e| LinkError::Payload(e.to_string()))
}

fn transport_error(err: webrtc::Error) -> LinkError {
    LinkError::Transport(err.to_string())
}
