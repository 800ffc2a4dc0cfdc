//! WebRTC Peer Connections
//!
//! Presenter-Rollen senden ein lokales Video (send-only), Viewer-Rollen
//! empfangen ein entferntes Video (receive-only). ICE läuft per Trickle:
//! jeder gefundene Candidate geht sofort an den Callback.

use super::{CandidateCallback, PeerError, PeerFactory, PeerHandle};
use crate::session::{Direction, MediaRole, MediaSource};
use crate::signaling::IceCandidate;
use async_trait::async_trait;
use std::sync::Arc;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_VP8};
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

const STREAM_ID: &str = "castview";

// ============================================================================
// ICE SERVER CONFIGURATION
// ============================================================================

/// Standard STUN Server Konfiguration
pub fn default_ice_servers() -> Vec<RTCIceServer> {
    vec![RTCIceServer {
        urls: vec![
            "stun:stun.l.google.com:19302".to_string(),
            "stun:stun1.l.google.com:19302".to_string(),
        ],
        ..Default::default()
    }]
}

impl From<IceCandidate> for RTCIceCandidateInit {
    fn from(c: IceCandidate) -> Self {
        RTCIceCandidateInit {
            candidate: c.candidate,
            sdp_mid: c.sdp_mid,
            sdp_mline_index: c.sdp_m_line_index,
            username_fragment: None,
        }
    }
}

impl From<RTCIceCandidateInit> for IceCandidate {
    fn from(init: RTCIceCandidateInit) -> Self {
        IceCandidate {
            candidate: init.candidate,
            sdp_mid: init.sdp_mid,
            sdp_m_line_index: init.sdp_mline_index,
        }
    }
}

// ============================================================================
// FACTORY
// ============================================================================

/// Baut echte WebRTC Peer Connections
#[derive(Debug, Clone)]
pub struct WebRtcPeerFactory {
    ice_servers: Vec<RTCIceServer>,
}

impl WebRtcPeerFactory {
    pub fn new(ice_servers: Vec<RTCIceServer>) -> Self {
        Self { ice_servers }
    }
}

impl Default for WebRtcPeerFactory {
    fn default() -> Self {
        Self::new(default_ice_servers())
    }
}

#[async_trait]
impl PeerFactory for WebRtcPeerFactory {
    async fn create(
        &self,
        role: MediaRole,
        on_ice_candidate: CandidateCallback,
    ) -> Result<Arc<dyn PeerHandle>, PeerError> {
        let peer = WebRtcPeer::new(role, self.ice_servers.clone(), on_ice_candidate).await?;
        Ok(Arc::new(peer))
    }
}

// ============================================================================
// PEER
// ============================================================================

/// Eine WebRTC Peer Connection für genau eine Rolle
pub struct WebRtcPeer {
    role: MediaRole,
    pc: Arc<RTCPeerConnection>,
    /// Nur bei Presenter-Rollen: hier schreibt die Capture-Quelle hinein
    local_track: Option<Arc<TrackLocalStaticSample>>,
}

impl WebRtcPeer {
    /// Erstellt die Peer Connection samt Transceiver für die Rolle
    pub async fn new(
        role: MediaRole,
        ice_servers: Vec<RTCIceServer>,
        on_ice_candidate: CandidateCallback,
    ) -> Result<Self, PeerError> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| PeerError::WebRTC(e.to_string()))?;

        // Interceptors für RTCP, NACK etc.
        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)
            .map_err(|e| PeerError::WebRTC(e.to_string()))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let pc = Arc::new(
            api.new_peer_connection(config)
                .await
                .map_err(|e| PeerError::WebRTC(e.to_string()))?,
        );

        let local_track = match role.direction() {
            Direction::SendOnly => {
                let track = Arc::new(TrackLocalStaticSample::new(
                    RTCRtpCodecCapability {
                        mime_type: MIME_TYPE_VP8.to_owned(),
                        clock_rate: 90000,
                        ..Default::default()
                    },
                    track_id(role.source()).to_owned(),
                    STREAM_ID.to_owned(),
                ));

                pc.add_transceiver_from_track(
                    Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>,
                    Some(RTCRtpTransceiverInit {
                        direction: RTCRtpTransceiverDirection::Sendonly,
                        send_encodings: vec![],
                    }),
                )
                .await
                .map_err(|e| PeerError::WebRTC(e.to_string()))?;

                Some(track)
            }
            Direction::RecvOnly => {
                pc.add_transceiver_from_kind(
                    RTPCodecType::Video,
                    Some(RTCRtpTransceiverInit {
                        direction: RTCRtpTransceiverDirection::Recvonly,
                        send_encodings: vec![],
                    }),
                )
                .await
                .map_err(|e| PeerError::WebRTC(e.to_string()))?;

                None
            }
        };

        Self::setup_handlers(role, &pc, on_ice_candidate);

        tracing::info!("Created {} peer connection", role);
        Ok(Self {
            role,
            pc,
            local_track,
        })
    }

    /// Registriert Event Handler für die Peer Connection
    fn setup_handlers(
        role: MediaRole,
        pc: &Arc<RTCPeerConnection>,
        on_ice_candidate: CandidateCallback,
    ) {
        pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
            tracing::info!("{} peer connection state: {:?}", role, s);
            Box::pin(async {})
        }));

        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            // None markiert das Ende des Gatherings
            if let Some(c) = candidate {
                match c.to_json() {
                    Ok(init) => {
                        tracing::debug!("Local {} candidate: {}", role, init.candidate);
                        on_ice_candidate(IceCandidate::from(init));
                    }
                    Err(e) => tracing::error!("Failed to serialize local candidate: {}", e),
                }
            }
            Box::pin(async {})
        }));

        pc.on_track(Box::new(move |track, _, _| {
            Box::pin(async move {
                tracing::info!("{} received remote track: {:?}", role, track.codec());
            })
        }));
    }
}

#[async_trait]
impl PeerHandle for WebRtcPeer {
    async fn generate_offer(&self) -> Result<String, PeerError> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| PeerError::WebRTC(e.to_string()))?;

        self.pc
            .set_local_description(offer.clone())
            .await
            .map_err(|e| PeerError::WebRTC(e.to_string()))?;

        Ok(offer.sdp)
    }

    async fn process_answer(&self, sdp_answer: String) -> Result<(), PeerError> {
        let answer = RTCSessionDescription::answer(sdp_answer)
            .map_err(|e| PeerError::InvalidSdp(e.to_string()))?;

        self.pc
            .set_remote_description(answer)
            .await
            .map_err(|e| PeerError::WebRTC(e.to_string()))
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), PeerError> {
        if candidate.candidate.is_empty() {
            return Err(PeerError::InvalidCandidate("empty candidate line".to_string()));
        }

        self.pc
            .add_ice_candidate(candidate.into())
            .await
            .map_err(|e| PeerError::WebRTC(e.to_string()))
    }

    fn dispose(&self) {
        let pc = Arc::clone(&self.pc);
        let role = self.role;
        tokio::spawn(async move {
            close_connection(role, &pc).await;
        });
    }

    async fn close(&self) {
        close_connection(self.role, &self.pc).await;
    }
}

async fn close_connection(role: MediaRole, pc: &RTCPeerConnection) {
    if let Err(e) = pc.close().await {
        tracing::warn!("Failed to close {} peer connection: {}", role, e);
    }
}

impl std::fmt::Debug for WebRtcPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebRtcPeer")
            .field("role", &self.role)
            .field("state", &self.pc.connection_state())
            .field("local_track", &self.local_track.as_ref().map(|t| t.id().to_owned()))
            .finish()
    }
}

fn track_id(source: MediaSource) -> &'static str {
    match source {
        MediaSource::Screen => "screen",
        MediaSource::Camera => "camera",
    }
}
