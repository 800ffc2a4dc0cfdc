//! Peer Module - Peer Connections pro Rolle
//!
//! Die Session kennt Peer Connections nur über die Traits in diesem
//! Modul. Die echte Implementierung baut auf `webrtc` auf.

mod webrtc_peer;

pub use webrtc_peer::{default_ice_servers, WebRtcPeer, WebRtcPeerFactory};

use crate::session::MediaRole;
use crate::signaling::IceCandidate;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug)]
pub enum PeerError {
    #[error("WebRTC error: {0}")]
    WebRTC(String),

    #[error("Invalid SDP: {0}")]
    InvalidSdp(String),

    #[error("Invalid ICE candidate: {0}")]
    InvalidCandidate(String),
}

// ============================================================================
// TRAITS
// ============================================================================

/// Wird für jeden lokal gefundenen ICE Candidate aufgerufen
pub type CandidateCallback = Arc<dyn Fn(IceCandidate) + Send + Sync>;

/// Eine Peer Connection, die genau einer Rolle gehört
#[async_trait]
pub trait PeerHandle: Send + Sync {
    /// Erzeugt das lokale SDP Offer und setzt es als Local Description
    async fn generate_offer(&self) -> Result<String, PeerError>;

    /// Setzt das SDP Answer des Servers als Remote Description
    async fn process_answer(&self, sdp_answer: String) -> Result<(), PeerError>;

    /// Fügt einen Remote ICE Candidate hinzu
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), PeerError>;

    /// Gibt die Verbindung frei. Kehrt sofort zurück, der eigentliche
    /// Abbau darf im Hintergrund laufen.
    fn dispose(&self);

    /// Wie `dispose`, wartet aber bis die Verbindung geschlossen ist
    async fn close(&self);
}

/// Erzeugt Peer Connections für eine Rolle
#[async_trait]
pub trait PeerFactory: Send + Sync {
    async fn create(
        &self,
        role: MediaRole,
        on_ice_candidate: CandidateCallback,
    ) -> Result<Arc<dyn PeerHandle>, PeerError>;
}
