//! Session - vier Rollen, vier Slots
//!
//! Die Session besitzt für jede Rolle höchstens eine Peer Connection
//! und übersetzt zwischen Konsolen-Befehlen, Peer-Callbacks und den
//! Nachrichten des Signaling-Servers. Alle Methoden laufen nacheinander
//! auf einem Task; ein Fehler bleibt immer innerhalb der Session.

use super::controls::Controls;
use super::role::MediaRole;
use crate::peer::{CandidateCallback, PeerFactory, PeerHandle};
use crate::signaling::{ClientMessage, IceCandidate, SdpResponse, ServerMessage};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Lokale Candidates einer Rolle, bevor ihr Offer eingereiht ist.
///
/// Das Gathering startet schon in `generate_offer`; was bis dahin
/// anfällt, wird gehalten und direkt nach dem Offer in Reihenfolge
/// verschickt.
enum CandidateGate {
    Holding(Vec<IceCandidate>),
    Open,
}

type SharedGate = Arc<Mutex<CandidateGate>>;

/// Client-Session mit einem optionalen Peer pro Rolle
pub struct Session {
    factory: Arc<dyn PeerFactory>,
    outbox: mpsc::UnboundedSender<ClientMessage>,
    peers: [Option<Arc<dyn PeerHandle>>; 4],
    controls: Controls,
    last_rejection: Option<String>,
}

impl Session {
    pub fn new(
        factory: Arc<dyn PeerFactory>,
        outbox: mpsc::UnboundedSender<ClientMessage>,
    ) -> Self {
        Self {
            factory,
            outbox,
            peers: [None, None, None, None],
            controls: Controls::default(),
            last_rejection: None,
        }
    }

    pub fn controls(&self) -> Controls {
        self.controls
    }

    /// Ob für die Rolle gerade eine Peer Connection existiert
    pub fn is_active(&self, role: MediaRole) -> bool {
        self.peers[role.index()].is_some()
    }

    pub fn active_roles(&self) -> Vec<MediaRole> {
        MediaRole::ALL
            .into_iter()
            .filter(|role| self.is_active(*role))
            .collect()
    }

    /// Grund der letzten Ablehnung durch den Server
    pub fn last_rejection(&self) -> Option<&str> {
        self.last_rejection.as_deref()
    }

    // ========================================================================
    // OUTBOUND
    // ========================================================================

    /// Startet Bildschirm und Kamera als Presenter
    pub async fn start_presenter(&mut self) {
        if self.is_active(MediaRole::PresenterScreen) {
            tracing::warn!("Presenter already started");
            return;
        }

        self.controls.activate();
        for role in MediaRole::PRESENTER {
            self.start(role).await;
        }
    }

    /// Startet Bildschirm und Kamera als Viewer
    pub async fn start_viewer(&mut self) {
        if self.is_active(MediaRole::ViewerScreen) {
            tracing::warn!("Viewer already started");
            return;
        }

        self.controls.activate();
        for role in MediaRole::VIEWER {
            self.start(role).await;
        }
    }

    /// Baut die Peer Connection einer Rolle auf und schickt ihr Offer.
    ///
    /// Gibt `false` zurück, wenn die Rolle schon aktiv war oder der Peer
    /// nicht erstellt werden konnte.
    pub async fn start(&mut self, role: MediaRole) -> bool {
        if self.is_active(role) {
            tracing::warn!("{} already has a peer connection", role);
            return false;
        }

        let gate: SharedGate = Arc::new(Mutex::new(CandidateGate::Holding(Vec::new())));
        let on_ice_candidate = self.candidate_callback(role, Arc::clone(&gate));
        let peer = match self.factory.create(role, on_ice_candidate).await {
            Ok(peer) => peer,
            Err(e) => {
                tracing::error!("Failed to create {} peer: {}", role, e);
                return false;
            }
        };
        self.peers[role.index()] = Some(Arc::clone(&peer));

        match peer.generate_offer().await {
            Ok(sdp_offer) => self.send_offer(role, &gate, sdp_offer),
            // Ohne Offer kennt der Server die Rolle nicht, die Candidates bleiben liegen
            Err(e) => tracing::error!("Error generating the {} offer: {}", role, e),
        }

        true
    }

    /// Meldet dem Server das Ende und baut alle Peers ab
    pub fn stop(&mut self) {
        self.send(ClientMessage::Stop);
        self.dispose_all();
    }

    /// Gibt alle vorhandenen Peers frei und setzt die Controls zurück
    pub fn dispose_all(&mut self) {
        for role in MediaRole::ALL {
            if let Some(peer) = self.peers[role.index()].take() {
                tracing::info!("Disposing {} peer", role);
                peer.dispose();
            }
        }
        self.controls.reset();
    }

    /// Wie `dispose_all`, wartet aber bis jede Verbindung geschlossen ist.
    /// Für das Programmende, wenn danach keine Tasks mehr laufen.
    pub async fn shutdown(&mut self) {
        for role in MediaRole::ALL {
            if let Some(peer) = self.peers[role.index()].take() {
                tracing::info!("Closing {} peer", role);
                peer.close().await;
            }
        }
        self.controls.reset();
    }

    // ========================================================================
    // INBOUND
    // ========================================================================

    /// Verarbeitet eine Nachricht des Servers
    pub async fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::PresenterScreenResponse(resp) => {
                self.on_response(MediaRole::PresenterScreen, resp).await
            }
            ServerMessage::PresenterCameraResponse(resp) => {
                self.on_response(MediaRole::PresenterCamera, resp).await
            }
            ServerMessage::ViewerScreenResponse(resp) => {
                self.on_response(MediaRole::ViewerScreen, resp).await
            }
            ServerMessage::ViewerCameraResponse(resp) => {
                self.on_response(MediaRole::ViewerCamera, resp).await
            }

            ServerMessage::IceCandidateScreen(remote) => {
                self.on_remote_candidate(MediaRole::PresenterScreen, remote.candidate)
                    .await
            }
            ServerMessage::IceCandidateCamera(remote) => {
                self.on_remote_candidate(MediaRole::PresenterCamera, remote.candidate)
                    .await
            }
            ServerMessage::IceCandidateViewerScreen(remote) => {
                self.on_remote_candidate(MediaRole::ViewerScreen, remote.candidate)
                    .await
            }
            ServerMessage::IceCandidateViewerCamera(remote) => {
                self.on_remote_candidate(MediaRole::ViewerCamera, remote.candidate)
                    .await
            }

            ServerMessage::StopCommunication => {
                tracing::info!("Server stopped the communication");
                self.dispose_all();
            }

            ServerMessage::Unrecognized => {
                tracing::error!("Unrecognized message");
            }
        }
    }

    async fn on_response(&mut self, role: MediaRole, resp: SdpResponse) {
        if !resp.is_accepted() {
            let reason = resp.reject_reason().to_string();
            tracing::info!(
                "Call not accepted for the following reason: {} ({})",
                reason,
                role
            );
            self.last_rejection = Some(reason);
            self.dispose_all();
            return;
        }

        let Some(peer) = self.peer(role) else {
            tracing::warn!("Answer for {} arrived without a peer, dropping", role);
            return;
        };

        let Some(sdp_answer) = resp.sdp_answer else {
            tracing::error!("Accepted {} response carries no sdpAnswer", role);
            return;
        };

        if let Err(e) = peer.process_answer(sdp_answer).await {
            tracing::error!("Failed to process {} answer: {}", role, e);
        }
    }

    async fn on_remote_candidate(&self, role: MediaRole, candidate: IceCandidate) {
        // Späte Candidates nach dem Abbau werden still verworfen
        let Some(peer) = self.peer(role) else {
            tracing::trace!("No {} peer, dropping remote candidate", role);
            return;
        };

        if let Err(e) = peer.add_ice_candidate(candidate).await {
            tracing::error!("Error adding {} candidate: {}", role, e);
        }
    }

    // ========================================================================
    // PRIVATE METHODS
    // ========================================================================

    fn peer(&self, role: MediaRole) -> Option<Arc<dyn PeerHandle>> {
        self.peers[role.index()].clone()
    }

    /// Callback für lokale Candidates der Rolle, gehalten bis zum Offer
    fn candidate_callback(&self, role: MediaRole, gate: SharedGate) -> CandidateCallback {
        let outbox = self.outbox.clone();
        Arc::new(move |candidate: IceCandidate| {
            let mut gate = gate.lock();
            match &mut *gate {
                CandidateGate::Holding(held) => held.push(candidate),
                CandidateGate::Open => {
                    send_to(&outbox, ClientMessage::ice_candidate(role, candidate))
                }
            }
        })
    }

    /// Reiht das Offer ein und gibt danach die gehaltenen Candidates frei.
    ///
    /// Läuft unter dem Gate-Lock, damit kein neuer Candidate dazwischen
    /// oder vor das Offer rutscht.
    fn send_offer(&self, role: MediaRole, gate: &Mutex<CandidateGate>, sdp_offer: String) {
        let mut gate = gate.lock();

        tracing::info!("Sending {} SDP offer", role);
        self.send(ClientMessage::offer(role, sdp_offer));

        if let CandidateGate::Holding(held) = std::mem::replace(&mut *gate, CandidateGate::Open) {
            if !held.is_empty() {
                tracing::debug!("Releasing {} held {} candidates", held.len(), role);
            }
            for candidate in held {
                self.send(ClientMessage::ice_candidate(role, candidate));
            }
        }
    }

    fn send(&self, message: ClientMessage) {
        send_to(&self.outbox, message);
    }
}

fn send_to(outbox: &mpsc::UnboundedSender<ClientMessage>, message: ClientMessage) {
    let tag = message.tag();
    if outbox.send(message).is_err() {
        tracing::error!("Failed to send '{}' message: signaling writer is gone", tag);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("active_roles", &self.active_roles())
            .field("controls", &self.controls)
            .finish()
    }
}
