//! castview - Signaling Client für One-to-Many Screencasts
//!
//! Ein Presenter sendet Bildschirm und Kamera, beliebig viele Viewer
//! empfangen beides. Der Client:
//! - hält genau eine WebSocket-Verbindung zum Media-Server
//! - verwaltet eine WebRTC Peer Connection pro aktiver Rolle
//! - tauscht SDP Offers/Answers und ICE Candidates aus

pub mod config;
pub mod peer;
pub mod session;
pub mod signaling;

use config::ClientConfig;
use peer::WebRtcPeerFactory;
use session::{Command, Session};
use signaling::{SignalingClient, SignalingEvent};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};

// ============================================================================
// LOGGING
// ============================================================================

/// Initialisiert das Logging (RUST_LOG überschreibt die Defaults)
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("castview=debug,webrtc=warn"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

// ============================================================================
// CONSOLE
// ============================================================================

/// Liest Befehle zeilenweise von stdin.
///
/// Der Channel schließt sich bei EOF, was wie `quit` behandelt wird.
fn spawn_console() -> mpsc::Receiver<Command> {
    let (tx, rx) = mpsc::channel(16);

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match line.parse::<Command>() {
                    Ok(command) => {
                        if tx.send(command).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!("{}", e),
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Failed to read from stdin: {}", e);
                    break;
                }
            }
        }
    });

    rx
}

// ============================================================================
// EVENT LOOP
// ============================================================================

/// Ob die Hauptschleife weiterläuft
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopControl {
    Continue,
    Exit,
}

/// Führt einen Befehl aus, sofern der passende Button aktiv ist
async fn handle_command(session: &mut Session, command: Command) -> LoopControl {
    if !session.controls().allows(command) {
        tracing::warn!("{:?} is not available right now", command);
        return LoopControl::Continue;
    }

    match command {
        Command::StartPresenter => session.start_presenter().await,
        Command::StartViewer => session.start_viewer().await,
        Command::Stop => session.stop(),
        Command::Quit => return LoopControl::Exit,
    }
    LoopControl::Continue
}

/// Verarbeitet ein Event des Signaling-Clients
async fn handle_event(
    session: &mut Session,
    event: Result<SignalingEvent, broadcast::error::RecvError>,
) -> LoopControl {
    match event {
        Ok(SignalingEvent::Message(message)) => session.handle_message(message).await,
        Ok(SignalingEvent::Unrecognized { raw }) => {
            tracing::error!("Unrecognized message: {}", raw);
        }
        Ok(SignalingEvent::Connected) => {
            tracing::info!("Connected to signaling server");
        }
        Ok(SignalingEvent::Disconnected) => {
            tracing::warn!("Signaling connection lost");
            return LoopControl::Exit;
        }
        Err(broadcast::error::RecvError::Lagged(skipped)) => {
            tracing::warn!("Dropped {} signaling events", skipped);
        }
        Err(broadcast::error::RecvError::Closed) => return LoopControl::Exit,
    }
    LoopControl::Continue
}

// ============================================================================
// APP RUNNER
// ============================================================================

/// Startet den Client und läuft bis `quit`, Ctrl-C oder Verbindungsverlust
pub async fn run() -> anyhow::Result<()> {
    init_logging();

    let config = ClientConfig::from_env()?;
    tracing::info!("Starting castview against {}", config.signaling_url);

    let mut client = SignalingClient::new(config.signaling_url.to_string());
    let mut events = client.subscribe();
    client.connect().await?;

    let factory = Arc::new(WebRtcPeerFactory::new(config.ice_servers.clone()));
    let mut session = Session::new(factory, client.outbox()?);
    let mut commands = spawn_console();

    tracing::info!("Ready. Commands: presenter, viewer, stop, quit");

    loop {
        let control = tokio::select! {
            command = commands.recv() => match command {
                Some(command) => handle_command(&mut session, command).await,
                None => LoopControl::Exit,
            },

            event = events.recv() => handle_event(&mut session, event).await,

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                LoopControl::Exit
            }
        };

        if control == LoopControl::Exit {
            break;
        }
    }

    session.shutdown().await;

    // Schreibt noch Ausstehendes (etwa ein `stop`) vor dem Close-Frame
    if client.is_connected() {
        if let Err(e) = client.close().await {
            tracing::warn!("Failed to close signaling connection: {}", e);
        }
    }

    tracing::info!("Bye");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::{CandidateCallback, PeerError, PeerFactory, PeerHandle};
    use crate::session::{ControlState, MediaRole};
    use crate::signaling::{ClientMessage, IceCandidate, ServerMessage};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    type Disposals = Arc<Mutex<Vec<MediaRole>>>;

    struct RefusingFactory;

    #[async_trait]
    impl PeerFactory for RefusingFactory {
        async fn create(
            &self,
            _role: MediaRole,
            _on_ice_candidate: CandidateCallback,
        ) -> Result<Arc<dyn PeerHandle>, PeerError> {
            Err(PeerError::WebRTC("no devices".to_string()))
        }
    }

    struct SilentPeer {
        role: MediaRole,
        disposals: Disposals,
    }

    #[async_trait]
    impl PeerHandle for SilentPeer {
        async fn generate_offer(&self) -> Result<String, PeerError> {
            Ok("v=0".to_string())
        }

        async fn process_answer(&self, _sdp_answer: String) -> Result<(), PeerError> {
            Ok(())
        }

        async fn add_ice_candidate(&self, _candidate: IceCandidate) -> Result<(), PeerError> {
            Ok(())
        }

        fn dispose(&self) {
            self.disposals.lock().push(self.role);
        }

        async fn close(&self) {
            self.dispose();
        }
    }

    #[derive(Default)]
    struct SilentFactory {
        disposals: Disposals,
    }

    #[async_trait]
    impl PeerFactory for SilentFactory {
        async fn create(
            &self,
            role: MediaRole,
            _on_ice_candidate: CandidateCallback,
        ) -> Result<Arc<dyn PeerHandle>, PeerError> {
            Ok(Arc::new(SilentPeer {
                role,
                disposals: Arc::clone(&self.disposals),
            }))
        }
    }

    fn viewer_session() -> (Session, Disposals, mpsc::UnboundedReceiver<ClientMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let factory = SilentFactory::default();
        let disposals = Arc::clone(&factory.disposals);
        (Session::new(Arc::new(factory), tx), disposals, rx)
    }

    #[tokio::test]
    async fn test_commands_follow_button_state() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session = Session::new(Arc::new(RefusingFactory), tx);

        // Stop ist deaktiviert, solange nichts läuft
        assert_eq!(
            handle_command(&mut session, Command::Stop).await,
            LoopControl::Continue
        );
        assert!(rx.try_recv().is_err());

        handle_command(&mut session, Command::StartViewer).await;
        assert_eq!(session.controls().state, ControlState::Active);

        // Start-Buttons sind jetzt deaktiviert
        handle_command(&mut session, Command::StartPresenter).await;
        assert!(session.active_roles().is_empty());

        handle_command(&mut session, Command::Stop).await;
        assert_eq!(rx.try_recv().ok(), Some(ClientMessage::Stop));
        assert_eq!(session.controls().state, ControlState::Idle);
    }

    #[tokio::test]
    async fn test_quit_ends_the_loop_in_any_state() {
        let (mut session, _disposals, _rx) = viewer_session();

        assert_eq!(
            handle_command(&mut session, Command::Quit).await,
            LoopControl::Exit
        );

        handle_command(&mut session, Command::StartViewer).await;
        assert_eq!(
            handle_command(&mut session, Command::Quit).await,
            LoopControl::Exit
        );
    }

    #[tokio::test]
    async fn test_lost_connection_ends_the_loop() {
        let (mut session, _disposals, _rx) = viewer_session();

        assert_eq!(
            handle_event(&mut session, Ok(SignalingEvent::Disconnected)).await,
            LoopControl::Exit
        );
        assert_eq!(
            handle_event(&mut session, Err(broadcast::error::RecvError::Closed)).await,
            LoopControl::Exit
        );
        assert_eq!(
            handle_event(&mut session, Ok(SignalingEvent::Connected)).await,
            LoopControl::Continue
        );
        assert_eq!(
            handle_event(&mut session, Err(broadcast::error::RecvError::Lagged(3))).await,
            LoopControl::Continue
        );
    }

    #[tokio::test]
    async fn test_server_messages_reach_the_session() {
        let (mut session, disposals, _rx) = viewer_session();
        handle_command(&mut session, Command::StartViewer).await;

        let control = handle_event(
            &mut session,
            Ok(SignalingEvent::Message(ServerMessage::StopCommunication)),
        )
        .await;

        assert_eq!(control, LoopControl::Continue);
        assert_eq!(*disposals.lock(), MediaRole::VIEWER.to_vec());
        assert_eq!(session.controls().state, ControlState::Idle);
    }

    #[tokio::test]
    async fn test_unrecognized_frame_is_ignored() {
        let (mut session, disposals, mut rx) = viewer_session();
        handle_command(&mut session, Command::StartViewer).await;
        while rx.try_recv().is_ok() {}

        let control = handle_event(
            &mut session,
            Ok(SignalingEvent::Unrecognized {
                raw: r#"{"id":"mystery"}"#.to_string(),
            }),
        )
        .await;

        assert_eq!(control, LoopControl::Continue);
        assert_eq!(session.active_roles(), MediaRole::VIEWER.to_vec());
        assert!(disposals.lock().is_empty());
        assert!(rx.try_recv().is_err());
    }
}
