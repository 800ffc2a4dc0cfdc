//! WebSocket Client für den Signaling-Server
//!
//! Verwaltet die eine WebSocket-Verbindung zum Media-Server:
//! - Verbindung aufbauen und beim Beenden schließen
//! - Ausgehende Nachrichten serialisieren und senden
//! - Eingehende Nachrichten parsen und als Events weiterleiten
//!
//! Es gibt bewusst keine Reconnection: geht die Verbindung verloren,
//! ist die Session vorbei.

use super::messages::*;
use futures::{Sink, SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Puffer für eingehende Events. Großzügig, damit ein Schwall von
/// Remote Candidates kein Answer verdrängt.
const EVENT_CAPACITY: usize = 1024;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug, Clone)]
pub enum SignalingError {
    #[error("WebSocket connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Not connected to signaling server")]
    NotConnected,

    #[error("Signaling writer failed: {0}")]
    WriterFailed(String),
}

// ============================================================================
// SIGNALING EVENTS
// ============================================================================

/// Events die vom SignalingClient ausgelöst werden
#[derive(Debug, Clone)]
pub enum SignalingEvent {
    /// Verbunden mit Signaling-Server
    Connected,

    /// Verbindung getrennt
    Disconnected,

    /// Nachricht vom Server
    Message(ServerMessage),

    /// Frame, der sich nicht als Server-Nachricht lesen lässt
    Unrecognized { raw: String },
}

// ============================================================================
// CLIENT STATE
// ============================================================================

#[derive(Debug, Clone, Default)]
struct ClientState {
    is_connected: bool,
}

// ============================================================================
// SIGNALING CLIENT
// ============================================================================

/// WebSocket Client für Signaling-Server Kommunikation
///
/// Alle ausgehenden Nachrichten laufen durch eine einzige Queue zum
/// Write-Task; der Close-Frame folgt immer nach allem, was vor `close()`
/// eingereiht wurde.
pub struct SignalingClient {
    server_url: String,
    state: Arc<RwLock<ClientState>>,
    tx: Option<mpsc::UnboundedSender<ClientMessage>>,
    close_tx: Option<oneshot::Sender<()>>,
    writer: Option<JoinHandle<()>>,
    event_tx: broadcast::Sender<SignalingEvent>,
}

impl SignalingClient {
    /// Erstellt einen neuen SignalingClient
    pub fn new(server_url: String) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            server_url,
            state: Arc::new(RwLock::new(ClientState::default())),
            tx: None,
            close_tx: None,
            writer: None,
            event_tx,
        }
    }

    /// Gibt einen Event-Receiver zurück
    pub fn subscribe(&self) -> broadcast::Receiver<SignalingEvent> {
        self.event_tx.subscribe()
    }

    /// Prüft ob verbunden
    pub fn is_connected(&self) -> bool {
        self.state.read().is_connected
    }

    /// Verbindet mit dem Signaling-Server
    ///
    /// Startet einen Read-Task (Frames → Events) und einen Write-Task
    /// (Queue → Socket).
    pub async fn connect(&mut self) -> Result<(), SignalingError> {
        tracing::info!("Connecting to signaling server: {}", self.server_url);

        let (ws_stream, _) = connect_async(self.server_url.as_str())
            .await
            .map_err(|e| SignalingError::ConnectionFailed(e.to_string()))?;

        let (mut write, mut read) = ws_stream.split();

        let (tx, mut rx) = mpsc::unbounded_channel::<ClientMessage>();
        let (close_tx, mut close_rx) = oneshot::channel::<()>();
        self.tx = Some(tx);
        self.close_tx = Some(close_tx);

        self.state.write().is_connected = true;
        let _ = self.event_tx.send(SignalingEvent::Connected);

        // Read-Task starten
        let state_clone = Arc::clone(&self.state);
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            while let Some(msg_result) = read.next().await {
                match msg_result {
                    Ok(Message::Text(text)) => {
                        tracing::debug!("Received message: {}", text);
                        let _ = event_tx.send(Self::decode_frame(&text));
                    }
                    Ok(Message::Close(_)) => {
                        tracing::info!("WebSocket closed by server");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }

            state_clone.write().is_connected = false;
            let _ = event_tx.send(SignalingEvent::Disconnected);
        });

        // Write-Task starten
        self.writer = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    message = rx.recv() => match message {
                        Some(message) => {
                            if !Self::write_message(&mut write, &message).await {
                                return;
                            }
                        }
                        None => break,
                    },

                    _ = &mut close_rx => {
                        // Was vor close() eingereiht wurde, geht noch raus
                        while let Ok(message) = rx.try_recv() {
                            if !Self::write_message(&mut write, &message).await {
                                return;
                            }
                        }
                        break;
                    }
                }
            }

            if let Err(e) = write.send(Message::Close(None)).await {
                tracing::warn!("Failed to send close frame: {}", e);
            }
        }));

        Ok(())
    }

    /// Gibt einen Sender für ausgehende Nachrichten zurück
    pub fn outbox(&self) -> Result<mpsc::UnboundedSender<ClientMessage>, SignalingError> {
        self.tx.clone().ok_or(SignalingError::NotConnected)
    }

    /// Schließt die Verbindung.
    ///
    /// Wartet, bis der Write-Task alle eingereihten Nachrichten und den
    /// Close-Frame geschrieben hat.
    pub async fn close(&mut self) -> Result<(), SignalingError> {
        let close_tx = self.close_tx.take().ok_or(SignalingError::NotConnected)?;
        self.tx = None;

        tracing::info!("Closing signaling connection");
        // Ist der Writer schon weg, gibt es nichts mehr zu flushen
        let _ = close_tx.send(());

        if let Some(writer) = self.writer.take() {
            writer
                .await
                .map_err(|e| SignalingError::WriterFailed(e.to_string()))?;
        }
        Ok(())
    }

    /// Schreibt eine Nachricht; `false` wenn der Socket nicht mehr will
    async fn write_message<S>(write: &mut S, message: &ClientMessage) -> bool
    where
        S: Sink<Message> + Unpin,
        S::Error: std::fmt::Display,
    {
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to encode '{}' message: {}", message.tag(), e);
                return true;
            }
        };

        tracing::debug!("Sending message: {}", text);
        if let Err(e) = write.send(Message::Text(text)).await {
            tracing::error!("Failed to send WebSocket message: {}", e);
            return false;
        }
        true
    }

    /// Übersetzt einen Text-Frame in ein Event
    fn decode_frame(text: &str) -> SignalingEvent {
        match ServerMessage::parse(text) {
            Ok(ServerMessage::Unrecognized) | Err(_) => SignalingEvent::Unrecognized {
                raw: text.to_string(),
            },
            Ok(message) => SignalingEvent::Message(message),
        }
    }
}

impl std::fmt::Debug for SignalingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalingClient")
            .field("server_url", &self.server_url)
            .field("state", &*self.state.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MediaRole;
    use tokio::net::TcpListener;

    /// Startet einen lokalen WebSocket-Server, der `script` ausführt
    async fn loopback<F, Fut, T>(script: F) -> (String, JoinHandle<T>)
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = T> + Send,
        T: Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            script(ws).await
        });

        (format!("ws://{}", addr), server)
    }

    #[test]
    fn test_decode_known_frame() {
        let event = SignalingClient::decode_frame(r#"{"id":"stopCommunication"}"#);
        assert!(matches!(
            event,
            SignalingEvent::Message(ServerMessage::StopCommunication)
        ));
    }

    #[test]
    fn test_decode_unknown_frames() {
        for raw in [r#"{"id":"bogus"}"#, "{not json", r#"{"noId":true}"#] {
            match SignalingClient::decode_frame(raw) {
                SignalingEvent::Unrecognized { raw: r } => assert_eq!(r, raw),
                other => panic!("expected Unrecognized, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_not_connected() {
        let mut client = SignalingClient::new("wss://localhost:8443/call".to_string());

        assert!(!client.is_connected());
        assert!(matches!(client.outbox(), Err(SignalingError::NotConnected)));
        assert!(matches!(
            client.close().await,
            Err(SignalingError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_close_flushes_queued_messages_first() {
        let (url, server) = loopback(|mut ws| async move {
            let mut frames = Vec::new();
            while let Some(Ok(frame)) = ws.next().await {
                match frame {
                    Message::Text(text) => frames.push(text),
                    Message::Close(_) => {
                        frames.push("<close>".to_string());
                        break;
                    }
                    _ => {}
                }
            }
            frames
        })
        .await;

        let mut client = SignalingClient::new(url);
        client.connect().await.unwrap();
        let outbox = client.outbox().unwrap();

        outbox
            .send(ClientMessage::offer(MediaRole::ViewerScreen, "v=0".to_string()))
            .unwrap();
        outbox.send(ClientMessage::Stop).unwrap();
        client.close().await.unwrap();

        let frames = server.await.unwrap();
        assert_eq!(
            frames,
            vec![
                r#"{"id":"vs","sdpOffer":"v=0"}"#,
                r#"{"id":"stop"}"#,
                "<close>"
            ]
        );
        // Nach close() nimmt der Client nichts mehr an
        assert!(client.outbox().is_err());
    }

    #[tokio::test]
    async fn test_server_frames_become_events() {
        let (url, server) = loopback(|mut ws| async move {
            ws.send(Message::Text(r#"{"id":"stopCommunication"}"#.to_string()))
                .await
                .unwrap();
            ws.send(Message::Text(r#"{"id":"whoKnows"}"#.to_string()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut client = SignalingClient::new(url);
        let mut events = client.subscribe();
        client.connect().await.unwrap();

        let mut seen = Vec::new();
        loop {
            let event = events.recv().await.unwrap();
            let done = matches!(event, SignalingEvent::Disconnected);
            seen.push(event);
            if done {
                break;
            }
        }
        server.await.unwrap();

        assert_eq!(seen.len(), 4);
        assert!(matches!(seen[0], SignalingEvent::Connected));
        assert!(matches!(
            seen[1],
            SignalingEvent::Message(ServerMessage::StopCommunication)
        ));
        assert!(matches!(seen[2], SignalingEvent::Unrecognized { .. }));
        assert!(!client.is_connected());
    }
}
