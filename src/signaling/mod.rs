//! Signaling Module - WebSocket Client für den Media-Server
//!
//! Dieses Modul verwaltet die Kommunikation mit dem Signaling-Server:
//! - WebSocket-Verbindung aufbauen und schließen
//! - Nachrichten serialisieren und senden
//! - Eingehende Nachrichten parsen und weiterleiten
//!

mod client;
mod messages;

pub use client::{SignalingClient, SignalingError, SignalingEvent};
pub use messages::*;
