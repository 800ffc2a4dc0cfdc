//! Session Module - Rollen, Peers und Controls
//!
//! Dieses Modul verwaltet:
//! - Die vier Medien-Rollen (Presenter/Viewer × Bildschirm/Kamera)
//! - Eine Peer Connection pro aktiver Rolle
//! - Den Zustand der Bedien-Elemente

mod client;
mod controls;
mod role;

pub use client::Session;
pub use controls::{Command, CommandError, ControlState, Controls};
pub use role::{Direction, MediaRole, MediaSource};
