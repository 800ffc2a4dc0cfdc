//! Medien-Rollen einer Session

use std::fmt;

/// Quelle eines Medienstroms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaSource {
    Screen,
    Camera,
}

/// Richtung einer Peer Connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Presenter: lokales Video wird gesendet
    SendOnly,
    /// Viewer: entferntes Video wird empfangen
    RecvOnly,
}

/// Eine der vier festen Rollen; jede besitzt höchstens eine Peer Connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaRole {
    PresenterScreen,
    PresenterCamera,
    ViewerScreen,
    ViewerCamera,
}

impl MediaRole {
    pub const ALL: [MediaRole; 4] = [
        MediaRole::PresenterScreen,
        MediaRole::PresenterCamera,
        MediaRole::ViewerScreen,
        MediaRole::ViewerCamera,
    ];

    /// Rollen, die `start_presenter` aufbaut (Bildschirm zuerst)
    pub const PRESENTER: [MediaRole; 2] = [MediaRole::PresenterScreen, MediaRole::PresenterCamera];

    /// Rollen, die `start_viewer` aufbaut (Bildschirm zuerst)
    pub const VIEWER: [MediaRole; 2] = [MediaRole::ViewerScreen, MediaRole::ViewerCamera];

    /// Slot-Index innerhalb der Session
    pub(crate) fn index(self) -> usize {
        match self {
            MediaRole::PresenterScreen => 0,
            MediaRole::PresenterCamera => 1,
            MediaRole::ViewerScreen => 2,
            MediaRole::ViewerCamera => 3,
        }
    }

    pub fn source(self) -> MediaSource {
        match self {
            MediaRole::PresenterScreen | MediaRole::ViewerScreen => MediaSource::Screen,
            MediaRole::PresenterCamera | MediaRole::ViewerCamera => MediaSource::Camera,
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            MediaRole::PresenterScreen | MediaRole::PresenterCamera => Direction::SendOnly,
            MediaRole::ViewerScreen | MediaRole::ViewerCamera => Direction::RecvOnly,
        }
    }

    pub fn is_screen(self) -> bool {
        self.source() == MediaSource::Screen
    }
}

impl fmt::Display for MediaRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaRole::PresenterScreen => "presenter-screen",
            MediaRole::PresenterCamera => "presenter-camera",
            MediaRole::ViewerScreen => "viewer-screen",
            MediaRole::ViewerCamera => "viewer-camera",
        };
        f.write_str(name)
    }
}
