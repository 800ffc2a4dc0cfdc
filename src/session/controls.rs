//! Bedien-Elemente der Konsole
//!
//! Ersetzt die drei Buttons (Presenter, Viewer, Stop) und den
//! Spinner der Video-Elemente durch einen einfachen Zustand.

use std::str::FromStr;
use thiserror::Error;

/// Befehle, die über die Konsole kommen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StartPresenter,
    StartViewer,
    Stop,
    Quit,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}' (expected presenter, viewer, stop or quit)")]
    Unknown(String),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "presenter" => Ok(Command::StartPresenter),
            "viewer" => Ok(Command::StartViewer),
            "stop" => Ok(Command::Stop),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

/// Welche Buttons gerade aktiv sind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlState {
    /// Presenter und Viewer aktiv, Stop deaktiviert
    #[default]
    Idle,
    /// Nur Stop aktiv
    Active,
}

/// UI-Zustand einer Session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Controls {
    pub state: ControlState,
    pub spinner: bool,
}

impl Controls {
    /// Presenter/Viewer gestartet: Spinner zeigen, nur Stop erlauben
    pub fn activate(&mut self) {
        self.spinner = true;
        self.state = ControlState::Active;
    }

    /// Nach dem Abbau: Spinner weg, Start-Buttons wieder aktiv
    pub fn reset(&mut self) {
        self.spinner = false;
        self.state = ControlState::Idle;
    }

    /// Ob ein Befehl im aktuellen Zustand erlaubt ist
    pub fn allows(&self, command: Command) -> bool {
        match command {
            Command::StartPresenter | Command::StartViewer => self.state == ControlState::Idle,
            Command::Stop => self.state == ControlState::Active,
            Command::Quit => true,
        }
    }
}
