//! Konfiguration aus Umgebungsvariablen
//!
//! - `SIGNALING_URL`: WebSocket-Endpunkt des Media-Servers
//! - `STUN_SERVERS`: kommagetrennte STUN-URLs (leer = keine)
//! - `TURN_URL`, `TURN_USERNAME`, `TURN_CREDENTIAL`: optionaler TURN-Server

use crate::peer::default_ice_servers;
use thiserror::Error;
use url::Url;
use webrtc::ice_transport::ice_server::RTCIceServer;

pub const DEFAULT_SIGNALING_URL: &str = "wss://localhost:8443/call";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid signaling URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Signaling URL must use ws:// or wss://, got '{0}'")]
    UnsupportedScheme(String),

    #[error("TURN_URL, TURN_USERNAME and TURN_CREDENTIAL must be set together")]
    IncompleteTurn,
}

/// Laufzeit-Konfiguration des Clients
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub signaling_url: Url,
    pub ice_servers: Vec<RTCIceServer>,
}

impl ClientConfig {
    /// Liest die Konfiguration aus der Prozess-Umgebung
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Liest die Konfiguration über eine beliebige Lookup-Funktion
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_url = lookup("SIGNALING_URL").unwrap_or_else(|| DEFAULT_SIGNALING_URL.to_string());
        let signaling_url = parse_signaling_url(&raw_url)?;

        let mut ice_servers = match lookup("STUN_SERVERS") {
            Some(list) => {
                let urls: Vec<String> = list
                    .split(',')
                    .map(str::trim)
                    .filter(|u| !u.is_empty())
                    .map(str::to_string)
                    .collect();
                if urls.is_empty() {
                    Vec::new()
                } else {
                    vec![RTCIceServer {
                        urls,
                        ..Default::default()
                    }]
                }
            }
            None => default_ice_servers(),
        };

        match (
            lookup("TURN_URL"),
            lookup("TURN_USERNAME"),
            lookup("TURN_CREDENTIAL"),
        ) {
            (Some(url), Some(username), Some(credential)) => {
                ice_servers.push(RTCIceServer {
                    urls: vec![url],
                    username,
                    credential,
                    ..Default::default()
                });
            }
            (None, None, None) => {}
            _ => return Err(ConfigError::IncompleteTurn),
        }

        Ok(Self {
            signaling_url,
            ice_servers,
        })
    }
}

fn parse_signaling_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;

    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(ConfigError::UnsupportedScheme(other.to_string())),
    }
}
