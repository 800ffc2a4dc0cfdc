//! Message Types für das Signaling-Protokoll
//!
//! Jede Nachricht ist ein JSON-Objekt mit einem `id`-Feld, das den Typ
//! bestimmt. Die Feldnamen entsprechen exakt dem, was der Media-Server
//! sendet und erwartet.

use crate::session::MediaRole;
use serde::{Deserialize, Serialize};

/// Wert von `response`, wenn der Server ein Offer akzeptiert hat
pub const RESPONSE_ACCEPTED: &str = "accepted";

/// Fallback-Grund, wenn der Server bei einer Ablehnung keinen liefert
pub const DEFAULT_REJECT_REASON: &str = "Unknown error";

// ============================================================================
// SHARED TYPES
// ============================================================================

/// ICE Candidate wie er über die Leitung geht
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(
        rename = "sdpMLineIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_m_line_index: Option<u16>,
}

// ============================================================================
// CLIENT → SERVER MESSAGES
// ============================================================================

/// Alle Nachrichten, die der Client an den Server schickt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "id")]
pub enum ClientMessage {
    /// Offer für den Bildschirm des Presenters
    #[serde(rename = "ps")]
    PresenterScreen {
        #[serde(rename = "sdpOffer")]
        sdp_offer: String,
    },

    /// Offer für die Kamera des Presenters
    #[serde(rename = "pc")]
    PresenterCamera {
        #[serde(rename = "sdpOffer")]
        sdp_offer: String,
    },

    /// Offer eines Viewers für den Bildschirm
    #[serde(rename = "vs")]
    ViewerScreen {
        #[serde(rename = "sdpOffer")]
        sdp_offer: String,
    },

    /// Offer eines Viewers für die Kamera
    #[serde(rename = "vc")]
    ViewerCamera {
        #[serde(rename = "sdpOffer")]
        sdp_offer: String,
    },

    /// Lokaler ICE Candidate einer Bildschirm-Verbindung
    #[serde(rename = "onIceCandidateScreen")]
    OnIceCandidateScreen { candidate: IceCandidate },

    /// Lokaler ICE Candidate einer Kamera-Verbindung
    #[serde(rename = "onIceCandidateCamera")]
    OnIceCandidateCamera { candidate: IceCandidate },

    /// Session beenden
    #[serde(rename = "stop")]
    Stop,
}

impl ClientMessage {
    /// Verpackt ein SDP Offer mit dem Tag der jeweiligen Rolle
    pub fn offer(role: MediaRole, sdp_offer: String) -> Self {
        match role {
            MediaRole::PresenterScreen => Self::PresenterScreen { sdp_offer },
            MediaRole::PresenterCamera => Self::PresenterCamera { sdp_offer },
            MediaRole::ViewerScreen => Self::ViewerScreen { sdp_offer },
            MediaRole::ViewerCamera => Self::ViewerCamera { sdp_offer },
        }
    }

    /// Verpackt einen lokalen ICE Candidate.
    ///
    /// Presenter und Viewer teilen sich dieselben Tags, entscheidend ist
    /// nur die Quelle (Bildschirm oder Kamera).
    pub fn ice_candidate(role: MediaRole, candidate: IceCandidate) -> Self {
        if role.is_screen() {
            Self::OnIceCandidateScreen { candidate }
        } else {
            Self::OnIceCandidateCamera { candidate }
        }
    }

    /// Der `id`-Tag dieser Nachricht
    pub fn tag(&self) -> &'static str {
        match self {
            Self::PresenterScreen { .. } => "ps",
            Self::PresenterCamera { .. } => "pc",
            Self::ViewerScreen { .. } => "vs",
            Self::ViewerCamera { .. } => "vc",
            Self::OnIceCandidateScreen { .. } => "onIceCandidateScreen",
            Self::OnIceCandidateCamera { .. } => "onIceCandidateCamera",
            Self::Stop => "stop",
        }
    }
}

// ============================================================================
// SERVER → CLIENT MESSAGES
// ============================================================================

/// Antwort des Servers auf ein Offer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SdpResponse {
    pub response: String,
    #[serde(rename = "sdpAnswer", default)]
    pub sdp_answer: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl SdpResponse {
    pub fn is_accepted(&self) -> bool {
        self.response == RESPONSE_ACCEPTED
    }

    /// Grund der Ablehnung, mit Fallback wenn der Server keinen mitschickt
    pub fn reject_reason(&self) -> &str {
        self.message
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_REJECT_REASON)
    }
}

/// Remote ICE Candidate vom Server
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteCandidate {
    pub candidate: IceCandidate,
}

/// Alle möglichen Server-Nachrichten
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "id", rename_all = "camelCase")]
pub enum ServerMessage {
    PresenterScreenResponse(SdpResponse),
    PresenterCameraResponse(SdpResponse),
    ViewerScreenResponse(SdpResponse),
    ViewerCameraResponse(SdpResponse),

    IceCandidateScreen(RemoteCandidate),
    IceCandidateCamera(RemoteCandidate),
    IceCandidateViewerScreen(RemoteCandidate),
    IceCandidateViewerCamera(RemoteCandidate),

    /// Der Presenter hat beendet, alle Verbindungen abbauen
    StopCommunication,

    /// Jeder `id`-Tag außerhalb des Vokabulars
    #[serde(other)]
    Unrecognized,
}

impl ServerMessage {
    /// Parst einen Text-Frame
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candidate() -> IceCandidate {
        IceCandidate {
            candidate: "candidate:1 1 UDP 2122252543 192.168.1.2 54321 typ host".to_string(),
            sdp_mid: Some("0".to_string()),
            sdp_m_line_index: Some(0),
        }
    }

    #[test]
    fn test_offer_tags_per_role() {
        let expected = [
            (MediaRole::PresenterScreen, "ps"),
            (MediaRole::PresenterCamera, "pc"),
            (MediaRole::ViewerScreen, "vs"),
            (MediaRole::ViewerCamera, "vc"),
        ];

        for (role, tag) in expected {
            let msg = ClientMessage::offer(role, "v=0".to_string());
            let value = serde_json::to_value(&msg).unwrap();
            assert_eq!(value, json!({ "id": tag, "sdpOffer": "v=0" }));
            assert_eq!(msg.tag(), tag);
        }
    }

    #[test]
    fn test_ice_candidate_tag_follows_source() {
        let screen = ClientMessage::ice_candidate(MediaRole::ViewerScreen, candidate());
        let camera = ClientMessage::ice_candidate(MediaRole::PresenterCamera, candidate());

        assert_eq!(screen.tag(), "onIceCandidateScreen");
        assert_eq!(camera.tag(), "onIceCandidateCamera");

        let value = serde_json::to_value(&camera).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "onIceCandidateCamera",
                "candidate": {
                    "candidate": "candidate:1 1 UDP 2122252543 192.168.1.2 54321 typ host",
                    "sdpMid": "0",
                    "sdpMLineIndex": 0
                }
            })
        );
    }

    #[test]
    fn test_stop_has_no_payload() {
        let value = serde_json::to_value(&ClientMessage::Stop).unwrap();
        assert_eq!(value, json!({ "id": "stop" }));
    }

    #[test]
    fn test_parse_accepted_response() {
        let msg = ServerMessage::parse(
            r#"{"id":"presenterScreenResponse","response":"accepted","sdpAnswer":"v=0 answer"}"#,
        )
        .unwrap();

        match msg {
            ServerMessage::PresenterScreenResponse(ref resp) => {
                assert!(resp.is_accepted());
                assert_eq!(resp.sdp_answer.as_deref(), Some("v=0 answer"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_reject_reason_fallback() {
        let with_reason = ServerMessage::parse(
            r#"{"id":"viewerScreenResponse","response":"rejected","message":"busy"}"#,
        )
        .unwrap();
        let without_reason =
            ServerMessage::parse(r#"{"id":"viewerCameraResponse","response":"rejected"}"#).unwrap();

        let ServerMessage::ViewerScreenResponse(resp) = with_reason else {
            panic!("expected viewerScreenResponse");
        };
        assert!(!resp.is_accepted());
        assert_eq!(resp.reject_reason(), "busy");

        let ServerMessage::ViewerCameraResponse(resp) = without_reason else {
            panic!("expected viewerCameraResponse");
        };
        assert_eq!(resp.reject_reason(), DEFAULT_REJECT_REASON);
    }

    #[test]
    fn test_parse_remote_candidates() {
        let msg = ServerMessage::parse(
            r#"{"id":"iceCandidateViewerCamera","candidate":{"candidate":"candidate:2","sdpMid":"1","sdpMLineIndex":1}}"#,
        )
        .unwrap();

        let ServerMessage::IceCandidateViewerCamera(remote) = msg else {
            panic!("expected iceCandidateViewerCamera");
        };
        assert_eq!(remote.candidate.sdp_m_line_index, Some(1));
    }

    #[test]
    fn test_parse_stop_and_unknown() {
        assert_eq!(
            ServerMessage::parse(r#"{"id":"stopCommunication"}"#).unwrap(),
            ServerMessage::StopCommunication
        );
        assert_eq!(
            ServerMessage::parse(r#"{"id":"somethingElse","foo":1}"#).unwrap(),
            ServerMessage::Unrecognized
        );
        assert!(ServerMessage::parse(r#"{"response":"accepted"}"#).is_err());
        assert!(ServerMessage::parse("not json").is_err());
    }
}
