use serde::{Deserialize, Serialize};

/// One STUN/TURN endpoint handed to the WebRTC engine.
///
/// Mirrors the shape of `RTCIceServer`: TURN entries carry credentials,
/// STUN entries leave them empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }

    /// Whether any of the urls needs TURN credentials.
    pub fn is_turn(&self) -> bool {
        self.urls
            .iter()
            .any(|u| u.starts_with("turn:") || u.starts_with("turns:"))
    }
}

impl Default for IceServer {
    fn default() -> Self {
        Self::stun("stun:stun.l.google.com:19302")
    }
}
