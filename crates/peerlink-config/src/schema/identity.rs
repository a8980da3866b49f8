use serde::{Deserialize, Serialize};

/// How this client presents itself to the people it calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Sent as `displayName` with every outbound call.
    pub display_name: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            display_name: "peerlink".into(),
        }
    }
}
