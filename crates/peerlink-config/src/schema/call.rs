use serde::{Deserialize, Serialize};

/// Call behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// Send `hangup` to the remote side when hanging up locally.
    pub notify_peer_on_hangup: bool,
    /// Send `hangup` to the caller when declining an incoming call.
    pub notify_peer_on_decline: bool,
    /// Capacity of the lifecycle event channel (valid range: 16-65536).
    pub event_buffer: u32,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            notify_peer_on_hangup: true,
            notify_peer_on_decline: true,
            event_buffer: 256,
        }
    }
}
