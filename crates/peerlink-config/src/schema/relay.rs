use serde::{Deserialize, Serialize};

/// Configuration for the Socket.IO signaling relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Base URL of the relay (`http`, `https`, `ws` or `wss`).
    pub url: String,
    /// Socket.IO endpoint path.
    pub path: String,
    /// Socket.IO namespace to connect to.
    pub namespace: String,
    /// Seconds to wait for the WebSocket handshake (valid range: 1-120).
    pub connect_timeout_secs: u32,
    /// Initial reconnect backoff in seconds (valid range: 1-60).
    pub reconnect_delay_secs: u32,
    /// Upper bound for the reconnect backoff (valid range: 1-600).
    pub max_reconnect_delay_secs: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:5000".into(),
            path: "/socket.io/".into(),
            namespace: "/".into(),
            connect_timeout_secs: 15,
            reconnect_delay_secs: 1,
            max_reconnect_delay_secs: 30,
        }
    }
}
