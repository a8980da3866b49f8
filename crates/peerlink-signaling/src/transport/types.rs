//! Configuration and event/command enums for the Socket.IO client.

use peerlink_common::PeerId;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Where and how to reach the relay.
#[derive(Debug, Clone)]
pub struct SocketIoConfig {
    /// Relay base URL; `http(s)` or `ws(s)`.
    pub url: String,
    /// Socket.IO endpoint path.
    pub path: String,
    /// Socket.IO namespace to connect.
    pub namespace: String,
    pub connect_timeout_secs: u64,
    /// Reconnect base delay in seconds.
    pub reconnect_delay_secs: u64,
    /// Maximum reconnect delay in seconds.
    pub max_reconnect_delay_secs: u64,
}

impl Default for SocketIoConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:5000".to_string(),
            path: "/socket.io/".to_string(),
            namespace: "/".to_string(),
            connect_timeout_secs: 15,
            reconnect_delay_secs: 1,
            max_reconnect_delay_secs: 30,
        }
    }
}

impl SocketIoConfig {
    /// WebSocket URL for the Engine.IO v4 websocket transport.
    pub fn ws_url(&self) -> String {
        let base = self.url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        };
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("{base}{path}?EIO=4&transport=websocket")
    }
}

// ---------------------------------------------------------------------------
// Events & Commands
// ---------------------------------------------------------------------------

/// Events emitted by the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Namespace connected; sends will now go through.
    Connected,
    /// The relay told us our id.
    Welcome { local_id: PeerId },
    /// Any other relay event.
    Message {
        event: String,
        payload: serde_json::Value,
    },
    /// Connection lost. Reconnection is attempted in the background.
    Disconnected,
    Error(String),
}

#[derive(Debug)]
pub(crate) enum TransportCommand {
    Emit {
        event: String,
        payload: serde_json::Value,
    },
    Disconnect,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_url_maps_http_schemes() {
        let config = SocketIoConfig::default();
        assert_eq!(
            config.ws_url(),
            "ws://localhost:5000/socket.io/?EIO=4&transport=websocket"
        );

        let config = SocketIoConfig {
            url: "https://relay.example.org/".into(),
            path: "signal/".into(),
            ..SocketIoConfig::default()
        };
        assert_eq!(
            config.ws_url(),
            "wss://relay.example.org/signal/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn ws_url_keeps_websocket_schemes() {
        let config = SocketIoConfig {
            url: "wss://relay.example.org".into(),
            ..SocketIoConfig::default()
        };
        assert!(config.ws_url().starts_with("wss://relay.example.org/socket.io/"));
    }
}
