use peerlink_common::IceServer;
use serde::{Deserialize, Serialize};

/// STUN/TURN endpoints passed to every new peer connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IceConfig {
    pub servers: Vec<IceServer>,
}

impl Default for IceConfig {
    fn default() -> Self {
        Self {
            servers: vec![IceServer::default()],
        }
    }
}
