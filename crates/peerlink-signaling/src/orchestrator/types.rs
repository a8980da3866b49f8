//! Orchestrator configuration and the lifecycle events it emits.

use peerlink_common::{IceServer, PeerId};
use serde::Serialize;

use crate::media::{MediaConstraints, TrackKind};
use crate::session::FailureReason;

/// Settings for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Sent as `displayName` with every outbound call.
    pub display_name: String,
    pub ice_servers: Vec<IceServer>,
    pub constraints: MediaConstraints,
    /// Send `hangup` to the peer on a local hangup.
    pub notify_peer_on_hangup: bool,
    /// Send `hangup` to the peer when declining.
    pub notify_peer_on_decline: bool,
    /// Capacity of the lifecycle event channel.
    pub event_buffer: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            display_name: "peerlink".to_string(),
            ice_servers: vec![IceServer::default()],
            constraints: MediaConstraints::default(),
            notify_peer_on_hangup: true,
            notify_peer_on_decline: true,
            event_buffer: 256,
        }
    }
}

/// Lifecycle events for UI collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallEvent {
    IncomingCall {
        peer_id: PeerId,
        display_name: Option<String>,
    },
    Connected {
        peer_id: PeerId,
    },
    Ended {
        peer_id: PeerId,
    },
    Declined {
        peer_id: PeerId,
    },
    Failed {
        peer_id: PeerId,
        reason: FailureReason,
    },
    /// The relay connection dropped; every listed session failed with it.
    TransportLost {
        failed: Vec<PeerId>,
    },
    PeerJoined {
        peer_id: PeerId,
    },
    PeerLeft {
        peer_id: PeerId,
    },
    TrackToggled {
        kind: TrackKind,
        enabled: bool,
    },
    ScreenShareChanged {
        sharing: bool,
    },
}
