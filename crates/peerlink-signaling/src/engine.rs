//! Contract for the WebRTC engine that owns the actual peer connections.
//!
//! The orchestrator never touches SDP or ICE internals; it drives a
//! [`PeerConnection`] through these calls and listens for [`EngineEvent`]s.

use std::sync::Arc;

use async_trait::async_trait;
use peerlink_common::{IceServer, PeerId, SignalError};
use tokio::sync::mpsc;

use crate::media::{Track, TrackKind, TrackSet};
use crate::protocol::{IceCandidate, SessionDescription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Checking,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Events raised by the engine for a specific connection.
///
/// `call_id` is the tag the connection was created with. Events from a
/// connection that no longer belongs to the peer's current session are
/// dropped.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A trickled local candidate ready to be sent to the remote peer.
    LocalCandidate {
        peer: PeerId,
        call_id: String,
        candidate: IceCandidate,
    },
    ConnectionState {
        peer: PeerId,
        call_id: String,
        state: ConnectionState,
    },
}

impl EngineEvent {
    pub fn peer(&self) -> &PeerId {
        match self {
            Self::LocalCandidate { peer, .. } | Self::ConnectionState { peer, .. } => peer,
        }
    }

    pub fn call_id(&self) -> &str {
        match self {
            Self::LocalCandidate { call_id, .. } | Self::ConnectionState { call_id, .. } => call_id,
        }
    }
}

/// One peer connection.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn add_tracks(&self, tracks: &TrackSet) -> Result<(), SignalError>;
    async fn create_offer(&self) -> Result<SessionDescription, SignalError>;
    async fn create_answer(&self) -> Result<SessionDescription, SignalError>;
    async fn set_local_description(&self, desc: &SessionDescription) -> Result<(), SignalError>;
    async fn set_remote_description(&self, desc: &SessionDescription) -> Result<(), SignalError>;
    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<(), SignalError>;

    /// Swap the outgoing track of `kind`. No matching sender is a no-op.
    async fn replace_track(&self, kind: TrackKind, track: &Track) -> Result<(), SignalError>;

    async fn close(&self);
}

/// Creates peer connections. Events for the new connection go to `events`,
/// tagged with `call_id`.
#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn create(
        &self,
        peer: &PeerId,
        call_id: &str,
        ice_servers: &[IceServer],
        events: mpsc::Sender<EngineEvent>,
    ) -> Result<Arc<dyn PeerConnection>, SignalError>;
}
