//! Relay transport: the [`SignalTransport`] seam and a Socket.IO client.

pub mod codec;
mod client;
mod connection;
mod types;

use async_trait::async_trait;
use peerlink_common::SignalError;

pub use client::SocketIoClient;
pub use types::{SocketIoConfig, TransportEvent};

/// Outbound half of the relay connection.
#[async_trait]
pub trait SignalTransport: Send + Sync {
    /// Emit `event` with `payload`. Fails with `TransportDisconnected` while
    /// the relay is unreachable.
    async fn send(&self, event: &str, payload: serde_json::Value) -> Result<(), SignalError>;
}
