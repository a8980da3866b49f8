//! Public handle for interacting with the relay connection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use peerlink_common::SignalError;
use tokio::sync::{mpsc, RwLock};

use super::connection::connection_loop;
use super::types::{SocketIoConfig, TransportCommand, TransportEvent};
use super::SignalTransport;

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Handle for the background Socket.IO connection.
///
/// All methods are non-blocking and send commands to the connection task.
pub struct SocketIoClient {
    command_tx: mpsc::Sender<TransportCommand>,
    connected: Arc<RwLock<bool>>,
    stopped: Arc<AtomicBool>,
}

impl SocketIoClient {
    /// Create a new client and start the background connection.
    /// Returns `(client, event_receiver)`.
    pub fn connect(config: SocketIoConfig) -> (Self, mpsc::Receiver<TransportEvent>) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (command_tx, command_rx) = mpsc::channel(64);
        let connected = Arc::new(RwLock::new(false));
        let stopped = Arc::new(AtomicBool::new(false));

        let client = Self {
            command_tx,
            connected: Arc::clone(&connected),
            stopped: Arc::clone(&stopped),
        };

        tokio::spawn(connection_loop(
            config, connected, stopped, event_tx, command_rx,
        ));

        (client, event_rx)
    }

    /// Lightweight handle to the same connection.
    pub fn clone_sender(&self) -> Self {
        Self {
            command_tx: self.command_tx.clone(),
            connected: Arc::clone(&self.connected),
            stopped: Arc::clone(&self.stopped),
        }
    }

    pub async fn is_connected(&self) -> bool {
        *self.connected.read().await
    }

    /// Close the connection and stop reconnecting.
    pub async fn disconnect(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        let _ = self.command_tx.send(TransportCommand::Disconnect).await;
    }
}

#[async_trait]
impl SignalTransport for SocketIoClient {
    async fn send(&self, event: &str, payload: serde_json::Value) -> Result<(), SignalError> {
        if !self.is_connected().await {
            return Err(SignalError::TransportDisconnected);
        }
        self.command_tx
            .send(TransportCommand::Emit {
                event: event.to_string(),
                payload,
            })
            .await
            .map_err(|_| SignalError::TransportDisconnected)
    }
}
