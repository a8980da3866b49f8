//! Background WebSocket connection loop with auto-reconnect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use crate::protocol::{events, InboundSignal};

use super::codec::{self, EnginePacket, Handshake, SocketPacket};
use super::types::{SocketIoConfig, TransportCommand, TransportEvent};

// ---------------------------------------------------------------------------
// Connection Loop
// ---------------------------------------------------------------------------

/// Background task managing the WebSocket connection with auto-reconnect.
pub(crate) async fn connection_loop(
    config: SocketIoConfig,
    connected: Arc<RwLock<bool>>,
    stopped: Arc<AtomicBool>,
    event_tx: mpsc::Sender<TransportEvent>,
    command_rx: mpsc::Receiver<TransportCommand>,
) {
    let command_rx = Arc::new(Mutex::new(command_rx));
    let mut reconnect_delay = config.reconnect_delay_secs;
    let connect_timeout = Duration::from_secs(config.connect_timeout_secs);

    loop {
        let url = config.ws_url();
        info!(url = %url.split('?').next().unwrap_or(""), "Connecting to signaling relay");

        match tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(&url)).await {
            Ok(Ok((ws_stream, _))) => {
                let (ws_write, mut ws_read) = ws_stream.split();
                let ws_write = Arc::new(Mutex::new(ws_write));

                // Engine.IO handshake comes first.
                let handshake = match read_handshake(&mut ws_read, connect_timeout).await {
                    Ok(hs) => hs,
                    Err(msg) => {
                        warn!(error = %msg, "Engine.IO handshake failed");
                        let _ = event_tx.send(TransportEvent::Error(msg)).await;
                        backoff(&mut reconnect_delay, &config).await;
                        continue;
                    }
                };
                debug!(sid = %handshake.sid, ping_interval = handshake.ping_interval, "Engine.IO open");
                reconnect_delay = config.reconnect_delay_secs;

                {
                    let mut writer = ws_write.lock().await;
                    let frame = codec::encode_connect(&config.namespace);
                    if writer.send(WsMessage::Text(frame.into())).await.is_err() {
                        drop(writer);
                        backoff(&mut reconnect_delay, &config).await;
                        continue;
                    }
                }

                // Spawn command forwarder.
                let cmd_write = Arc::clone(&ws_write);
                let cmd_rx = Arc::clone(&command_rx);
                let cmd_handle = tokio::spawn(command_forwarder(
                    cmd_rx,
                    cmd_write,
                    config.namespace.clone(),
                ));

                // Process incoming messages.
                let liveness = Duration::from_millis(handshake.liveness_window_ms());
                let mut was_connected = false;
                loop {
                    let next = match tokio::time::timeout(liveness, ws_read.next()).await {
                        Ok(next) => next,
                        Err(_elapsed) => {
                            warn!(
                                window_ms = handshake.liveness_window_ms(),
                                "No ping from relay, dropping connection"
                            );
                            break;
                        }
                    };
                    match next {
                        Some(Ok(WsMessage::Text(text))) => {
                            let flow = handle_frame(
                                &text,
                                &config.namespace,
                                &ws_write,
                                &connected,
                                &event_tx,
                            )
                            .await;
                            match flow {
                                Flow::Continue => {}
                                Flow::Joined => was_connected = true,
                                Flow::Close => break,
                            }
                        }
                        Some(Ok(WsMessage::Close(_))) => {
                            info!("Signaling relay closed connection");
                            break;
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "WebSocket error");
                            break;
                        }
                        None => break,
                        Some(Ok(_)) => {}
                    }
                }

                // Cleanup.
                cmd_handle.abort();
                *connected.write().await = false;
                if was_connected {
                    let _ = event_tx.send(TransportEvent::Disconnected).await;
                }
            }
            Ok(Err(e)) => {
                error!(error = %e, "Failed to connect to signaling relay");
                let _ = event_tx
                    .send(TransportEvent::Error(format!("Connection failed: {e}")))
                    .await;
            }
            Err(_elapsed) => {
                error!(
                    timeout_secs = config.connect_timeout_secs,
                    "WebSocket connection timed out"
                );
                let _ = event_tx
                    .send(TransportEvent::Error(format!(
                        "Connection timed out after {}s",
                        config.connect_timeout_secs
                    )))
                    .await;
            }
        }

        if stopped.load(Ordering::SeqCst) {
            info!("Signaling transport stopped");
            return;
        }
        backoff(&mut reconnect_delay, &config).await;
        if stopped.load(Ordering::SeqCst) {
            return;
        }
    }
}

/// Sleep for the current delay, then double it up to the configured cap.
async fn backoff(reconnect_delay: &mut u64, config: &SocketIoConfig) {
    info!(
        delay = *reconnect_delay,
        "Reconnecting in {} seconds", *reconnect_delay
    );
    tokio::time::sleep(Duration::from_secs(*reconnect_delay)).await;
    *reconnect_delay = (*reconnect_delay * 2).min(config.max_reconnect_delay_secs);
}

async fn read_handshake<S>(read: &mut S, timeout: Duration) -> Result<Handshake, String>
where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + Unpin,
{
    let first = tokio::time::timeout(timeout, read.next())
        .await
        .map_err(|_| "timed out waiting for open packet".to_string())?;
    match first {
        Some(Ok(WsMessage::Text(text))) => match codec::decode_engine(&text) {
            Ok(EnginePacket::Open(hs)) => Ok(hs),
            Ok(other) => Err(format!("expected open packet, got {other:?}")),
            Err(e) => Err(e.to_string()),
        },
        Some(Ok(other)) => Err(format!("unexpected frame before open: {other:?}")),
        Some(Err(e)) => Err(e.to_string()),
        None => Err("connection closed before open".to_string()),
    }
}

// ---------------------------------------------------------------------------
// Frame handling
// ---------------------------------------------------------------------------

enum Flow {
    Continue,
    /// Namespace connect acknowledged.
    Joined,
    Close,
}

async fn handle_frame<S>(
    text: &str,
    namespace: &str,
    ws_write: &Arc<Mutex<S>>,
    connected: &Arc<RwLock<bool>>,
    event_tx: &mpsc::Sender<TransportEvent>,
) -> Flow
where
    S: futures_util::Sink<WsMessage> + Unpin,
{
    let packet = match codec::decode_engine(text) {
        Ok(packet) => packet,
        Err(e) => {
            debug!(error = %e, "Unrecognized frame from relay");
            return Flow::Continue;
        }
    };

    let body = match packet {
        EnginePacket::Ping(_) => {
            let mut writer = ws_write.lock().await;
            if writer.send(WsMessage::Text(codec::PONG.into())).await.is_err() {
                return Flow::Close;
            }
            return Flow::Continue;
        }
        EnginePacket::Close => {
            info!("Relay sent engine.io close");
            return Flow::Close;
        }
        EnginePacket::Message(body) => body,
        EnginePacket::Open(_) | EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => {
            return Flow::Continue;
        }
    };

    let socket_packet = match codec::decode_socket(&body) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "Dropping malformed socket.io packet");
            return Flow::Continue;
        }
    };

    match socket_packet {
        SocketPacket::Connect { namespace: ns, .. } if ns == namespace => {
            *connected.write().await = true;
            info!(namespace = %ns, "Connected to signaling relay");
            let _ = event_tx.send(TransportEvent::Connected).await;
            Flow::Joined
        }
        SocketPacket::ConnectError { namespace: ns, message } => {
            error!(namespace = %ns, message = %message, "Relay refused namespace connect");
            let _ = event_tx.send(TransportEvent::Error(message)).await;
            Flow::Close
        }
        SocketPacket::Disconnect { namespace: ns } if ns == namespace => {
            info!(namespace = %ns, "Relay disconnected namespace");
            Flow::Close
        }
        SocketPacket::Event {
            namespace: ns,
            name,
            payload,
            ..
        } if ns == namespace => {
            let event = if name == events::ME || name == events::WELCOME {
                match InboundSignal::decode(&name, &payload) {
                    Ok(Some(InboundSignal::Welcome { local_id })) => {
                        info!(local_id = %local_id, "Relay assigned local id");
                        TransportEvent::Welcome { local_id }
                    }
                    _ => {
                        warn!(event = %name, "Malformed identity event");
                        return Flow::Continue;
                    }
                }
            } else {
                debug!(event = %name, "Relay event");
                TransportEvent::Message {
                    event: name,
                    payload,
                }
            };
            let _ = event_tx.send(event).await;
            Flow::Continue
        }
        other => {
            debug!(packet = ?other, "Ignoring socket.io packet");
            Flow::Continue
        }
    }
}

// ---------------------------------------------------------------------------
// Command Forwarder
// ---------------------------------------------------------------------------

async fn command_forwarder<S>(
    cmd_rx: Arc<Mutex<mpsc::Receiver<TransportCommand>>>,
    cmd_write: Arc<Mutex<S>>,
    namespace: String,
) where
    S: futures_util::Sink<WsMessage> + Unpin,
{
    let mut rx = cmd_rx.lock().await;
    while let Some(cmd) = rx.recv().await {
        match cmd {
            TransportCommand::Emit { event, payload } => {
                match codec::encode_event(&namespace, &event, &payload) {
                    Ok(frame) => {
                        let mut writer = cmd_write.lock().await;
                        if writer.send(WsMessage::Text(frame.into())).await.is_err() {
                            warn!(event = %event, "Failed to write event to relay");
                        }
                    }
                    Err(e) => warn!(error = %e, "Dropping unencodable event"),
                }
            }
            TransportCommand::Disconnect => {
                let mut writer = cmd_write.lock().await;
                let frame = codec::encode_disconnect(&namespace);
                let _ = writer.send(WsMessage::Text(frame.into())).await;
                let _ = writer.send(WsMessage::Close(None)).await;
                return; // Exit the command forwarder
            }
        }
    }
}
