//! The orchestrator facade: public commands and shared state.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use futures_util::future::join_all;
use peerlink_common::{PeerId, SignalError};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::{EngineEvent, PeerConnectionFactory};
use crate::media::{LocalMedia, MediaEvent, MediaTrackController, Track, TrackKind, TrackSet};
use crate::protocol::events;
use crate::session::{EndAction, SessionRegistry, SessionSnapshot, Termination};
use crate::transport::{SignalTransport, TransportEvent};

use super::types::{CallEvent, OrchestratorConfig};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub(super) struct RoomState {
    pub(super) room: Option<String>,
    pub(super) members: BTreeSet<PeerId>,
}

pub(super) struct Inner {
    pub(super) config: OrchestratorConfig,
    pub(super) local_id: RwLock<PeerId>,
    pub(super) transport: Arc<dyn SignalTransport>,
    pub(super) media: LocalMedia,
    pub(super) media_tx: mpsc::Sender<MediaEvent>,
    media_rx: Mutex<Option<mpsc::Receiver<MediaEvent>>>,
    pub(super) engine: Arc<dyn PeerConnectionFactory>,
    pub(super) engine_tx: mpsc::Sender<EngineEvent>,
    engine_rx: Mutex<Option<mpsc::Receiver<EngineEvent>>>,
    pub(super) registry: SessionRegistry,
    pub(super) room: RwLock<RoomState>,
    pub(super) track_enabled: RwLock<HashMap<TrackKind, bool>>,
    /// Display track while a screen share is active.
    pub(super) screen: Mutex<Option<Track>>,
    pub(super) event_tx: mpsc::Sender<CallEvent>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs every peer session over one relay transport.
///
/// Cheap to clone; all clones drive the same sessions.
#[derive(Clone)]
pub struct Orchestrator {
    pub(super) inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        local_id: PeerId,
        transport: Arc<dyn SignalTransport>,
        controller: Arc<dyn MediaTrackController>,
        engine: Arc<dyn PeerConnectionFactory>,
    ) -> (Self, mpsc::Receiver<CallEvent>) {
        let buffer = config.event_buffer.max(1);
        let (event_tx, event_rx) = mpsc::channel(buffer);
        let (engine_tx, engine_rx) = mpsc::channel(buffer);
        let (media_tx, media_rx) = mpsc::channel(16);
        let orchestrator = Self {
            inner: Arc::new(Inner {
                config,
                local_id: RwLock::new(local_id),
                transport,
                media: LocalMedia::new(controller),
                media_tx,
                media_rx: Mutex::new(Some(media_rx)),
                engine,
                engine_tx,
                engine_rx: Mutex::new(Some(engine_rx)),
                registry: SessionRegistry::new(),
                room: RwLock::new(RoomState::default()),
                track_enabled: RwLock::new(HashMap::new()),
                screen: Mutex::new(None),
                event_tx,
            }),
        };
        (orchestrator, event_rx)
    }

    /// Start processing transport, engine and media events in the
    /// background.
    pub fn spawn(&self, mut transport_rx: mpsc::Receiver<TransportEvent>) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut engine_rx = this.inner.engine_rx.lock().await.take();
            let mut media_rx = this.inner.media_rx.lock().await.take();
            if engine_rx.is_none() || media_rx.is_none() {
                warn!("Engine or media events already consumed by another loop");
            }
            loop {
                tokio::select! {
                    event = transport_rx.recv() => match event {
                        Some(event) => this.handle_transport_event(event).await,
                        None => {
                            info!("Transport event stream closed, orchestrator stopping");
                            break;
                        }
                    },
                    Some(event) = next_event(&mut engine_rx) => {
                        this.handle_engine_event(event).await;
                    }
                    Some(event) = next_event(&mut media_rx) => {
                        this.handle_media_event(event).await;
                    }
                }
            }
        })
    }

    pub async fn local_id(&self) -> PeerId {
        self.inner.local_id.read().await.clone()
    }

    pub(super) async fn set_local_id(&self, id: PeerId) {
        let mut local = self.inner.local_id.write().await;
        if *local != id {
            info!(old = %local, new = %id, "Local id updated");
            *local = id;
        }
    }

    pub(super) async fn emit_event(&self, event: CallEvent) {
        let _ = self.inner.event_tx.send(event).await;
    }

    /// Serialize and send a signaling message.
    pub(super) async fn emit<T: Serialize>(&self, event: &str, payload: &T) -> Result<(), SignalError> {
        let value = serde_json::to_value(payload)
            .map_err(|e| SignalError::Transport(format!("encode {event}: {e}")))?;
        self.inner.transport.send(event, value).await
    }

    // -----------------------------------------------------------------------
    // Calls
    // -----------------------------------------------------------------------

    /// Call `peer`. Fails only if a live session with `peer` already exists;
    /// later failures arrive as [`CallEvent::Failed`].
    pub async fn call(&self, peer: &PeerId) -> Result<(), SignalError> {
        let handle = self.inner.registry.create_outbound(peer).await?;
        self.run_call(peer, handle).await;
        Ok(())
    }

    /// Accept a pending incoming call. Unknown or late accepts are ignored.
    pub async fn accept_incoming(&self, peer: &PeerId) {
        match self.inner.registry.get(peer).await {
            Some(handle) => self.run_accept(peer, handle).await,
            None => debug!(peer = %peer, "Accept for unknown session ignored"),
        }
    }

    /// Decline a pending incoming call. No-op once the call is accepted.
    pub async fn decline_incoming(&self, peer: &PeerId) {
        let Some(handle) = self.inner.registry.get(peer).await else {
            debug!(peer = %peer, "Decline for unknown session ignored");
            return;
        };
        let teardown = {
            let mut session = handle.state.lock().await;
            match session.decline() {
                Some(EndAction::FinalizeNow) => session.finalize(),
                Some(_) => None,
                None => {
                    debug!(peer = %peer, state = ?session.state(), "Decline ignored");
                    None
                }
            }
        };
        if let Some(td) = teardown {
            info!(peer = %peer, "Incoming call declined");
            self.teardown(&handle, td).await;
        }
    }

    /// Hang up on `peer`. If a step is in flight the session ends at its
    /// next resumption point.
    pub async fn hangup(&self, peer: &PeerId) {
        match self.inner.registry.get(peer).await {
            Some(handle) => {
                self.end_session(&handle, Termination::LocalHangup).await;
            }
            None => debug!(peer = %peer, "Hangup for unknown session ignored"),
        }
    }

    pub async fn session(&self, peer: &PeerId) -> Option<SessionSnapshot> {
        self.inner.registry.snapshot(peer).await
    }

    pub async fn sessions(&self) -> Vec<SessionSnapshot> {
        self.inner.registry.snapshots().await
    }

    // -----------------------------------------------------------------------
    // Rooms
    // -----------------------------------------------------------------------

    /// Join a relay room; members announced afterwards become call targets.
    pub async fn join_room(&self, room: &str) -> Result<(), SignalError> {
        self.inner
            .transport
            .send(events::JOIN_ROOM, serde_json::json!(room))
            .await?;
        let mut state = self.inner.room.write().await;
        state.room = Some(room.to_string());
        state.members.clear();
        info!(room, "Joined room");
        Ok(())
    }

    pub async fn room_members(&self) -> Vec<PeerId> {
        self.inner.room.read().await.members.iter().cloned().collect()
    }

    /// Call every room member we have no live session with.
    pub async fn call_room(&self) -> Vec<(PeerId, Result<(), SignalError>)> {
        let members = self.room_members().await;
        let mut targets = Vec::with_capacity(members.len());
        for member in members {
            let live = match self.inner.registry.get(&member).await {
                Some(handle) => handle.state.lock().await.is_live(),
                None => false,
            };
            if !live {
                targets.push(member);
            }
        }
        info!(count = targets.len(), "Calling room members");
        let results = join_all(targets.iter().map(|peer| self.call(peer))).await;
        targets.into_iter().zip(results).collect()
    }

    // -----------------------------------------------------------------------
    // Local media
    // -----------------------------------------------------------------------

    /// Flip the enabled flag of the local `kind` track. Returns the new flag.
    pub async fn toggle_track(&self, kind: TrackKind) -> Result<bool, SignalError> {
        let tracks = self.inner.media.tracks().await.unwrap_or_default();
        if !tracks.has(kind) {
            return Err(SignalError::DeviceUnavailable(format!("no local {kind} track")));
        }
        let enabled = {
            let mut flags = self.inner.track_enabled.write().await;
            let flag = flags.entry(kind).or_insert(true);
            *flag = !*flag;
            *flag
        };
        self.inner.media.controller().set_enabled(kind, enabled).await;
        info!(%kind, enabled, "Local track toggled");
        self.emit_event(CallEvent::TrackToggled { kind, enabled }).await;
        Ok(enabled)
    }

    /// Replace the outgoing camera with a display capture. No-op while
    /// already sharing.
    ///
    /// The screen picker may take a while, so the capture is opened before
    /// taking the share lock. A capture that lost the race is released.
    pub async fn share_screen(&self) -> Result<(), SignalError> {
        if self.is_sharing_screen().await {
            debug!("Screen share already active");
            return Ok(());
        }
        let controller = self.inner.media.controller();
        let capture = controller.acquire_display(self.inner.media_tx.clone()).await?;

        let mut screen = self.inner.screen.lock().await;
        if screen.is_some() {
            debug!(track = %capture.id, "Screen share started elsewhere, dropping capture");
            drop(screen);
            controller.release(TrackSet(vec![capture])).await;
            return Ok(());
        }
        controller.replace_track(TrackKind::Video, capture.clone()).await;
        self.swap_video(&capture).await;
        info!(track = %capture.id, "Screen share started");
        *screen = Some(capture);
        drop(screen);

        self.emit_event(CallEvent::ScreenShareChanged { sharing: true }).await;
        Ok(())
    }

    /// Restore the camera track and release the display capture. No-op
    /// when not sharing.
    pub async fn stop_share_screen(&self) {
        self.end_screen_share(None).await;
    }

    /// Process one notification from the device layer.
    pub async fn handle_media_event(&self, event: MediaEvent) {
        match event {
            MediaEvent::TrackEnded { track_id } => {
                debug!(track = %track_id, "Local track ended");
                self.end_screen_share(Some(&track_id)).await;
            }
        }
    }

    /// Stop sharing. With `only`, stop only if that track is the capture.
    async fn end_screen_share(&self, only: Option<&str>) {
        let mut screen = self.inner.screen.lock().await;
        let matches = match (screen.as_ref(), only) {
            (Some(capture), Some(id)) => capture.id == id,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if !matches {
            debug!("No matching screen share to stop");
            return;
        }
        let Some(capture) = screen.take() else {
            return;
        };
        let camera = self
            .inner
            .media
            .tracks()
            .await
            .and_then(|tracks| tracks.first(TrackKind::Video).cloned());
        if let Some(camera) = camera {
            self.inner
                .media
                .controller()
                .replace_track(TrackKind::Video, camera.clone())
                .await;
            self.swap_video(&camera).await;
        }
        self.inner
            .media
            .controller()
            .release(TrackSet(vec![capture]))
            .await;
        drop(screen);

        info!("Screen share stopped");
        self.emit_event(CallEvent::ScreenShareChanged { sharing: false }).await;
    }

    pub async fn is_sharing_screen(&self) -> bool {
        self.inner.screen.lock().await.is_some()
    }

    /// Swap the outgoing video track on every live connection.
    async fn swap_video(&self, track: &Track) {
        for (peer, handle) in self.inner.registry.active().await {
            let conn = handle.state.lock().await.connection();
            if let Some(conn) = conn {
                if let Err(e) = conn.replace_track(TrackKind::Video, track).await {
                    warn!(peer = %peer, error = %e, "Video track swap failed");
                }
            }
        }
    }
}

async fn next_event<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
