//! Scripted fakes for the transport, media controller and engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use peerlink_common::{IceServer, PeerId, SignalError};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Notify};
use tokio::sync::Mutex as AsyncMutex;

use crate::engine::{EngineEvent, PeerConnection, PeerConnectionFactory};
use crate::media::{
    MediaConstraints, MediaEvent, MediaTrackController, Track, TrackKind, TrackSet,
};
use crate::protocol::{events, IceCandidate, SessionDescription};
use crate::transport::SignalTransport;

/// Let spawned tasks run to completion on the current-thread runtime.
pub(crate) async fn settle() {
    for _ in 0..200 {
        tokio::task::yield_now().await;
    }
}

pub(crate) fn candidate(n: usize) -> IceCandidate {
    IceCandidate(json!({ "candidate": format!("candidate:{n}"), "sdpMLineIndex": 0 }))
}

pub(crate) fn offer(tag: &str) -> SessionDescription {
    SessionDescription(json!({ "type": "offer", "sdp": format!("offer-{tag}") }))
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct RecordingTransport {
    sent: Mutex<Vec<(String, Value)>>,
    down: AtomicBool,
}

impl RecordingTransport {
    pub(crate) fn sent(&self) -> Vec<(String, Value)> {
        self.sent.lock().unwrap().clone()
    }

    /// Payloads sent under `event`.
    pub(crate) fn sent_as(&self, event: &str) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(e, _)| e == event)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub(crate) fn take(&self) -> Vec<(String, Value)> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }

    pub(crate) fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

#[async_trait]
impl SignalTransport for RecordingTransport {
    async fn send(&self, event: &str, payload: Value) -> Result<(), SignalError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(SignalError::TransportDisconnected);
        }
        self.sent.lock().unwrap().push((event.to_string(), payload));
        Ok(())
    }
}

/// Turn what one side sent into what the relay delivers to the other.
pub(crate) fn relay(from: &PeerId, event: &str, payload: &Value) -> Option<(String, Value)> {
    let from = from.as_str();
    match event {
        events::CALL_USER => Some((
            events::INCOMING_CALL.to_string(),
            json!({
                "from": from,
                "offer": payload["offer"],
                "displayName": payload["displayName"],
            }),
        )),
        events::CALL_ANSWERED => Some((
            events::ANSWER.to_string(),
            json!({ "from": from, "answer": payload["answer"] }),
        )),
        events::ICE_CANDIDATE => Some((
            events::ICE_CANDIDATE.to_string(),
            json!({ "from": from, "candidate": payload["candidate"] }),
        )),
        events::HANGUP => Some((events::HANGUP.to_string(), json!({ "from": from }))),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Media
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct FakeMedia {
    deny: Option<SignalError>,
    acquires: AtomicUsize,
    releases: AtomicUsize,
    display_acquires: AtomicUsize,
    released: Mutex<Vec<Track>>,
    replaced: Mutex<Vec<(TrackKind, Track)>>,
    enabled: Mutex<HashMap<TrackKind, bool>>,
    display_events: AsyncMutex<Option<(String, mpsc::Sender<MediaEvent>)>>,
    display_gate: Option<Arc<Gate>>,
}

impl FakeMedia {
    pub(crate) fn denying() -> Self {
        Self {
            deny: Some(SignalError::PermissionDenied("camera blocked".into())),
            ..Self::default()
        }
    }

    /// `acquire_display` waits on the gate, like a user in the screen picker.
    pub(crate) fn gated_display() -> Self {
        Self {
            display_gate: Some(Arc::new(Gate::armed())),
            ..Self::default()
        }
    }

    pub(crate) fn display_gate(&self) -> Arc<Gate> {
        match &self.display_gate {
            Some(gate) => Arc::clone(gate),
            None => panic!("display capture is not gated"),
        }
    }

    /// Stop the latest display capture as the browser controls would.
    pub(crate) async fn end_display(&self) {
        let ended = self.display_events.lock().await.take();
        if let Some((track_id, events)) = ended {
            events.send(MediaEvent::TrackEnded { track_id }).await.unwrap();
        }
    }

    pub(crate) fn acquire_count(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }

    pub(crate) fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub(crate) fn display_count(&self) -> usize {
        self.display_acquires.load(Ordering::SeqCst)
    }

    pub(crate) fn released(&self) -> Vec<Track> {
        self.released.lock().unwrap().clone()
    }

    pub(crate) fn replaced(&self) -> Vec<(TrackKind, Track)> {
        self.replaced.lock().unwrap().clone()
    }

    pub(crate) fn enabled(&self, kind: TrackKind) -> Option<bool> {
        self.enabled.lock().unwrap().get(&kind).copied()
    }
}

#[async_trait]
impl MediaTrackController for FakeMedia {
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<TrackSet, SignalError> {
        if let Some(err) = &self.deny {
            return Err(err.clone());
        }
        self.acquires.fetch_add(1, Ordering::SeqCst);
        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(Track::new("mic-1", TrackKind::Audio, "Microphone"));
        }
        if constraints.video {
            tracks.push(Track::new("cam-1", TrackKind::Video, "Camera"));
        }
        Ok(TrackSet(tracks))
    }

    async fn acquire_display(
        &self,
        events: mpsc::Sender<MediaEvent>,
    ) -> Result<Track, SignalError> {
        if let Some(gate) = &self.display_gate {
            gate.pause().await;
        }
        let n = self.display_acquires.fetch_add(1, Ordering::SeqCst) + 1;
        let track = Track::new(format!("screen-{n}"), TrackKind::Video, "Screen");
        *self.display_events.lock().await = Some((track.id.clone(), events));
        Ok(track)
    }

    async fn current_tracks(&self) -> TrackSet {
        TrackSet::default()
    }

    async fn replace_track(&self, kind: TrackKind, track: Track) {
        self.replaced.lock().unwrap().push((kind, track));
    }

    async fn set_enabled(&self, kind: TrackKind, enabled: bool) {
        self.enabled.lock().unwrap().insert(kind, enabled);
    }

    async fn release(&self, tracks: TrackSet) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.released.lock().unwrap().extend(tracks.0);
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Pauses one async call, the first time it runs, until the test lets it
/// go.
#[derive(Default)]
pub(crate) struct Gate {
    op: &'static str,
    armed: AtomicBool,
    pub(crate) entered: Notify,
    pub(crate) release: Notify,
}

impl Gate {
    fn armed() -> Self {
        Self::on("")
    }

    fn on(op: &'static str) -> Self {
        Self {
            op,
            armed: AtomicBool::new(true),
            ..Self::default()
        }
    }

    async fn pause(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
    }

    async fn pause_on(&self, op: &str) {
        if self.op == op {
            self.pause().await;
        }
    }
}

#[derive(Default)]
pub(crate) struct FakeEngine {
    connections: Mutex<Vec<Arc<FakeConnection>>>,
    ice_servers: Mutex<Vec<IceServer>>,
    gate: Option<Arc<Gate>>,
}

impl FakeEngine {
    /// Pause the first `create_answer`.
    pub(crate) fn gated() -> Self {
        Self::gated_on("create_answer")
    }

    /// Pause the first call of `op` on any connection.
    pub(crate) fn gated_on(op: &'static str) -> Self {
        Self {
            gate: Some(Arc::new(Gate::on(op))),
            ..Self::default()
        }
    }

    pub(crate) fn gate(&self) -> Arc<Gate> {
        match &self.gate {
            Some(gate) => Arc::clone(gate),
            None => panic!("engine is not gated"),
        }
    }

    pub(crate) fn connections(&self) -> Vec<Arc<FakeConnection>> {
        self.connections.lock().unwrap().clone()
    }

    pub(crate) fn last(&self) -> Arc<FakeConnection> {
        self.connections().pop().expect("no connection created")
    }

    pub(crate) fn ice_servers(&self) -> Vec<IceServer> {
        self.ice_servers.lock().unwrap().clone()
    }
}

#[async_trait]
impl PeerConnectionFactory for FakeEngine {
    async fn create(
        &self,
        peer: &PeerId,
        call_id: &str,
        ice_servers: &[IceServer],
        _events: mpsc::Sender<EngineEvent>,
    ) -> Result<Arc<dyn PeerConnection>, SignalError> {
        *self.ice_servers.lock().unwrap() = ice_servers.to_vec();
        let conn = Arc::new(FakeConnection {
            peer: peer.clone(),
            call_id: call_id.to_string(),
            gate: self.gate.clone(),
            ..FakeConnection::default()
        });
        self.connections.lock().unwrap().push(Arc::clone(&conn));
        Ok(conn)
    }
}

#[derive(Default)]
pub(crate) struct FakeConnection {
    pub(crate) peer: PeerId,
    pub(crate) call_id: String,
    ops: Mutex<Vec<String>>,
    applied: Mutex<Vec<IceCandidate>>,
    replaced: Mutex<Vec<(TrackKind, String)>>,
    closes: AtomicUsize,
    gate: Option<Arc<Gate>>,
}

impl FakeConnection {
    async fn log(&self, op: &str) {
        self.ops.lock().unwrap().push(op.to_string());
        if let Some(gate) = &self.gate {
            gate.pause_on(op).await;
        }
    }

    pub(crate) fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    pub(crate) fn applied(&self) -> Vec<IceCandidate> {
        self.applied.lock().unwrap().clone()
    }

    pub(crate) fn replaced(&self) -> Vec<(TrackKind, String)> {
        self.replaced.lock().unwrap().clone()
    }

    pub(crate) fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeerConnection for FakeConnection {
    async fn add_tracks(&self, tracks: &TrackSet) -> Result<(), SignalError> {
        self.log(&format!("add_tracks:{}", tracks.len())).await;
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription, SignalError> {
        self.log("create_offer").await;
        Ok(offer(self.peer.as_str()))
    }

    async fn create_answer(&self) -> Result<SessionDescription, SignalError> {
        self.log("create_answer").await;
        Ok(SessionDescription(
            json!({ "type": "answer", "sdp": format!("answer-{}", self.peer) }),
        ))
    }

    async fn set_local_description(&self, _desc: &SessionDescription) -> Result<(), SignalError> {
        self.log("set_local").await;
        Ok(())
    }

    async fn set_remote_description(&self, _desc: &SessionDescription) -> Result<(), SignalError> {
        self.log("set_remote").await;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<(), SignalError> {
        self.log("add_candidate").await;
        self.applied.lock().unwrap().push(candidate.clone());
        Ok(())
    }

    async fn replace_track(&self, kind: TrackKind, track: &Track) -> Result<(), SignalError> {
        self.replaced.lock().unwrap().push((kind, track.id.clone()));
        Ok(())
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
