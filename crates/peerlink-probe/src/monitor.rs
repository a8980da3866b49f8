//! Orchestrator plumbing for a host with no capture devices and no media
//! engine. Calls cannot be answered here, so the monitor watches the relay,
//! logs call lifecycle events and declines whatever rings.

use std::sync::Arc;

use async_trait::async_trait;
use peerlink_common::{IceServer, PeerId, SignalError};
use peerlink_signaling::{
    CallEvent, EngineEvent, MediaConstraints, MediaEvent, MediaTrackController, Orchestrator,
    PeerConnection, PeerConnectionFactory, Track, TrackKind, TrackSet,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Media controller that owns no devices.
pub struct NoDevices;

#[async_trait]
impl MediaTrackController for NoDevices {
    async fn acquire(&self, _constraints: &MediaConstraints) -> Result<TrackSet, SignalError> {
        Err(SignalError::DeviceUnavailable("no capture devices".into()))
    }

    async fn acquire_display(
        &self,
        _events: mpsc::Sender<MediaEvent>,
    ) -> Result<Track, SignalError> {
        Err(SignalError::DeviceUnavailable("no display to capture".into()))
    }

    async fn current_tracks(&self) -> TrackSet {
        TrackSet::default()
    }

    async fn replace_track(&self, _kind: TrackKind, _track: Track) {}

    async fn set_enabled(&self, _kind: TrackKind, _enabled: bool) {}

    async fn release(&self, _tracks: TrackSet) {}
}

/// Factory that refuses to open connections.
pub struct NoEngine;

#[async_trait]
impl PeerConnectionFactory for NoEngine {
    async fn create(
        &self,
        peer: &PeerId,
        _call_id: &str,
        _ice_servers: &[IceServer],
        _events: mpsc::Sender<EngineEvent>,
    ) -> Result<Arc<dyn PeerConnection>, SignalError> {
        Err(SignalError::NegotiationFailed(format!(
            "no media engine for {peer}"
        )))
    }
}

pub async fn on_call_event(orch: &Orchestrator, event: CallEvent) {
    match event {
        CallEvent::IncomingCall {
            peer_id,
            display_name,
        } => {
            info!(peer = %peer_id, name = ?display_name, "Incoming call, declining");
            orch.decline_incoming(&peer_id).await;
        }
        CallEvent::Failed { peer_id, reason } => {
            warn!(peer = %peer_id, reason = ?reason, "Call failed");
        }
        CallEvent::TransportLost { failed } => {
            warn!(sessions = failed.len(), "Relay lost");
        }
        CallEvent::PeerJoined { peer_id } => info!(peer = %peer_id, "Peer joined room"),
        CallEvent::PeerLeft { peer_id } => info!(peer = %peer_id, "Peer left room"),
        other => info!(event = ?other, "Call event"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use peerlink_signaling::protocol::events;
    use peerlink_signaling::{OrchestratorConfig, SignalTransport, TransportEvent};
    use serde_json::{json, Value};

    use super::*;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl SignalTransport for Recorder {
        async fn send(&self, event: &str, payload: Value) -> Result<(), SignalError> {
            self.sent.lock().unwrap().push((event.to_string(), payload));
            Ok(())
        }
    }

    fn monitor() -> (Orchestrator, mpsc::Receiver<CallEvent>, Arc<Recorder>) {
        let relay = Arc::new(Recorder::default());
        let (orch, calls) = Orchestrator::new(
            OrchestratorConfig::default(),
            PeerId::new("me"),
            relay.clone(),
            Arc::new(NoDevices),
            Arc::new(NoEngine),
        );
        (orch, calls, relay)
    }

    #[tokio::test]
    async fn incoming_calls_are_declined() {
        let (orch, mut calls, relay) = monitor();
        orch.handle_transport_event(TransportEvent::Message {
            event: events::INCOMING_CALL.into(),
            payload: json!({ "from": "a", "offer": { "type": "offer", "sdp": "x" } }),
        })
        .await;

        let ringing = calls.recv().await.unwrap();
        assert!(matches!(ringing, CallEvent::IncomingCall { .. }));
        on_call_event(&orch, ringing).await;

        assert!(orch.session(&PeerId::new("a")).await.is_none());
        assert_eq!(
            calls.recv().await.unwrap(),
            CallEvent::Declined {
                peer_id: PeerId::new("a")
            }
        );
        let sent = relay.sent.lock().unwrap().clone();
        assert_eq!(sent, vec![(events::HANGUP.to_string(), json!({ "to": "a" }))]);
    }

    #[tokio::test]
    async fn capture_is_refused() {
        let (orch, _calls, _relay) = monitor();
        let err = orch.share_screen().await.unwrap_err();
        assert!(matches!(err, SignalError::DeviceUnavailable(_)));
        assert!(!orch.is_sharing_screen().await);

        let err = NoDevices
            .acquire(&MediaConstraints::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SignalError::DeviceUnavailable(_)));
    }
}
