//! Routing of transport and engine events to sessions.

use peerlink_common::PeerId;
use tracing::{debug, info, warn};

use crate::engine::{ConnectionState, EngineEvent};
use crate::protocol::{events, IceCandidate, InboundSignal, OutboundCandidatePayload, SessionDescription};
use crate::session::{
    AnswerAction, CallState, CandidateAction, EndAction, FailureReason, LocalCandidateAction,
    OfferOutcome, SessionHandle, Termination,
};
use crate::transport::TransportEvent;

use super::manager::Orchestrator;
use super::types::CallEvent;

impl Orchestrator {
    /// Process one event from the relay transport.
    pub async fn handle_transport_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                info!("Signaling transport connected");
                let room = self.inner.room.read().await.room.clone();
                if let Some(room) = room {
                    if let Err(e) = self.join_room(&room).await {
                        warn!(room = %room, error = %e, "Failed to rejoin room");
                    }
                }
            }
            TransportEvent::Welcome { local_id } => self.set_local_id(local_id).await,
            TransportEvent::Message { event, payload } => {
                match InboundSignal::decode(&event, &payload) {
                    Ok(Some(signal)) => self.handle_signal(signal).await,
                    Ok(None) => debug!(event = %event, "Unhandled relay event"),
                    Err(e) => warn!(event = %event, error = %e, "Dropping malformed signaling message"),
                }
            }
            TransportEvent::Disconnected => self.transport_lost().await,
            TransportEvent::Error(message) => warn!(error = %message, "Signaling transport error"),
        }
    }

    /// Process one decoded signaling message.
    pub async fn handle_signal(&self, signal: InboundSignal) {
        match signal {
            InboundSignal::IncomingCall {
                from,
                offer,
                display_name,
            } => self.on_incoming_call(from, offer, display_name).await,
            InboundSignal::Answer { from, answer } => self.on_answer(from, answer).await,
            InboundSignal::IceCandidate { from, candidate } => {
                self.on_remote_candidate(&from, candidate).await
            }
            InboundSignal::PeerDisconnected { peer_id } => {
                self.end_remote(&peer_id, "peer disconnected").await
            }
            InboundSignal::Hangup { from } => self.end_remote(&from, "remote hangup").await,
            InboundSignal::UserConnected { peer_id } => {
                if peer_id == self.local_id().await {
                    return;
                }
                let added = self.inner.room.write().await.members.insert(peer_id.clone());
                if added {
                    info!(peer = %peer_id, "Peer joined room");
                    self.emit_event(CallEvent::PeerJoined { peer_id }).await;
                }
            }
            InboundSignal::UserDisconnected { peer_id } => {
                let removed = self.inner.room.write().await.members.remove(&peer_id);
                if removed {
                    info!(peer = %peer_id, "Peer left room");
                    self.emit_event(CallEvent::PeerLeft {
                        peer_id: peer_id.clone(),
                    })
                    .await;
                }
                self.end_remote(&peer_id, "peer left room").await;
            }
            InboundSignal::Welcome { local_id } => self.set_local_id(local_id).await,
        }
    }

    /// Process one event from the WebRTC engine.
    pub async fn handle_engine_event(&self, event: EngineEvent) {
        let Some(handle) = self.session_for(&event).await else {
            return;
        };
        match event {
            EngineEvent::LocalCandidate {
                peer, candidate, ..
            } => self.on_local_candidate(peer, &handle, candidate).await,
            EngineEvent::ConnectionState { peer, state, .. } => {
                self.on_connection_state(&peer, &handle, state).await
            }
        }
    }

    // -----------------------------------------------------------------------
    // Signals
    // -----------------------------------------------------------------------

    async fn on_incoming_call(
        &self,
        from: PeerId,
        offer: SessionDescription,
        display_name: Option<String>,
    ) {
        let local_id = self.local_id().await;
        let outcome = self
            .inner
            .registry
            .offer_from(&from, offer, display_name.clone(), &local_id)
            .await;
        match outcome {
            OfferOutcome::Incoming(_) => {
                info!(peer = %from, "Incoming call");
                self.emit_event(CallEvent::IncomingCall {
                    peer_id: from,
                    display_name,
                })
                .await;
            }
            OfferOutcome::GlareYield {
                session,
                superseded,
            } => {
                if let Some(td) = superseded {
                    self.release(td).await;
                }
                let this = self.clone();
                tokio::spawn(async move {
                    this.run_accept(&from, session).await;
                });
            }
            OfferOutcome::GlareWon | OfferOutcome::Duplicate | OfferOutcome::Ignored => {}
        }
    }

    async fn on_answer(&self, from: PeerId, answer: SessionDescription) {
        let Some(handle) = self.inner.registry.get(&from).await else {
            debug!(peer = %from, "Answer for unknown session ignored");
            return;
        };
        let (action, state) = {
            let mut session = handle.state.lock().await;
            (session.on_remote_answer(), session.state())
        };
        match action {
            AnswerAction::Apply => {
                let this = self.clone();
                tokio::spawn(async move {
                    this.run_apply_answer(&from, handle, answer).await;
                });
            }
            AnswerAction::Duplicate => debug!(peer = %from, ?state, "Duplicate answer ignored"),
            AnswerAction::Unexpected => warn!(peer = %from, ?state, "Unexpected answer ignored"),
        }
    }

    async fn on_remote_candidate(&self, from: &PeerId, candidate: IceCandidate) {
        let Some(handle) = self.inner.registry.get(from).await else {
            debug!(peer = %from, "Candidate for unknown session dropped");
            return;
        };
        let action = handle.state.lock().await.on_remote_candidate(&candidate);
        match action {
            CandidateAction::ApplyNow(conn) => {
                if let Err(e) = conn.add_ice_candidate(&candidate).await {
                    warn!(peer = %from, error = %e, "Remote candidate rejected");
                }
            }
            CandidateAction::Queued => debug!(peer = %from, "Remote candidate buffered"),
            CandidateAction::Discard => debug!(peer = %from, "Candidate for ending session dropped"),
        }
    }

    async fn end_remote(&self, peer: &PeerId, why: &str) {
        match self.inner.registry.get(peer).await {
            Some(handle) => {
                info!(peer = %peer, reason = why, "Remote side ended session");
                self.end_session(&handle, Termination::RemoteHangup).await;
            }
            None => debug!(peer = %peer, reason = why, "No session to end"),
        }
    }

    /// Fail every live session and report them in one event.
    async fn transport_lost(&self) {
        let mut failed = Vec::new();
        for (peer, handle) in self.inner.registry.active().await {
            match self.end_session(&handle, Termination::TransportLost).await {
                EndAction::FinalizeNow | EndAction::Deferred => failed.push(peer),
                EndAction::AlreadyEnding | EndAction::AlreadyTerminal => {}
            }
        }
        failed.sort();
        self.inner.room.write().await.members.clear();
        warn!(failed = failed.len(), "Signaling transport lost");
        self.emit_event(CallEvent::TransportLost { failed }).await;
    }

    // -----------------------------------------------------------------------
    // Engine
    // -----------------------------------------------------------------------

    /// The session owning the connection that raised `event`.
    async fn session_for(&self, event: &EngineEvent) -> Option<SessionHandle> {
        let peer = event.peer();
        let Some(handle) = self.inner.registry.get(peer).await else {
            debug!(peer = %peer, "Engine event for unknown session dropped");
            return None;
        };
        let current = handle.state.lock().await.call_id() == event.call_id();
        if !current {
            debug!(
                peer = %peer,
                call = event.call_id(),
                "Engine event from a replaced connection dropped"
            );
            return None;
        }
        Some(handle)
    }

    async fn on_local_candidate(
        &self,
        peer: PeerId,
        handle: &SessionHandle,
        candidate: IceCandidate,
    ) {
        let action = handle.state.lock().await.on_local_candidate(&candidate);
        match action {
            LocalCandidateAction::Send => {
                let payload = OutboundCandidatePayload {
                    to: peer.clone(),
                    candidate,
                };
                if let Err(e) = self.emit(events::ICE_CANDIDATE, &payload).await {
                    warn!(peer = %peer, error = %e, "Failed to send candidate");
                }
            }
            LocalCandidateAction::Held => debug!(peer = %peer, "Local candidate held until description is sent"),
            LocalCandidateAction::Discard => {}
        }
    }

    async fn on_connection_state(
        &self,
        peer: &PeerId,
        handle: &SessionHandle,
        state: ConnectionState,
    ) {
        let current = handle.state.lock().await.state();
        match state {
            ConnectionState::Failed => {
                warn!(peer = %peer, "Peer connection failed");
                self.end_session(handle, Termination::Failed(FailureReason::NegotiationFailed))
                    .await;
            }
            // A connection we closed ourselves also reports Closed; only an
            // established call treats it as a failure.
            ConnectionState::Closed if current == CallState::Connected => {
                warn!(peer = %peer, "Peer connection closed unexpectedly");
                self.end_session(handle, Termination::Failed(FailureReason::NegotiationFailed))
                    .await;
            }
            ConnectionState::Connected => info!(peer = %peer, "Media path established"),
            other => debug!(peer = %peer, state = ?other, "Connection state"),
        }
    }
}
