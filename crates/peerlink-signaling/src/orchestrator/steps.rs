//! Multi-step session operations and teardown.
//!
//! Each step holds the session's turn lock, and after every await checks in
//! with [`Orchestrator::checkpoint`]. A hangup that arrived in the meantime
//! is honored there and resources obtained so far are released once.

use std::sync::Arc;

use peerlink_common::{PeerId, SignalError};
use tracing::{debug, info, warn};

use crate::engine::PeerConnection;
use crate::media::{MediaLease, TrackKind, TrackSet};
use crate::protocol::{
    events, CallAnsweredPayload, CallUserPayload, HangupPayload, IceCandidate,
    OutboundCandidatePayload, SessionDescription,
};
use crate::session::{EndAction, FailureReason, Resume, SessionHandle, Teardown, Termination};

use super::manager::Orchestrator;
use super::types::CallEvent;

/// Resources produced by the latest await, not yet owned by the session.
#[derive(Default)]
pub(super) struct Stash {
    media: Option<MediaLease>,
    connection: Option<Arc<dyn PeerConnection>>,
}

impl Stash {
    fn media(lease: MediaLease) -> Self {
        Self {
            media: Some(lease),
            connection: None,
        }
    }

    fn connection(conn: Arc<dyn PeerConnection>) -> Self {
        Self {
            media: None,
            connection: Some(conn),
        }
    }
}

impl Orchestrator {
    // -----------------------------------------------------------------------
    // Checkpoints
    // -----------------------------------------------------------------------

    /// Hand `stash` to the session and decide whether the step may go on.
    async fn checkpoint(&self, handle: &SessionHandle, stash: Stash) -> bool {
        let outcome = {
            let mut session = handle.state.lock().await;
            if session.state().is_terminal() {
                Err(stash)
            } else {
                if let Some(lease) = stash.media {
                    session.media = Some(lease);
                }
                if let Some(conn) = stash.connection {
                    session.connection = Some(conn);
                }
                Ok(session.resume())
            }
        };
        match outcome {
            Ok(Resume::Proceed) => true,
            Ok(Resume::Finalize(td)) => {
                info!(peer = %td.peer_id, "Session ended during in-flight step");
                self.teardown(handle, td).await;
                false
            }
            Ok(Resume::Abandoned) => false,
            Err(stash) => {
                debug!("Step outlived its session, discarding resources");
                if let Some(conn) = stash.connection {
                    conn.close().await;
                }
                if let Some(lease) = stash.media {
                    self.inner.media.release(lease).await;
                }
                false
            }
        }
    }

    async fn fail_step(&self, handle: &SessionHandle, err: SignalError) {
        let reason = FailureReason::from(&err);
        let teardown = {
            let mut session = handle.state.lock().await;
            warn!(peer = %session.peer_id(), error = %err, "Session step failed");
            session.fail(reason)
        };
        if let Some(td) = teardown {
            self.teardown(handle, td).await;
        }
    }

    /// Request termination and tear down now, or let the running step do it.
    pub(super) async fn end_session(
        &self,
        handle: &SessionHandle,
        termination: Termination,
    ) -> EndAction {
        let (action, teardown) = {
            let mut session = handle.state.lock().await;
            let action = session.request_end(termination);
            let teardown = match action {
                EndAction::FinalizeNow => session.finalize(),
                _ => None,
            };
            match action {
                EndAction::Deferred => {
                    info!(peer = %session.peer_id(), ?termination, "Ending after in-flight step")
                }
                EndAction::AlreadyEnding | EndAction::AlreadyTerminal => {
                    debug!(peer = %session.peer_id(), ?termination, "Session already ending")
                }
                EndAction::FinalizeNow => {}
            }
            (action, teardown)
        };
        if let Some(td) = teardown {
            self.teardown(handle, td).await;
        }
        action
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    pub(super) async fn teardown(&self, handle: &SessionHandle, td: Teardown) {
        self.inner.registry.evict(&td.peer_id, handle).await;
        self.release(td).await;
    }

    /// Close the connection, return media, tell the peer and report.
    pub(super) async fn release(&self, td: Teardown) {
        let Teardown {
            peer_id,
            termination,
            connection,
            media,
            notify_peer,
        } = td;

        if let Some(conn) = connection {
            conn.close().await;
        }
        if let Some(lease) = media {
            self.inner.media.release(lease).await;
            if self.inner.media.holders().await == 0 {
                self.inner.track_enabled.write().await.clear();
            }
        }

        let config = &self.inner.config;
        let notify = notify_peer
            && match termination {
                Termination::LocalHangup => config.notify_peer_on_hangup,
                Termination::Declined => config.notify_peer_on_decline,
                _ => false,
            };
        if notify {
            let payload = HangupPayload {
                to: peer_id.clone(),
            };
            if let Err(e) = self.emit(events::HANGUP, &payload).await {
                debug!(peer = %peer_id, error = %e, "Could not notify peer of hangup");
            }
        }

        info!(peer = %peer_id, ?termination, "Session closed");
        let event = match termination {
            Termination::LocalHangup | Termination::RemoteHangup => {
                Some(CallEvent::Ended { peer_id })
            }
            Termination::Declined => Some(CallEvent::Declined { peer_id }),
            Termination::Failed(reason) => Some(CallEvent::Failed { peer_id, reason }),
            Termination::TransportLost | Termination::Superseded => None,
        };
        if let Some(event) = event {
            self.emit_event(event).await;
        }
    }

    // -----------------------------------------------------------------------
    // Shared pieces
    // -----------------------------------------------------------------------

    /// New connection tagged with the session's call id.
    async fn open_connection(
        &self,
        peer: &PeerId,
        handle: &SessionHandle,
    ) -> Result<Arc<dyn PeerConnection>, SignalError> {
        let call_id = handle.state.lock().await.call_id().to_string();
        self.inner
            .engine
            .create(
                peer,
                &call_id,
                &self.inner.config.ice_servers,
                self.inner.engine_tx.clone(),
            )
            .await
    }

    /// Add local tracks, swapping in the display track while sharing.
    async fn attach_tracks(
        &self,
        conn: &Arc<dyn PeerConnection>,
        tracks: &TrackSet,
    ) -> Result<(), SignalError> {
        conn.add_tracks(tracks).await?;
        let display = self.inner.screen.lock().await.clone();
        if let Some(display) = display {
            conn.replace_track(TrackKind::Video, &display).await?;
        }
        Ok(())
    }

    /// Apply buffered remote candidates in arrival order. Returns `false`
    /// if the session ended meanwhile.
    async fn flush_candidates(&self, handle: &SessionHandle, conn: &Arc<dyn PeerConnection>) -> bool {
        loop {
            let next = handle.state.lock().await.next_buffered_candidate();
            let Some(candidate) = next else {
                return true;
            };
            if let Err(e) = conn.add_ice_candidate(&candidate).await {
                warn!(error = %e, "Buffered candidate rejected");
            }
            if !self.checkpoint(handle, Stash::default()).await {
                return false;
            }
        }
    }

    pub(super) async fn send_candidates(&self, peer: &PeerId, candidates: Vec<IceCandidate>) {
        for candidate in candidates {
            let payload = OutboundCandidatePayload {
                to: peer.clone(),
                candidate,
            };
            if let Err(e) = self.emit(events::ICE_CANDIDATE, &payload).await {
                warn!(peer = %peer, error = %e, "Failed to send candidate");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Call
    // -----------------------------------------------------------------------

    pub(super) async fn run_call(&self, peer: &PeerId, handle: SessionHandle) {
        let _turn = handle.turn.lock().await;
        if !handle.state.lock().await.start_call() {
            debug!(peer = %peer, "Call step skipped");
            return;
        }

        let lease = match self.inner.media.lease(&self.inner.config.constraints).await {
            Ok(lease) => lease,
            Err(e) => return self.fail_step(&handle, e).await,
        };
        let tracks = lease.tracks().clone();
        if !self.checkpoint(&handle, Stash::media(lease)).await {
            return;
        }

        let conn = match self.open_connection(peer, &handle).await {
            Ok(conn) => conn,
            Err(e) => return self.fail_step(&handle, e).await,
        };
        if !self.checkpoint(&handle, Stash::connection(Arc::clone(&conn))).await {
            return;
        }
        if let Err(e) = self.attach_tracks(&conn, &tracks).await {
            return self.fail_step(&handle, e).await;
        }

        let offer = match conn.create_offer().await {
            Ok(offer) => offer,
            Err(e) => return self.fail_step(&handle, e).await,
        };
        if !self.checkpoint(&handle, Stash::default()).await {
            return;
        }
        if let Err(e) = conn.set_local_description(&offer).await {
            return self.fail_step(&handle, e).await;
        }
        if !self.checkpoint(&handle, Stash::default()).await {
            return;
        }
        if !handle.state.lock().await.prepare_offer() {
            self.checkpoint(&handle, Stash::default()).await;
            return;
        }

        let payload = CallUserPayload {
            to: peer.clone(),
            from: self.local_id().await,
            offer,
            display_name: self.inner.config.display_name.clone(),
        };
        if let Err(e) = self.emit(events::CALL_USER, &payload).await {
            return self.fail_step(&handle, e).await;
        }
        info!(peer = %peer, "Offer sent");

        let (held, resume) = {
            let mut session = handle.state.lock().await;
            let held = session.offer_sent();
            (held, session.resume())
        };
        match resume {
            Resume::Proceed => self.send_candidates(peer, held).await,
            Resume::Finalize(td) => self.teardown(&handle, td).await,
            Resume::Abandoned => {}
        }
    }

    // -----------------------------------------------------------------------
    // Accept
    // -----------------------------------------------------------------------

    pub(super) async fn run_accept(&self, peer: &PeerId, handle: SessionHandle) {
        let _turn = handle.turn.lock().await;
        let Some(remote_offer) = handle.state.lock().await.start_accept() else {
            debug!(peer = %peer, "Accept ignored");
            return;
        };

        let lease = match self.inner.media.lease(&self.inner.config.constraints).await {
            Ok(lease) => lease,
            Err(e) => return self.fail_step(&handle, e).await,
        };
        let tracks = lease.tracks().clone();
        if !self.checkpoint(&handle, Stash::media(lease)).await {
            return;
        }

        let conn = match self.open_connection(peer, &handle).await {
            Ok(conn) => conn,
            Err(e) => return self.fail_step(&handle, e).await,
        };
        if !self.checkpoint(&handle, Stash::connection(Arc::clone(&conn))).await {
            return;
        }
        if let Err(e) = self.attach_tracks(&conn, &tracks).await {
            return self.fail_step(&handle, e).await;
        }

        if let Err(e) = conn.set_remote_description(&remote_offer).await {
            return self.fail_step(&handle, e).await;
        }
        if !self.checkpoint(&handle, Stash::default()).await {
            return;
        }
        if !self.flush_candidates(&handle, &conn).await {
            return;
        }

        let answer = match conn.create_answer().await {
            Ok(answer) => answer,
            Err(e) => return self.fail_step(&handle, e).await,
        };
        if !self.checkpoint(&handle, Stash::default()).await {
            return;
        }
        if let Err(e) = conn.set_local_description(&answer).await {
            return self.fail_step(&handle, e).await;
        }
        if !self.checkpoint(&handle, Stash::default()).await {
            return;
        }
        if !handle.state.lock().await.prepare_answer() {
            self.checkpoint(&handle, Stash::default()).await;
            return;
        }

        let payload = CallAnsweredPayload {
            to: peer.clone(),
            answer,
        };
        if let Err(e) = self.emit(events::CALL_ANSWERED, &payload).await {
            return self.fail_step(&handle, e).await;
        }

        let outcome = {
            let mut session = handle.state.lock().await;
            match session.resume() {
                Resume::Proceed => Ok(session.answer_sent()),
                other => Err(other),
            }
        };
        match outcome {
            Ok(held) => {
                info!(peer = %peer, "Call connected");
                self.send_candidates(peer, held).await;
                self.emit_event(CallEvent::Connected {
                    peer_id: peer.clone(),
                })
                .await;
            }
            Err(Resume::Finalize(td)) => self.teardown(&handle, td).await,
            Err(_) => {}
        }
    }

    // -----------------------------------------------------------------------
    // Remote answer
    // -----------------------------------------------------------------------

    pub(super) async fn run_apply_answer(
        &self,
        peer: &PeerId,
        handle: SessionHandle,
        answer: SessionDescription,
    ) {
        let _turn = handle.turn.lock().await;
        let conn = {
            let mut session = handle.state.lock().await;
            if !session.start_apply_answer() {
                debug!(peer = %peer, state = ?session.state(), "Answer no longer applicable");
                return;
            }
            session.connection()
        };
        let Some(conn) = conn else {
            let err = SignalError::negotiation("answer arrived without a connection");
            return self.fail_step(&handle, err).await;
        };

        if let Err(e) = conn.set_remote_description(&answer).await {
            return self.fail_step(&handle, e).await;
        }
        if !self.checkpoint(&handle, Stash::default()).await {
            return;
        }
        if !self.flush_candidates(&handle, &conn).await {
            return;
        }

        let outcome = {
            let mut session = handle.state.lock().await;
            match session.resume() {
                Resume::Proceed => {
                    session.answer_applied();
                    Ok(())
                }
                other => Err(other),
            }
        };
        match outcome {
            Ok(()) => {
                info!(peer = %peer, "Call connected");
                self.emit_event(CallEvent::Connected {
                    peer_id: peer.clone(),
                })
                .await;
            }
            Err(Resume::Finalize(td)) => self.teardown(&handle, td).await,
            Err(_) => {}
        }
    }
}
