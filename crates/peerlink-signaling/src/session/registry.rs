//! Registry of sessions keyed by remote peer id.
//!
//! Lock order is always registry first, then session.

use std::collections::HashMap;
use std::sync::Arc;

use peerlink_common::{PeerId, SignalError};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::protocol::SessionDescription;

use super::machine::{EndAction, OfferAction};
use super::types::{Session, SessionCell, SessionHandle, SessionSnapshot, Teardown, Termination};

/// What happened to an inbound offer.
pub enum OfferOutcome {
    /// New callee session awaiting accept.
    Incoming(SessionHandle),
    /// Our outbound session lost the glare tie-break and was replaced.
    /// `superseded` is set when the old session could be torn down at once.
    GlareYield {
        session: SessionHandle,
        superseded: Option<Teardown>,
    },
    GlareWon,
    Duplicate,
    Ignored,
}

/// Holds at most one live session per peer.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<PeerId, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    async fn live_entry(
        sessions: &HashMap<PeerId, SessionHandle>,
        peer: &PeerId,
    ) -> Option<SessionHandle> {
        let handle = sessions.get(peer)?;
        let live = handle.state.lock().await.is_live();
        live.then(|| Arc::clone(handle))
    }

    /// Create a caller session. Fails if a live session for `peer` exists.
    pub async fn create_outbound(&self, peer: &PeerId) -> Result<SessionHandle, SignalError> {
        let mut sessions = self.sessions.write().await;
        if Self::live_entry(&sessions, peer).await.is_some() {
            return Err(SignalError::AlreadyInSession(peer.to_string()));
        }
        let session = Session::outbound(peer.clone());
        info!(peer = %peer, call = %session.call_id(), "Outbound session created");
        let handle = Arc::new(SessionCell::new(session));
        sessions.insert(peer.clone(), Arc::clone(&handle));
        Ok(handle)
    }

    /// Create a callee session holding the remote offer.
    pub async fn create_inbound(
        &self,
        peer: &PeerId,
        description: SessionDescription,
        display_name: Option<String>,
    ) -> Result<SessionHandle, SignalError> {
        let mut sessions = self.sessions.write().await;
        if Self::live_entry(&sessions, peer).await.is_some() {
            return Err(SignalError::AlreadyInSession(peer.to_string()));
        }
        let session = Session::inbound(peer.clone(), description, display_name);
        info!(peer = %peer, call = %session.call_id(), "Inbound session created");
        let handle = Arc::new(SessionCell::new(session));
        sessions.insert(peer.clone(), Arc::clone(&handle));
        Ok(handle)
    }

    /// Route an inbound offer: new session, glare resolution or ignore.
    pub async fn offer_from(
        &self,
        peer: &PeerId,
        offer: SessionDescription,
        display_name: Option<String>,
        local_id: &PeerId,
    ) -> OfferOutcome {
        let mut sessions = self.sessions.write().await;

        if let Some(existing) = sessions.get(peer).map(Arc::clone) {
            let mut old = existing.state.lock().await;
            if old.is_live() {
                match old.on_remote_offer(local_id) {
                    OfferAction::GlareYield => {
                        let carried = std::mem::take(&mut old.pending_candidates);
                        let superseded = match old.request_end(Termination::Superseded) {
                            EndAction::FinalizeNow => old.finalize(),
                            _ => None,
                        };
                        drop(old);

                        let mut fresh = Session::inbound(peer.clone(), offer, display_name);
                        fresh.pending_candidates = carried;
                        info!(
                            peer = %peer,
                            local = %local_id,
                            call = %fresh.call_id(),
                            "Glare: yielding to remote offer"
                        );
                        let handle = Arc::new(SessionCell::new(fresh));
                        sessions.insert(peer.clone(), Arc::clone(&handle));
                        return OfferOutcome::GlareYield {
                            session: handle,
                            superseded,
                        };
                    }
                    OfferAction::GlareWin => {
                        info!(peer = %peer, local = %local_id, "Glare: keeping local offer");
                        return OfferOutcome::GlareWon;
                    }
                    OfferAction::Duplicate => {
                        debug!(peer = %peer, state = ?old.state(), "Duplicate offer ignored");
                        return OfferOutcome::Duplicate;
                    }
                    OfferAction::Ignore => {
                        debug!(peer = %peer, state = ?old.state(), "Offer ignored");
                        return OfferOutcome::Ignored;
                    }
                }
            }
        }

        let session = Session::inbound(peer.clone(), offer, display_name);
        info!(peer = %peer, call = %session.call_id(), "Inbound session created");
        let handle = Arc::new(SessionCell::new(session));
        sessions.insert(peer.clone(), Arc::clone(&handle));
        OfferOutcome::Incoming(handle)
    }

    /// Most recent session for `peer`, live or terminal-but-not-evicted.
    pub async fn get(&self, peer: &PeerId) -> Option<SessionHandle> {
        self.sessions.read().await.get(peer).map(Arc::clone)
    }

    /// Force the session to a terminal state and evict it.
    pub async fn remove(&self, peer: &PeerId) -> Option<Teardown> {
        let handle = self.sessions.write().await.remove(peer)?;
        let mut session = handle.state.lock().await;
        session.request_end(Termination::LocalHangup);
        session.finalize()
    }

    /// Evict `handle` if it is still the registered session for `peer`.
    pub async fn evict(&self, peer: &PeerId, handle: &SessionHandle) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get(peer) {
            Some(current) if Arc::ptr_eq(current, handle) => {
                sessions.remove(peer);
                debug!(peer = %peer, "Session evicted");
                true
            }
            _ => false,
        }
    }

    /// Every live session.
    pub async fn active(&self) -> Vec<(PeerId, SessionHandle)> {
        let sessions = self.sessions.read().await;
        let mut live = Vec::with_capacity(sessions.len());
        for (peer, handle) in sessions.iter() {
            if handle.state.lock().await.is_live() {
                live.push((peer.clone(), Arc::clone(handle)));
            }
        }
        live
    }

    pub async fn snapshot(&self, peer: &PeerId) -> Option<SessionSnapshot> {
        let handle = self.get(peer).await?;
        let snapshot = handle.snapshot().await;
        Some(snapshot)
    }

    /// Snapshots of every registered session, ordered by peer id.
    pub async fn snapshots(&self) -> Vec<SessionSnapshot> {
        let sessions = self.sessions.read().await;
        let mut out = Vec::with_capacity(sessions.len());
        for handle in sessions.values() {
            out.push(handle.snapshot().await);
        }
        out.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        out
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
