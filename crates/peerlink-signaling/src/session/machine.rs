//! Per-session signaling state machine.
//!
//! Every method here is synchronous and runs under the session lock. The
//! orchestrator performs the actual I/O between transitions and comes back
//! through [`Session::resume`] after every await.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use peerlink_common::{new_correlation_id, PeerId};

use crate::engine::PeerConnection;
use crate::protocol::{IceCandidate, SessionDescription};

use super::types::{
    CallState, FailureReason, Role, Session, SessionSnapshot, Teardown, Termination,
};

/// Result of checking a session after an await.
#[derive(Debug)]
pub enum Resume {
    Proceed,
    /// Ending was requested while the step ran; tear down now.
    Finalize(Teardown),
    /// The session reached a terminal state behind the step's back.
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferAction {
    /// Glare and our id is lower: drop our offer, answer theirs.
    GlareYield,
    /// Glare and our id is higher: ignore theirs.
    GlareWin,
    Duplicate,
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerAction {
    Apply,
    Duplicate,
    Unexpected,
}

pub enum CandidateAction {
    ApplyNow(Arc<dyn PeerConnection>),
    Queued,
    Discard,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocalCandidateAction {
    Send,
    Held,
    Discard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndAction {
    FinalizeNow,
    /// A step is running; it will finalize at its next resumption point.
    Deferred,
    AlreadyEnding,
    AlreadyTerminal,
}

impl Session {
    fn blank(peer_id: PeerId, role: Role) -> Self {
        Self {
            peer_id,
            call_id: new_correlation_id(),
            role,
            state: CallState::Idle,
            display_name: None,
            remote_offer: None,
            pending_candidates: VecDeque::new(),
            outbound_candidates: Vec::new(),
            local_description_set: false,
            local_description_sent: false,
            remote_description_set: false,
            answer_seen: false,
            applied_candidates: 0,
            step_in_flight: false,
            ending: None,
            connection: None,
            media: None,
            created_at: Instant::now(),
        }
    }

    pub fn outbound(peer_id: PeerId) -> Self {
        Self::blank(peer_id, Role::Caller)
    }

    /// A callee session that has already received the remote offer.
    pub fn inbound(
        peer_id: PeerId,
        offer: SessionDescription,
        display_name: Option<String>,
    ) -> Self {
        let mut session = Self::blank(peer_id, Role::Callee);
        session.receive_offer(offer, display_name);
        session
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn is_live(&self) -> bool {
        !self.state.is_terminal()
    }

    pub fn connection(&self) -> Option<Arc<dyn PeerConnection>> {
        self.connection.clone()
    }

    fn can_step(&self) -> bool {
        !self.state.is_terminal() && self.ending.is_none() && !self.step_in_flight
    }

    // -- local commands ------------------------------------------------------

    /// Begin the outbound call step.
    pub fn start_call(&mut self) -> bool {
        if self.role != Role::Caller || self.state != CallState::Idle || !self.can_step() {
            return false;
        }
        self.step_in_flight = true;
        true
    }

    /// Local offer is set on the connection and about to be sent.
    pub fn prepare_offer(&mut self) -> bool {
        if self.state != CallState::Idle || self.ending.is_some() {
            return false;
        }
        self.local_description_set = true;
        self.state = CallState::Offering;
        true
    }

    /// Offer went out. Returns local candidates that were held back.
    pub fn offer_sent(&mut self) -> Vec<IceCandidate> {
        self.local_description_sent = true;
        self.step_in_flight = false;
        std::mem::take(&mut self.outbound_candidates)
    }

    fn receive_offer(&mut self, offer: SessionDescription, display_name: Option<String>) {
        self.remote_offer = Some(offer);
        self.display_name = display_name;
        self.state = CallState::Answering;
    }

    /// Begin the accept step. Returns the remote offer to apply.
    pub fn start_accept(&mut self) -> Option<SessionDescription> {
        if self.role != Role::Callee || self.state != CallState::Answering || !self.can_step() {
            return None;
        }
        let offer = self.remote_offer.clone()?;
        self.step_in_flight = true;
        Some(offer)
    }

    /// Answer is set on the connection and about to be sent.
    pub fn prepare_answer(&mut self) -> bool {
        if self.state != CallState::Answering || self.ending.is_some() {
            return false;
        }
        self.local_description_set = true;
        true
    }

    /// Answer went out; the call is up. Returns held local candidates.
    pub fn answer_sent(&mut self) -> Vec<IceCandidate> {
        self.local_description_sent = true;
        self.step_in_flight = false;
        self.state = CallState::Connected;
        std::mem::take(&mut self.outbound_candidates)
    }

    /// Begin applying a remote answer.
    pub fn start_apply_answer(&mut self) -> bool {
        if self.state != CallState::Offering || self.remote_description_set || !self.can_step() {
            return false;
        }
        self.step_in_flight = true;
        true
    }

    /// Remote answer applied and buffered candidates flushed.
    pub fn answer_applied(&mut self) {
        self.step_in_flight = false;
        self.state = CallState::Connected;
    }

    /// Decline an offer that has not been accepted yet. `None` when the
    /// session is past that point.
    pub fn decline(&mut self) -> Option<EndAction> {
        if self.state != CallState::Answering || self.step_in_flight || self.ending.is_some() {
            return None;
        }
        Some(self.request_end(Termination::Declined))
    }

    // -- remote events -------------------------------------------------------

    /// Classify an offer from the peer we already have a session with.
    pub fn on_remote_offer(&self, local_id: &PeerId) -> OfferAction {
        if self.state.is_terminal() || self.ending.is_some() {
            return OfferAction::Ignore;
        }
        match (self.role, self.state) {
            (Role::Caller, CallState::Idle | CallState::Offering) => {
                if local_id < &self.peer_id {
                    OfferAction::GlareYield
                } else {
                    OfferAction::GlareWin
                }
            }
            (_, CallState::Answering | CallState::Connected) => OfferAction::Duplicate,
            _ => OfferAction::Ignore,
        }
    }

    pub fn on_remote_answer(&mut self) -> AnswerAction {
        if self.state.is_terminal() || self.ending.is_some() {
            return AnswerAction::Unexpected;
        }
        match (self.role, self.state) {
            (Role::Caller, CallState::Offering) if !self.answer_seen => {
                self.answer_seen = true;
                AnswerAction::Apply
            }
            (Role::Caller, CallState::Offering | CallState::Connected) => AnswerAction::Duplicate,
            _ => AnswerAction::Unexpected,
        }
    }

    pub fn on_remote_candidate(&mut self, candidate: &IceCandidate) -> CandidateAction {
        if self.state.is_terminal() || self.ending.is_some() {
            return CandidateAction::Discard;
        }
        if self.remote_description_set {
            if let Some(conn) = &self.connection {
                self.applied_candidates += 1;
                return CandidateAction::ApplyNow(Arc::clone(conn));
            }
        }
        self.pending_candidates.push_back(candidate.clone());
        CandidateAction::Queued
    }

    /// Pop the next buffered remote candidate. When the queue is empty the
    /// remote description is marked applied in the same critical section, so
    /// later candidates go straight to the connection and none is skipped.
    pub fn next_buffered_candidate(&mut self) -> Option<IceCandidate> {
        match self.pending_candidates.pop_front() {
            Some(candidate) => {
                self.applied_candidates += 1;
                Some(candidate)
            }
            None => {
                self.remote_description_set = true;
                None
            }
        }
    }

    pub fn on_local_candidate(&mut self, candidate: &IceCandidate) -> LocalCandidateAction {
        if self.state.is_terminal() || self.ending.is_some() {
            return LocalCandidateAction::Discard;
        }
        if self.local_description_sent {
            return LocalCandidateAction::Send;
        }
        self.outbound_candidates.push(candidate.clone());
        LocalCandidateAction::Held
    }

    // -- ending --------------------------------------------------------------

    pub fn request_end(&mut self, termination: Termination) -> EndAction {
        if self.state.is_terminal() {
            return EndAction::AlreadyTerminal;
        }
        if self.ending.is_some() {
            return EndAction::AlreadyEnding;
        }
        self.ending = Some(termination);
        self.state = CallState::Ending;
        if self.step_in_flight {
            EndAction::Deferred
        } else {
            EndAction::FinalizeNow
        }
    }

    /// A step failed. Keeps an earlier termination if one was requested.
    pub fn fail(&mut self, reason: FailureReason) -> Option<Teardown> {
        if self.ending.is_none() {
            self.ending = Some(Termination::Failed(reason));
        }
        self.finalize()
    }

    /// Check in after an await inside a step.
    pub fn resume(&mut self) -> Resume {
        if self.state.is_terminal() {
            return Resume::Abandoned;
        }
        if self.ending.is_some() {
            return match self.finalize() {
                Some(td) => Resume::Finalize(td),
                None => Resume::Abandoned,
            };
        }
        Resume::Proceed
    }

    /// Move to the terminal state and hand out resources. Returns `None` if
    /// the session was already finalized.
    pub fn finalize(&mut self) -> Option<Teardown> {
        if self.state.is_terminal() {
            return None;
        }
        let termination = *self.ending.get_or_insert(Termination::LocalHangup);
        self.state = termination.final_state();
        self.step_in_flight = false;
        self.pending_candidates.clear();
        self.outbound_candidates.clear();

        let peer_knows = match self.role {
            Role::Caller => self.local_description_sent,
            Role::Callee => true,
        };
        let notify_peer = peer_knows
            && matches!(termination, Termination::LocalHangup | Termination::Declined);

        Some(Teardown {
            peer_id: self.peer_id.clone(),
            termination,
            connection: self.connection.take(),
            media: self.media.take(),
            notify_peer,
        })
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            peer_id: self.peer_id.clone(),
            call_id: self.call_id.clone(),
            role: self.role,
            state: self.state,
            display_name: self.display_name.clone(),
            pending_candidates: self.pending_candidates.len(),
            applied_candidates: self.applied_candidates,
            age: self.created_at.elapsed(),
        }
    }
}
