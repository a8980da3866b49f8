//! Session data: role, call state, failure reasons and snapshots.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use peerlink_common::{PeerId, SignalError};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::engine::PeerConnection;
use crate::media::MediaLease;
use crate::protocol::{IceCandidate, SessionDescription};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Caller,
    Callee,
}

/// Why a session failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    PermissionDenied,
    DeviceUnavailable,
    NegotiationFailed,
    TransportDisconnected,
    Protocol,
}

impl From<&SignalError> for FailureReason {
    fn from(err: &SignalError) -> Self {
        match err {
            SignalError::PermissionDenied(_) => Self::PermissionDenied,
            SignalError::DeviceUnavailable(_) => Self::DeviceUnavailable,
            SignalError::SignalingProtocol(_) => Self::Protocol,
            SignalError::TransportDisconnected | SignalError::Transport(_) => {
                Self::TransportDisconnected
            }
            SignalError::NegotiationFailed(_) | SignalError::AlreadyInSession(_) => {
                Self::NegotiationFailed
            }
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PermissionDenied => "permission denied",
            Self::DeviceUnavailable => "device unavailable",
            Self::NegotiationFailed => "negotiation failed",
            Self::TransportDisconnected => "transport disconnected",
            Self::Protocol => "protocol error",
        };
        f.write_str(s)
    }
}

/// Signaling state of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum CallState {
    Idle,
    Offering,
    Answering,
    Connected,
    Ending,
    Ended,
    Declined,
    Failed(FailureReason),
}

impl CallState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::Declined | Self::Failed(_))
    }
}

/// How a session is being brought down. The first one requested wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    LocalHangup,
    RemoteHangup,
    Declined,
    Failed(FailureReason),
    /// Failed as part of a transport-wide disconnect; reported in one batch.
    TransportLost,
    /// Replaced by the remote offer after losing a glare tie-break.
    Superseded,
}

impl Termination {
    pub fn final_state(self) -> CallState {
        match self {
            Self::LocalHangup | Self::RemoteHangup | Self::Superseded => CallState::Ended,
            Self::Declined => CallState::Declined,
            Self::Failed(reason) => CallState::Failed(reason),
            Self::TransportLost => CallState::Failed(FailureReason::TransportDisconnected),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One peer session. Mutated only through the state machine methods.
pub struct Session {
    pub(crate) peer_id: PeerId,
    /// Short id carried in log lines for this call.
    pub(crate) call_id: String,
    pub(crate) role: Role,
    pub(crate) state: CallState,
    pub(crate) display_name: Option<String>,
    /// Remote offer held until the user accepts.
    pub(crate) remote_offer: Option<SessionDescription>,
    /// Remote candidates waiting for the remote description.
    pub(crate) pending_candidates: VecDeque<IceCandidate>,
    /// Local candidates waiting for our description to go out.
    pub(crate) outbound_candidates: Vec<IceCandidate>,
    pub(crate) local_description_set: bool,
    pub(crate) local_description_sent: bool,
    pub(crate) remote_description_set: bool,
    pub(crate) answer_seen: bool,
    pub(crate) applied_candidates: usize,
    /// An async step (call, accept, apply answer) is running.
    pub(crate) step_in_flight: bool,
    pub(crate) ending: Option<Termination>,
    pub(crate) connection: Option<Arc<dyn PeerConnection>>,
    pub(crate) media: Option<MediaLease>,
    pub(crate) created_at: Instant,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("peer_id", &self.peer_id)
            .field("call_id", &self.call_id)
            .field("role", &self.role)
            .field("state", &self.state)
            .field("pending_candidates", &self.pending_candidates.len())
            .field("step_in_flight", &self.step_in_flight)
            .field("ending", &self.ending)
            .field("has_connection", &self.connection.is_some())
            .field("has_media", &self.media.is_some())
            .finish()
    }
}

/// Resources and intent handed back by [`Session::finalize`]. Whoever holds
/// it performs the teardown; it is produced at most once per session.
pub struct Teardown {
    pub peer_id: PeerId,
    pub termination: Termination,
    pub connection: Option<Arc<dyn PeerConnection>>,
    pub media: Option<MediaLease>,
    /// The remote side knows about this session and should be told.
    pub notify_peer: bool,
}

impl fmt::Debug for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Teardown")
            .field("peer_id", &self.peer_id)
            .field("termination", &self.termination)
            .field("has_connection", &self.connection.is_some())
            .field("has_media", &self.media.is_some())
            .field("notify_peer", &self.notify_peer)
            .finish()
    }
}

/// Read-only view of a session for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub peer_id: PeerId,
    pub call_id: String,
    pub role: Role,
    pub state: CallState,
    pub display_name: Option<String>,
    pub pending_candidates: usize,
    pub applied_candidates: usize,
    #[serde(skip)]
    pub age: Duration,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Shared cell for one session.
///
/// `state` is locked briefly for every transition. `turn` is held for the
/// whole of a multi-step operation so call, accept and apply-answer never
/// interleave on the same session.
#[derive(Debug)]
pub struct SessionCell {
    pub(crate) state: Mutex<Session>,
    pub(crate) turn: Mutex<()>,
}

impl SessionCell {
    pub(crate) fn new(session: Session) -> Self {
        Self {
            state: Mutex::new(session),
            turn: Mutex::new(()),
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().await.snapshot()
    }
}

pub type SessionHandle = Arc<SessionCell>;
