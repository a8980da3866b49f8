//! Peer sessions: state, transitions and the registry that owns them.

mod machine;
mod registry;
mod types;

pub use machine::{
    AnswerAction, CandidateAction, EndAction, LocalCandidateAction, OfferAction, Resume,
};
pub use registry::{OfferOutcome, SessionRegistry};
pub use types::{
    CallState, FailureReason, Role, Session, SessionCell, SessionHandle, SessionSnapshot,
    Teardown, Termination,
};
