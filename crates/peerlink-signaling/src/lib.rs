//! WebRTC signaling orchestration.
//!
//! Drives offer/answer/ICE exchange for any number of peer sessions over a
//! pub/sub relay. Media capture and the WebRTC engine itself are injected
//! collaborators; this crate owns the session state, the ordering rules
//! for descriptions and candidates, and the relay wire format.

pub mod engine;
pub mod media;
pub mod orchestrator;
pub mod protocol;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

pub use engine::{ConnectionState, EngineEvent, PeerConnection, PeerConnectionFactory};
pub use media::{
    LocalMedia, MediaConstraints, MediaEvent, MediaLease, MediaTrackController, Track, TrackKind,
    TrackSet,
};
pub use orchestrator::{CallEvent, Orchestrator, OrchestratorConfig};
pub use protocol::{IceCandidate, InboundSignal, SessionDescription};
pub use session::{CallState, FailureReason, Role, SessionRegistry, SessionSnapshot};
pub use transport::{SignalTransport, SocketIoClient, SocketIoConfig, TransportEvent};
