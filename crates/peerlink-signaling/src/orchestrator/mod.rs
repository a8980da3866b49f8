//! Orchestrator: wires the session registry and state machine to the relay
//! transport, the media controller and the WebRTC engine.

mod dispatch;
mod manager;
mod steps;
mod types;

pub use manager::Orchestrator;
pub use types::{CallEvent, OrchestratorConfig};
