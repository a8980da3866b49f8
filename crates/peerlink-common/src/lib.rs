pub mod errors;
pub mod id;
pub mod types;

pub use errors::{ConfigError, PeerlinkError, SignalError};
pub use id::{new_correlation_id, PeerId};
pub use types::IceServer;

pub type Result<T> = std::result::Result<T, PeerlinkError>;
