use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Errors raised by signaling, media acquisition and the relay transport.
///
/// Only `AlreadyInSession` and `TransportDisconnected` ever reach the caller
/// of an orchestrator command; everything session-local is reported through
/// lifecycle events instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalError {
    #[error("already in a session with {0}")]
    AlreadyInSession(String),

    #[error("media permission denied: {0}")]
    PermissionDenied(String),

    #[error("media device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("signaling protocol error: {0}")]
    SignalingProtocol(String),

    #[error("negotiation failed: {0}")]
    NegotiationFailed(String),

    #[error("signaling transport disconnected")]
    TransportDisconnected,

    #[error("transport error: {0}")]
    Transport(String),
}

impl SignalError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::SignalingProtocol(msg.into())
    }

    pub fn negotiation(msg: impl Into<String>) -> Self {
        Self::NegotiationFailed(msg.into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PeerlinkError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Signal(#[from] SignalError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::FileNotFound(PathBuf::from("/tmp/missing.toml"));
        assert_eq!(err.to_string(), "config file not found: /tmp/missing.toml");

        let err = ConfigError::ParseError("unexpected token".into());
        assert_eq!(err.to_string(), "config parse error: unexpected token");

        let err = ConfigError::ValidationError("relay.url is empty".into());
        assert_eq!(err.to_string(), "config validation error: relay.url is empty");
    }

    #[test]
    fn signal_error_display() {
        let err = SignalError::AlreadyInSession("peer-b".into());
        assert_eq!(err.to_string(), "already in a session with peer-b");

        let err = SignalError::PermissionDenied("camera".into());
        assert_eq!(err.to_string(), "media permission denied: camera");

        let err = SignalError::DeviceUnavailable("no microphone".into());
        assert_eq!(err.to_string(), "media device unavailable: no microphone");

        let err = SignalError::protocol("missing field `offer`");
        assert_eq!(
            err.to_string(),
            "signaling protocol error: missing field `offer`"
        );

        let err = SignalError::negotiation("ice failed");
        assert_eq!(err.to_string(), "negotiation failed: ice failed");

        let err = SignalError::TransportDisconnected;
        assert_eq!(err.to_string(), "signaling transport disconnected");
    }

    #[test]
    fn peerlink_error_from_config() {
        let config_err = ConfigError::ParseError("bad toml".into());
        let err: PeerlinkError = config_err.into();
        assert!(matches!(err, PeerlinkError::Config(_)));
        assert!(err.to_string().contains("bad toml"));
    }

    #[test]
    fn peerlink_error_from_signal() {
        let err: PeerlinkError = SignalError::AlreadyInSession("alice".into()).into();
        assert!(matches!(err, PeerlinkError::Signal(_)));
        assert!(err.to_string().contains("alice"));
    }

    #[test]
    fn peerlink_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: PeerlinkError = io_err.into();
        assert!(matches!(err, PeerlinkError::Io(_)));
        assert!(err.to_string().contains("file missing"));
    }
}
