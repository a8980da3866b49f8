use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Short random hex id for tying log lines together.
pub fn new_correlation_id() -> String {
    let uuid = uuid::Uuid::new_v4();
    let bytes = uuid.as_bytes();
    format!(
        "{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3]
    )
}

/// Identity of a participant as assigned by the signaling relay.
///
/// Scoped to one transport connection: a reconnecting client usually comes
/// back with a different id. Ordering is plain lexical order of the
/// underlying string, which is what the glare tie-break relies on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for PeerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_id_is_short_hex() {
        let cid = new_correlation_id();
        assert_eq!(cid.len(), 8);
        assert!(cid.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn peer_id_orders_lexically() {
        let a = PeerId::from("Ab12");
        let b = PeerId::from("b000");
        assert!(a < b);
        assert!(PeerId::from("peer-10") < PeerId::from("peer-9"));
    }

    #[test]
    fn peer_id_serializes_as_plain_string() {
        let id = PeerId::from("xyz");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"xyz\"");
        let back: PeerId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn peer_id_lookup_by_str() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(PeerId::from("alice"), 1);
        assert_eq!(map.get("alice"), Some(&1));
    }

    #[test]
    fn peer_id_display() {
        let id = PeerId::new("socket-1");
        assert_eq!(id.to_string(), "socket-1");
        assert_eq!(id.as_str(), "socket-1");
        assert!(!id.is_empty());
    }
}
