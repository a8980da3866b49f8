//! Signaling message types exchanged with the relay.
//!
//! Session descriptions and ICE candidates are opaque JSON blobs produced
//! and consumed by the WebRTC engine; nothing here looks inside them.
//! Inbound payloads are decoded in one step into [`InboundSignal`] so a
//! message with a missing field is rejected as a whole.

use peerlink_common::{PeerId, SignalError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

/// Event names used on the relay.
pub mod events {
    pub const CALL_USER: &str = "call-user";
    pub const INCOMING_CALL: &str = "incoming-call";
    pub const CALL_ANSWERED: &str = "call-answered";
    pub const ANSWER: &str = "answer";
    pub const ICE_CANDIDATE: &str = "ice-candidate";
    pub const PEER_DISCONNECTED: &str = "peer-disconnected";
    pub const HANGUP: &str = "hangup";
    pub const JOIN_ROOM: &str = "join-room";
    pub const USER_CONNECTED: &str = "user-connected";
    pub const USER_DISCONNECTED: &str = "user-disconnected";
    pub const ME: &str = "me";
    pub const WELCOME: &str = "welcome";
}

// ---------------------------------------------------------------------------
// Opaque blobs
// ---------------------------------------------------------------------------

/// SDP offer or answer, kept exactly as the engine produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionDescription(pub serde_json::Value);

/// One trickled ICE candidate, kept exactly as the engine produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IceCandidate(pub serde_json::Value);

// ---------------------------------------------------------------------------
// Outbound payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallUserPayload {
    pub to: PeerId,
    pub from: PeerId,
    pub offer: SessionDescription,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallAnsweredPayload {
    pub to: PeerId,
    pub answer: SessionDescription,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundCandidatePayload {
    pub to: PeerId,
    pub candidate: IceCandidate,
}

#[derive(Debug, Clone, Serialize)]
pub struct HangupPayload {
    pub to: PeerId,
}

// ---------------------------------------------------------------------------
// Inbound payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncomingCallPayload {
    from: PeerId,
    offer: SessionDescription,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnswerPayload {
    from: PeerId,
    answer: SessionDescription,
}

#[derive(Debug, Deserialize)]
struct InboundCandidatePayload {
    from: PeerId,
    candidate: IceCandidate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PeerDisconnectedPayload {
    peer_id: PeerId,
}

#[derive(Debug, Deserialize)]
struct RemoteHangupPayload {
    from: PeerId,
}

/// A fully decoded inbound signaling message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundSignal {
    IncomingCall {
        from: PeerId,
        offer: SessionDescription,
        display_name: Option<String>,
    },
    Answer {
        from: PeerId,
        answer: SessionDescription,
    },
    IceCandidate {
        from: PeerId,
        candidate: IceCandidate,
    },
    PeerDisconnected {
        peer_id: PeerId,
    },
    Hangup {
        from: PeerId,
    },
    UserConnected {
        peer_id: PeerId,
    },
    UserDisconnected {
        peer_id: PeerId,
    },
    Welcome {
        local_id: PeerId,
    },
}

impl InboundSignal {
    /// Decode a relay event. Returns `Ok(None)` for event names this crate
    /// does not handle, and a protocol error for a known event with a
    /// malformed payload.
    pub fn decode(event: &str, payload: &serde_json::Value) -> Result<Option<Self>, SignalError> {
        let signal = match event {
            events::INCOMING_CALL => {
                let p: IncomingCallPayload = parse(event, payload)?;
                require_blob(event, "offer", &p.offer.0)?;
                Self::IncomingCall {
                    from: require_peer(event, "from", p.from)?,
                    offer: p.offer,
                    display_name: p.display_name,
                }
            }
            events::ANSWER => {
                let p: AnswerPayload = parse(event, payload)?;
                require_blob(event, "answer", &p.answer.0)?;
                Self::Answer {
                    from: require_peer(event, "from", p.from)?,
                    answer: p.answer,
                }
            }
            events::ICE_CANDIDATE => {
                let p: InboundCandidatePayload = parse(event, payload)?;
                require_blob(event, "candidate", &p.candidate.0)?;
                Self::IceCandidate {
                    from: require_peer(event, "from", p.from)?,
                    candidate: p.candidate,
                }
            }
            events::PEER_DISCONNECTED => {
                let p: PeerDisconnectedPayload = parse(event, payload)?;
                Self::PeerDisconnected {
                    peer_id: require_peer(event, "peerId", p.peer_id)?,
                }
            }
            events::HANGUP => {
                let p: RemoteHangupPayload = parse(event, payload)?;
                Self::Hangup {
                    from: require_peer(event, "from", p.from)?,
                }
            }
            events::USER_CONNECTED => Self::UserConnected {
                peer_id: bare_or_field(event, payload, "peerId")?,
            },
            events::USER_DISCONNECTED => Self::UserDisconnected {
                peer_id: bare_or_field(event, payload, "peerId")?,
            },
            events::ME | events::WELCOME => Self::Welcome {
                local_id: bare_or_field(event, payload, "id")?,
            },
            _ => return Ok(None),
        };
        Ok(Some(signal))
    }

    /// The remote peer this message concerns, if any.
    pub fn peer(&self) -> Option<&PeerId> {
        match self {
            Self::IncomingCall { from, .. }
            | Self::Answer { from, .. }
            | Self::IceCandidate { from, .. }
            | Self::Hangup { from } => Some(from),
            Self::PeerDisconnected { peer_id }
            | Self::UserConnected { peer_id }
            | Self::UserDisconnected { peer_id } => Some(peer_id),
            Self::Welcome { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse<T: DeserializeOwned>(event: &str, payload: &serde_json::Value) -> Result<T, SignalError> {
    T::deserialize(payload).map_err(|e| SignalError::protocol(format!("{event}: {e}")))
}

fn require_blob(event: &str, field: &str, value: &serde_json::Value) -> Result<(), SignalError> {
    if value.is_null() {
        return Err(SignalError::protocol(format!("{event}: `{field}` is null")));
    }
    Ok(())
}

fn require_peer(event: &str, field: &str, peer: PeerId) -> Result<PeerId, SignalError> {
    if peer.is_empty() {
        return Err(SignalError::protocol(format!("{event}: `{field}` is empty")));
    }
    Ok(peer)
}

/// Accept either a bare string payload or an object carrying `field`.
///
/// The relay sends room membership and identity events as plain ids.
fn bare_or_field(
    event: &str,
    payload: &serde_json::Value,
    field: &str,
) -> Result<PeerId, SignalError> {
    let id = match payload {
        serde_json::Value::String(s) => Some(s.as_str()),
        serde_json::Value::Object(map) => map.get(field).and_then(|v| v.as_str()),
        _ => None,
    };
    match id {
        Some(id) if !id.is_empty() => Ok(PeerId::from(id)),
        _ => Err(SignalError::protocol(format!(
            "{event}: expected an id string or `{field}` field"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_incoming_call() {
        let payload = json!({
            "from": "abc",
            "offer": { "type": "offer", "sdp": "v=0" },
            "displayName": "Alice"
        });
        let signal = InboundSignal::decode(events::INCOMING_CALL, &payload)
            .unwrap()
            .unwrap();
        match signal {
            InboundSignal::IncomingCall {
                from,
                offer,
                display_name,
            } => {
                assert_eq!(from.as_str(), "abc");
                assert_eq!(offer.0["sdp"], "v=0");
                assert_eq!(display_name.as_deref(), Some("Alice"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn incoming_call_without_display_name_is_accepted() {
        let payload = json!({ "from": "abc", "offer": { "sdp": "v=0" } });
        let signal = InboundSignal::decode(events::INCOMING_CALL, &payload).unwrap();
        assert!(matches!(
            signal,
            Some(InboundSignal::IncomingCall { display_name: None, .. })
        ));
    }

    #[test]
    fn incoming_call_missing_offer_is_protocol_error() {
        let payload = json!({ "from": "abc", "displayName": "Alice" });
        let err = InboundSignal::decode(events::INCOMING_CALL, &payload).unwrap_err();
        assert!(matches!(err, SignalError::SignalingProtocol(_)));
        assert!(err.to_string().contains("offer"));
    }

    #[test]
    fn null_answer_is_protocol_error() {
        let payload = json!({ "from": "abc", "answer": null });
        let err = InboundSignal::decode(events::ANSWER, &payload).unwrap_err();
        assert!(err.to_string().contains("`answer` is null"));
    }

    #[test]
    fn empty_sender_is_protocol_error() {
        let payload = json!({ "from": "", "candidate": { "candidate": "c" } });
        let err = InboundSignal::decode(events::ICE_CANDIDATE, &payload).unwrap_err();
        assert!(err.to_string().contains("`from` is empty"));
    }

    #[test]
    fn decodes_peer_disconnected() {
        let payload = json!({ "peerId": "gone" });
        let signal = InboundSignal::decode(events::PEER_DISCONNECTED, &payload)
            .unwrap()
            .unwrap();
        assert_eq!(
            signal,
            InboundSignal::PeerDisconnected {
                peer_id: PeerId::from("gone")
            }
        );
        assert_eq!(signal.peer().map(PeerId::as_str), Some("gone"));
    }

    #[test]
    fn room_events_accept_bare_ids() {
        let signal = InboundSignal::decode(events::USER_CONNECTED, &json!("u1"))
            .unwrap()
            .unwrap();
        assert_eq!(
            signal,
            InboundSignal::UserConnected {
                peer_id: PeerId::from("u1")
            }
        );

        let signal = InboundSignal::decode(events::USER_DISCONNECTED, &json!({ "peerId": "u2" }))
            .unwrap()
            .unwrap();
        assert_eq!(
            signal,
            InboundSignal::UserDisconnected {
                peer_id: PeerId::from("u2")
            }
        );
    }

    #[test]
    fn welcome_accepts_me_and_welcome() {
        let me = InboundSignal::decode(events::ME, &json!("sock-1")).unwrap();
        assert_eq!(
            me,
            Some(InboundSignal::Welcome {
                local_id: PeerId::from("sock-1")
            })
        );
        let welcome = InboundSignal::decode(events::WELCOME, &json!({ "id": "sock-2" })).unwrap();
        assert_eq!(
            welcome,
            Some(InboundSignal::Welcome {
                local_id: PeerId::from("sock-2")
            })
        );
        assert!(InboundSignal::decode(events::ME, &json!(42)).is_err());
    }

    #[test]
    fn unknown_events_are_not_errors() {
        let result = InboundSignal::decode("sendFile", &json!({ "data": 1 })).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn call_user_payload_uses_camel_case() {
        let payload = CallUserPayload {
            to: PeerId::from("b"),
            from: PeerId::from("a"),
            offer: SessionDescription(json!({ "type": "offer", "sdp": "x" })),
            display_name: "Alice".into(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["displayName"], "Alice");
        assert_eq!(value["to"], "b");
        assert_eq!(value["offer"]["sdp"], "x");
    }
}
