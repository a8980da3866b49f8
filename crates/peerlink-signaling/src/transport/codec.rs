//! Engine.IO v4 / Socket.IO v5 text framing.
//!
//! Only the websocket transport and text packets are supported. Binary
//! attachments are rejected.

use peerlink_common::SignalError;
use serde::Deserialize;
use serde_json::Value;

/// Reply to an Engine.IO ping.
pub const PONG: &str = "3";

/// Engine.IO open handshake.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

impl Handshake {
    /// How long the server may stay silent before the connection is dead.
    pub fn liveness_window_ms(&self) -> u64 {
        self.ping_interval + self.ping_timeout
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

pub fn decode_engine(text: &str) -> Result<EnginePacket, SignalError> {
    let mut chars = text.chars();
    let kind = chars
        .next()
        .ok_or_else(|| SignalError::protocol("empty engine.io packet"))?;
    let body = chars.as_str();
    match kind {
        '0' => serde_json::from_str(body)
            .map(EnginePacket::Open)
            .map_err(|e| SignalError::protocol(format!("bad handshake: {e}"))),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping(body.to_string())),
        '3' => Ok(EnginePacket::Pong(body.to_string())),
        '4' => Ok(EnginePacket::Message(body.to_string())),
        '5' => Ok(EnginePacket::Upgrade),
        '6' => Ok(EnginePacket::Noop),
        other => Err(SignalError::protocol(format!(
            "unknown engine.io packet type {other:?}"
        ))),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        payload: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        ack_id: Option<u64>,
        name: String,
        payload: Value,
    },
    Ack {
        namespace: String,
        ack_id: u64,
        data: Value,
    },
    ConnectError {
        namespace: String,
        message: String,
    },
}

/// Decode the body of an Engine.IO message packet.
pub fn decode_socket(text: &str) -> Result<SocketPacket, SignalError> {
    let mut chars = text.chars();
    let kind = chars
        .next()
        .ok_or_else(|| SignalError::protocol("empty socket.io packet"))?;
    let mut rest = chars.as_str();

    if matches!(kind, '5' | '6') {
        return Err(SignalError::protocol("binary socket.io packets are not supported"));
    }

    let mut namespace = "/".to_string();
    if rest.starts_with('/') {
        let end = rest.find(',').unwrap_or(rest.len());
        namespace = rest[..end].to_string();
        rest = rest.get(end + 1..).unwrap_or("");
    }

    let digits = rest.chars().take_while(char::is_ascii_digit).count();
    let ack_id = if digits > 0 {
        let id = rest[..digits]
            .parse::<u64>()
            .map_err(|e| SignalError::protocol(format!("bad ack id: {e}")))?;
        rest = &rest[digits..];
        Some(id)
    } else {
        None
    };

    let data = if rest.is_empty() {
        None
    } else {
        Some(
            serde_json::from_str::<Value>(rest)
                .map_err(|e| SignalError::protocol(format!("bad socket.io payload: {e}")))?,
        )
    };

    match kind {
        '0' => Ok(SocketPacket::Connect {
            namespace,
            payload: data,
        }),
        '1' => Ok(SocketPacket::Disconnect { namespace }),
        '2' => {
            let mut items = match data {
                Some(Value::Array(items)) if !items.is_empty() => items.into_iter(),
                _ => return Err(SignalError::protocol("event packet without [name, ...]")),
            };
            let name = match items.next() {
                Some(Value::String(name)) => name,
                _ => return Err(SignalError::protocol("event name is not a string")),
            };
            Ok(SocketPacket::Event {
                namespace,
                ack_id,
                name,
                payload: items.next().unwrap_or(Value::Null),
            })
        }
        '3' => Ok(SocketPacket::Ack {
            namespace,
            ack_id: ack_id.ok_or_else(|| SignalError::protocol("ack without id"))?,
            data: data.unwrap_or(Value::Null),
        }),
        '4' => {
            let message = match &data {
                Some(Value::Object(map)) => map
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("connect refused")
                    .to_string(),
                Some(Value::String(s)) => s.clone(),
                _ => "connect refused".to_string(),
            };
            Ok(SocketPacket::ConnectError { namespace, message })
        }
        other => Err(SignalError::protocol(format!(
            "unknown socket.io packet type {other:?}"
        ))),
    }
}

fn namespace_prefix(namespace: &str) -> String {
    if namespace.is_empty() || namespace == "/" {
        String::new()
    } else {
        format!("{namespace},")
    }
}

/// `40` (or `40/ns,`) namespace connect.
pub fn encode_connect(namespace: &str) -> String {
    format!("40{}", namespace_prefix(namespace))
}

pub fn encode_disconnect(namespace: &str) -> String {
    format!("41{}", namespace_prefix(namespace))
}

/// `42["name",payload]`.
pub fn encode_event(namespace: &str, name: &str, payload: &Value) -> Result<String, SignalError> {
    let body = serde_json::to_string(&serde_json::json!([name, payload]))
        .map_err(|e| SignalError::Transport(format!("encode {name}: {e}")))?;
    Ok(format!("42{}{body}", namespace_prefix(namespace)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_open_handshake() {
        let packet = decode_engine(
            r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#,
        )
        .unwrap();
        match packet {
            EnginePacket::Open(hs) => {
                assert_eq!(hs.sid, "abc");
                assert_eq!(hs.liveness_window_ms(), 45000);
                assert_eq!(hs.max_payload, Some(1_000_000));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn decodes_engine_control_packets() {
        assert_eq!(decode_engine("2").unwrap(), EnginePacket::Ping(String::new()));
        assert_eq!(decode_engine("3probe").unwrap(), EnginePacket::Pong("probe".into()));
        assert_eq!(decode_engine("1").unwrap(), EnginePacket::Close);
        assert_eq!(decode_engine("6").unwrap(), EnginePacket::Noop);
        assert_eq!(
            decode_engine("42[\"x\"]").unwrap(),
            EnginePacket::Message("2[\"x\"]".into())
        );
        assert!(decode_engine("").is_err());
        assert!(decode_engine("9").is_err());
    }

    #[test]
    fn decodes_event_with_payload() {
        let packet = decode_socket(r#"2["incoming-call",{"from":"a"}]"#).unwrap();
        assert_eq!(
            packet,
            SocketPacket::Event {
                namespace: "/".into(),
                ack_id: None,
                name: "incoming-call".into(),
                payload: json!({ "from": "a" }),
            }
        );
    }

    #[test]
    fn decodes_namespace_and_ack_id() {
        let packet = decode_socket(r#"2/calls,17["me","sock-1"]"#).unwrap();
        assert_eq!(
            packet,
            SocketPacket::Event {
                namespace: "/calls".into(),
                ack_id: Some(17),
                name: "me".into(),
                payload: json!("sock-1"),
            }
        );

        let ack = decode_socket(r#"3/calls,17[true]"#).unwrap();
        assert!(matches!(ack, SocketPacket::Ack { ack_id: 17, .. }));
    }

    #[test]
    fn event_without_args_has_null_payload() {
        let packet = decode_socket(r#"2["ping-room"]"#).unwrap();
        assert!(matches!(
            packet,
            SocketPacket::Event { payload: Value::Null, .. }
        ));
    }

    #[test]
    fn decodes_connect_and_errors() {
        assert_eq!(
            decode_socket(r#"0{"sid":"x"}"#).unwrap(),
            SocketPacket::Connect {
                namespace: "/".into(),
                payload: Some(json!({ "sid": "x" })),
            }
        );
        assert_eq!(
            decode_socket("1/calls,").unwrap(),
            SocketPacket::Disconnect {
                namespace: "/calls".into()
            }
        );
        assert_eq!(
            decode_socket(r#"4{"message":"Not authorized"}"#).unwrap(),
            SocketPacket::ConnectError {
                namespace: "/".into(),
                message: "Not authorized".into(),
            }
        );
    }

    #[test]
    fn rejects_malformed_socket_packets() {
        assert!(decode_socket("").is_err());
        assert!(decode_socket("2{}").is_err());
        assert!(decode_socket("2[1]").is_err());
        assert!(decode_socket(r#"51-["x",{"_placeholder":true}]"#).is_err());
        assert!(decode_socket("2[not json").is_err());
    }

    #[test]
    fn encodes_frames() {
        assert_eq!(encode_connect("/"), "40");
        assert_eq!(encode_connect("/calls"), "40/calls,");
        assert_eq!(encode_disconnect("/"), "41");
        assert_eq!(
            encode_event("/", "join-room", &json!("room-1")).unwrap(),
            r#"42["join-room","room-1"]"#
        );
        assert_eq!(
            encode_event("/calls", "hangup", &json!({ "to": "b" })).unwrap(),
            r#"42/calls,["hangup",{"to":"b"}]"#
        );
    }
}
