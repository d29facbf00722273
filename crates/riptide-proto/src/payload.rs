//! The payload envelope and its operation codes.
//!
//! Every message on the gateway socket is one envelope:
//! `{"op": int, "d": any, "s": int64, "t": string}` where `s` and `t` are
//! present only on dispatch payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::error::ProtoError;
use crate::events::EventType;
use crate::intents::Intents;

/// Operation codes carried in the `op` field of the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Opcode {
    /// Application-level event delivery (carries `s` and `t`).
    Dispatch = 0,
    /// Liveness beat, client to gateway (also requestable by the gateway).
    Heartbeat = 1,
    /// Fresh session handshake.
    Identify = 2,
    /// Presence update command.
    PresenceUpdate = 3,
    /// Voice state update command.
    VoiceStateUpdate = 4,
    /// Re-attach to a prior session.
    Resume = 6,
    /// Gateway asks the client to disconnect and resume.
    Reconnect = 7,
    /// Request guild member chunks.
    RequestGuildMembers = 8,
    /// The session is no longer valid; body says whether it may resume.
    InvalidSession = 9,
    /// First payload after connecting; carries the heartbeat interval.
    Hello = 10,
    /// Acknowledges a client heartbeat.
    HeartbeatAck = 11,
}

/// One gateway message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Operation code.
    pub op: Opcode,
    /// Opaque body; shape depends on `op`.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub d: Value,
    /// Sequence number, dispatch only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<i64>,
    /// Event name, dispatch only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl Payload {
    /// Build a command payload with the given opcode and body.
    #[must_use]
    pub const fn command(op: Opcode, d: Value) -> Self {
        Self {
            op,
            d,
            s: None,
            t: None,
        }
    }

    /// Build a heartbeat carrying the last-seen sequence number.
    ///
    /// Before any dispatch has been observed the body is `null`.
    #[must_use]
    pub fn heartbeat(sequence: i64) -> Self {
        let d = if sequence == 0 {
            Value::Null
        } else {
            Value::from(sequence)
        };
        Self::command(Opcode::Heartbeat, d)
    }

    /// Build an identify handshake payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the identify body cannot be serialized.
    pub fn identify(identify: &Identify) -> Result<Self, ProtoError> {
        let d = serde_json::to_value(identify).map_err(ProtoError::Encoding)?;
        Ok(Self::command(Opcode::Identify, d))
    }

    /// Build a resume payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the resume body cannot be serialized.
    pub fn resume(resume: &Resume) -> Result<Self, ProtoError> {
        let d = serde_json::to_value(resume).map_err(ProtoError::Encoding)?;
        Ok(Self::command(Opcode::Resume, d))
    }

    /// Decode one envelope from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed JSON or an unknown opcode.
    pub fn from_json(text: &str) -> Result<Self, ProtoError> {
        serde_json::from_str(text).map_err(ProtoError::Decoding)
    }

    /// Encode this envelope as JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, ProtoError> {
        serde_json::to_string(self).map_err(ProtoError::Encoding)
    }

    /// Look up the dispatch event type, if `t` names a known event.
    #[must_use]
    pub fn event_type(&self) -> Option<EventType> {
        self.t.as_deref().and_then(EventType::from_name)
    }

    /// Resumability flag embedded in an `InvalidSession` body.
    ///
    /// An absent or non-boolean body is treated as non-resumable.
    #[must_use]
    pub fn invalid_session_resumable(&self) -> bool {
        self.d.as_bool().unwrap_or(false)
    }
}

/// Client properties declared at identify time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProperties {
    /// Operating system name.
    pub os: String,
    /// Library name reported as the browser.
    pub browser: String,
    /// Library name reported as the device.
    pub device: String,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: "riptide".to_string(),
            device: "riptide".to_string(),
        }
    }
}

/// Body of the identify handshake payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identify {
    /// Bot authentication token.
    pub token: String,
    /// Client properties.
    pub properties: ConnectionProperties,
    /// Whether transport-level payload compression is requested.
    pub compress: bool,
    /// Member-count threshold above which guilds are sent offline-member-less.
    pub large_threshold: u8,
    /// `[shard_index, shard_count]`.
    pub shard: [u32; 2],
    /// Initial presence, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence: Option<Value>,
    /// Declared capability flags.
    pub intents: Intents,
}

/// Body of the resume payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resume {
    /// Bot authentication token.
    pub token: String,
    /// Session to re-attach to.
    pub session_id: String,
    /// Last sequence number processed by the client.
    pub seq: i64,
}

/// Body of the hello payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    /// Heartbeat interval in milliseconds.
    pub heartbeat_interval: u64,
}

impl Hello {
    /// Parse a hello body out of an envelope's `d` field.
    ///
    /// # Errors
    ///
    /// Returns an error when the body is missing or `heartbeat_interval`
    /// is not a positive number.
    pub fn from_data(d: &Value) -> Result<Self, ProtoError> {
        let hello: Self =
            serde_json::from_value(d.clone()).map_err(|e| ProtoError::MalformedBody {
                context: "hello",
                reason: e.to_string(),
            })?;
        if hello.heartbeat_interval == 0 {
            return Err(ProtoError::MalformedBody {
                context: "hello",
                reason: "heartbeat_interval must be positive".to_string(),
            });
        }
        Ok(hello)
    }
}

/// Fields of the Ready dispatch event the session core needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyData {
    /// Protocol version the gateway settled on.
    #[serde(rename = "v", default)]
    pub version: u8,
    /// Session identifier, required for resuming.
    pub session_id: String,
    /// Gateway URL to dial when resuming this session.
    pub resume_gateway_url: String,
    /// Shard information echoed back, if identify carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard: Option<[u32; 2]>,
}

impl ReadyData {
    /// Parse a ready body out of an envelope's `d` field.
    ///
    /// # Errors
    ///
    /// Returns an error when the body lacks the session id or resume URL.
    pub fn from_data(d: &Value) -> Result<Self, ProtoError> {
        serde_json::from_value(d.clone()).map_err(|e| ProtoError::MalformedBody {
            context: "ready",
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ==================== Opcode Tests ====================

    #[test]
    fn test_opcode_roundtrip() {
        let json = serde_json::to_string(&Opcode::Hello).unwrap();
        assert_eq!(json, "10");
        let op: Opcode = serde_json::from_str(&json).unwrap();
        assert_eq!(op, Opcode::Hello);
    }

    #[test]
    fn test_opcode_unknown_value_rejected() {
        let result = serde_json::from_str::<Opcode>("5");
        assert!(result.is_err());
    }

    // ==================== Payload Tests ====================

    #[test]
    fn test_payload_decode_dispatch() {
        let payload =
            Payload::from_json(r#"{"op":0,"d":{"content":"hi"},"s":42,"t":"MESSAGE_CREATE"}"#)
                .unwrap();

        assert_eq!(payload.op, Opcode::Dispatch);
        assert_eq!(payload.s, Some(42));
        assert_eq!(payload.t.as_deref(), Some("MESSAGE_CREATE"));
        assert_eq!(payload.event_type(), Some(EventType::MessageCreate));
    }

    #[test]
    fn test_payload_decode_hello() {
        let payload = Payload::from_json(r#"{"op":10,"d":{"heartbeat_interval":45000}}"#).unwrap();

        assert_eq!(payload.op, Opcode::Hello);
        assert_eq!(payload.s, None);
        assert_eq!(payload.t, None);

        let hello = Hello::from_data(&payload.d).unwrap();
        assert_eq!(hello.heartbeat_interval, 45000);
    }

    #[test]
    fn test_payload_decode_malformed_json() {
        assert!(matches!(
            Payload::from_json("{not json"),
            Err(ProtoError::Decoding(_))
        ));
    }

    #[test]
    fn test_payload_decode_unknown_opcode() {
        assert!(matches!(
            Payload::from_json(r#"{"op":99,"d":null}"#),
            Err(ProtoError::Decoding(_))
        ));
    }

    #[test]
    fn test_payload_encode_skips_absent_fields() {
        let payload = Payload::command(Opcode::HeartbeatAck, Value::Null);
        let json = payload.to_json().unwrap();
        assert_eq!(json, r#"{"op":11}"#);
    }

    #[test]
    fn test_heartbeat_carries_sequence() {
        let payload = Payload::heartbeat(42);
        assert_eq!(payload.op, Opcode::Heartbeat);
        assert_eq!(payload.d, json!(42));
    }

    #[test]
    fn test_heartbeat_null_before_first_dispatch() {
        let payload = Payload::heartbeat(0);
        assert_eq!(payload.d, Value::Null);
        assert_eq!(payload.to_json().unwrap(), r#"{"op":1}"#);
    }

    #[test]
    fn test_invalid_session_resumable_flag() {
        let payload = Payload::from_json(r#"{"op":9,"d":true}"#).unwrap();
        assert!(payload.invalid_session_resumable());

        let payload = Payload::from_json(r#"{"op":9,"d":false}"#).unwrap();
        assert!(!payload.invalid_session_resumable());

        // Absent body defaults to non-resumable.
        let payload = Payload::from_json(r#"{"op":9}"#).unwrap();
        assert!(!payload.invalid_session_resumable());
    }

    // ==================== Command Body Tests ====================

    #[test]
    fn test_identify_wire_shape() {
        let identify = Identify {
            token: "bot-token".to_string(),
            properties: ConnectionProperties {
                os: "linux".to_string(),
                browser: "riptide".to_string(),
                device: "riptide".to_string(),
            },
            compress: false,
            large_threshold: 50,
            shard: [0, 1],
            presence: None,
            intents: Intents::GUILDS | Intents::GUILD_MESSAGES,
        };

        let payload = Payload::identify(&identify).unwrap();
        assert_eq!(payload.op, Opcode::Identify);
        assert_eq!(payload.d["token"], "bot-token");
        assert_eq!(payload.d["shard"], json!([0, 1]));
        assert_eq!(payload.d["properties"]["os"], "linux");
        assert_eq!(
            payload.d["intents"],
            json!((Intents::GUILDS | Intents::GUILD_MESSAGES).bits())
        );
        assert!(payload.d.get("presence").is_none());
    }

    #[test]
    fn test_resume_wire_shape() {
        let resume = Resume {
            token: "bot-token".to_string(),
            session_id: "abc123".to_string(),
            seq: 1337,
        };

        let payload = Payload::resume(&resume).unwrap();
        assert_eq!(payload.op, Opcode::Resume);
        assert_eq!(
            payload.d,
            json!({"token": "bot-token", "session_id": "abc123", "seq": 1337})
        );
    }

    #[test]
    fn test_hello_rejects_non_numeric_interval() {
        let result = Hello::from_data(&json!({"heartbeat_interval": "soon"}));
        assert!(matches!(
            result,
            Err(ProtoError::MalformedBody { context: "hello", .. })
        ));
    }

    #[test]
    fn test_hello_rejects_zero_interval() {
        let result = Hello::from_data(&json!({"heartbeat_interval": 0}));
        assert!(result.is_err());
    }

    #[test]
    fn test_ready_data_parse() {
        let data = json!({
            "v": 10,
            "session_id": "sess-1",
            "resume_gateway_url": "wss://resume.gateway.example",
            "shard": [2, 4],
            "user": {"id": "1"}
        });

        let ready = ReadyData::from_data(&data).unwrap();
        assert_eq!(ready.session_id, "sess-1");
        assert_eq!(ready.resume_gateway_url, "wss://resume.gateway.example");
        assert_eq!(ready.shard, Some([2, 4]));
    }

    #[test]
    fn test_ready_data_requires_session_id() {
        let result = ReadyData::from_data(&json!({"resume_gateway_url": "wss://x"}));
        assert!(matches!(
            result,
            Err(ProtoError::MalformedBody { context: "ready", .. })
        ));
    }

    #[test]
    fn test_default_connection_properties() {
        let props = ConnectionProperties::default();
        assert_eq!(props.os, std::env::consts::OS);
        assert_eq!(props.browser, "riptide");
        assert_eq!(props.device, "riptide");
    }
}
