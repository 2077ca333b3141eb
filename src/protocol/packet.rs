//! Packet envelope and wire framing.
//!
//! Every packet travels as one line of JSON:
//!
//! ```text
//! {"id":"login_resp","type":"read","session_id":"abc","payload":"{\"result\":1}"}
//! ```
//!
//! The envelope carries the packet kind, its declared direction, the session
//! token it is scoped to, and a kind-specific UTF-8 payload. Payload
//! structure is the codec's business, not the envelope's.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

/// Packet kind discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketKind {
    /// Session-init, assigns the session token
    Session,
    /// Device-check request
    Hwid,
    /// Device-check response
    HwidResp,
    /// Login request
    LoginReq,
    /// Login response
    LoginResp,
    /// Ban notification
    Ban,
}

impl PacketKind {
    /// Direction this kind travels in.
    pub fn direction(&self) -> Direction {
        match self {
            Self::Hwid | Self::LoginReq => Direction::Write,
            Self::Session | Self::HwidResp | Self::LoginResp | Self::Ban => Direction::Read,
        }
    }

    /// Wire name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Hwid => "hwid",
            Self::HwidResp => "hwid_resp",
            Self::LoginReq => "login_req",
            Self::LoginResp => "login_resp",
            Self::Ban => "ban",
        }
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Packet direction, declared alongside the kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Inbound, server to client
    Read,
    /// Outbound, client to server
    Write,
}

/// Opaque session token assigned by the authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a token. Empty tokens are allowed here; the codec decides
    /// whether one is acceptable.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Token as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the token is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

/// Protocol packet envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    /// Packet kind
    #[serde(rename = "id")]
    pub kind: PacketKind,
    /// Declared direction
    #[serde(rename = "type")]
    pub direction: Direction,
    /// Session token (absent before session-init)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Kind-specific UTF-8 body
    #[serde(default)]
    pub payload: String,
}

impl Packet {
    /// Create a packet with an explicit direction
    pub fn new(
        kind: PacketKind,
        direction: Direction,
        session_id: Option<SessionId>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            direction,
            session_id,
            payload: payload.into(),
        }
    }

    /// Create an inbound packet
    pub fn inbound(kind: PacketKind, session_id: Option<SessionId>, payload: impl Into<String>) -> Self {
        Self::new(kind, Direction::Read, session_id, payload)
    }

    /// Create an outbound packet
    pub fn outbound(kind: PacketKind, session_id: SessionId, payload: impl Into<String>) -> Self {
        Self::new(kind, Direction::Write, Some(session_id), payload)
    }

    /// Payload bytes
    pub fn payload_bytes(&self) -> &[u8] {
        self.payload.as_bytes()
    }

    /// Serialize to a single wire frame, newline included
    pub fn to_frame(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)
            .map_err(|e| AuthError::Encoding(format!("packet envelope: {e}")))?;
        line.push('\n');
        Ok(line)
    }

    /// Parse one wire frame. Trailing whitespace is ignored.
    pub fn from_frame(line: &str) -> Result<Self> {
        serde_json::from_str(line.trim_end())
            .map_err(|e| AuthError::Decode(format!("packet envelope: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_directions() {
        assert_eq!(PacketKind::Hwid.direction(), Direction::Write);
        assert_eq!(PacketKind::LoginReq.direction(), Direction::Write);
        assert_eq!(PacketKind::Session.direction(), Direction::Read);
        assert_eq!(PacketKind::Ban.direction(), Direction::Read);
    }

    #[test]
    fn test_frame_shape() {
        let packet = Packet::outbound(PacketKind::LoginReq, "abc".into(), "user,pass");
        let frame = packet.to_frame().unwrap();

        assert!(frame.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(frame.trim_end()).unwrap();
        assert_eq!(value["id"], "login_req");
        assert_eq!(value["type"], "write");
        assert_eq!(value["session_id"], "abc");
        assert_eq!(value["payload"], "user,pass");
    }

    #[test]
    fn test_frame_without_session_or_payload() {
        let packet = Packet::from_frame(r#"{"id":"ban","type":"read"}"#).unwrap();
        assert_eq!(packet.kind, PacketKind::Ban);
        assert!(packet.session_id.is_none());
        assert!(packet.payload.is_empty());
    }

    #[test]
    fn test_unknown_kind_is_decode_error() {
        let err = Packet::from_frame(r#"{"id":"teleport","type":"read"}"#).unwrap_err();
        assert!(err.is_decode());
    }
}
