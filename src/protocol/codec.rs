//! Request encoding and response decoding.
//!
//! Pure translation between typed records and packet payloads. Nothing here
//! touches session state; the state machine decides what a failure means.
//!
//! | Kind         | Payload                                            |
//! |--------------|----------------------------------------------------|
//! | `hwid`       | `{"hwid":"{\"uid\":0}","ver":"<client version>"}`  |
//! | `login_req`  | `<username>,<password>`                            |
//! | `hwid_resp`  | `{"status":<int>}`                                 |
//! | `login_resp` | `{"result":<int>,"games":{<name>:{...}}}`          |
//! | `session`    | token in the envelope, payload ignored             |
//! | `ban`        | payload ignored                                    |

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::catalog::GameEntry;
use super::packet::{Direction, Packet, PacketKind, SessionId};
use crate::error::{AuthError, Result};

/// `hwid_resp` status: identity accepted
pub const HWID_STATUS_OK: i64 = 1;
/// `hwid_resp` status: identity rejected
pub const HWID_STATUS_REJECTED: i64 = 2;
/// `login_resp` result: credentials accepted
pub const LOGIN_RESULT_SUCCESS: i64 = 1;
/// `login_resp` result: internal server error
pub const LOGIN_RESULT_SERVER_ERROR: i64 = 2;

/// Device identity blob sent with the device check.
///
/// Fingerprint collection is not implemented; every client reports the
/// minimal identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Unique device id
    pub uid: u64,
}

impl Identity {
    /// The fixed `{uid: 0}` identity
    pub fn minimal() -> Self {
        Self { uid: 0 }
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::minimal()
    }
}

/// Account credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account name
    pub username: String,
    /// Account password
    pub password: String,
}

impl Credentials {
    /// Create credentials
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Outbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Device identity check
    DeviceCheck {
        /// Identity blob
        identity: Identity,
        /// Client version string
        version: String,
    },
    /// Credential submission
    Login {
        /// Account credentials
        credentials: Credentials,
    },
}

impl Request {
    /// Device check with the minimal identity
    pub fn device_check(version: impl Into<String>) -> Self {
        Self::DeviceCheck {
            identity: Identity::minimal(),
            version: version.into(),
        }
    }

    /// Login request
    pub fn login(credentials: Credentials) -> Self {
        Self::Login { credentials }
    }

    /// Packet kind this request encodes to
    pub fn kind(&self) -> PacketKind {
        match self {
            Self::DeviceCheck { .. } => PacketKind::Hwid,
            Self::Login { .. } => PacketKind::LoginReq,
        }
    }
}

/// Device-check verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HwidStatus {
    /// Identity accepted
    Ok,
    /// Identity rejected
    Rejected,
}

/// Login verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginStatus {
    /// Credentials accepted
    Success,
    /// Server failed internally
    ServerError,
    /// Result code outside the known set
    Other(i64),
}

/// Decoded inbound packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Response {
    /// Session token assignment
    SessionInit {
        /// Token to scope all later packets to
        session_id: SessionId,
    },
    /// Device-check verdict
    DeviceCheck {
        /// Verdict
        status: HwidStatus,
    },
    /// Login verdict
    Login {
        /// Verdict
        status: LoginStatus,
        /// Authorized games, present only on success with a `games` field
        games: Option<Vec<GameEntry>>,
    },
    /// Ban notification
    Ban,
}

#[derive(Serialize)]
struct DeviceCheckBody<'a> {
    hwid: String,
    ver: &'a str,
}

#[derive(Deserialize)]
struct DeviceCheckReply {
    status: i64,
}

#[derive(Deserialize)]
struct LoginReply {
    result: i64,
    #[serde(default)]
    games: Option<Value>,
}

#[derive(Deserialize)]
struct GameRecord {
    id: u32,
    x64: bool,
    version: String,
    process: String,
}

/// Encode a request into an outbound packet scoped to `session_id`.
pub fn encode(request: &Request, session_id: Option<&SessionId>) -> Result<Packet> {
    let session_id = match session_id {
        Some(id) if !id.is_empty() => id.clone(),
        _ => return Err(AuthError::SessionNotEstablished),
    };

    let payload = match request {
        Request::DeviceCheck { identity, version } => {
            if version.is_empty() {
                return Err(AuthError::Encoding(
                    "device check requires a client version".to_string(),
                ));
            }
            let hwid = serde_json::to_string(identity)
                .map_err(|e| AuthError::Encoding(format!("identity: {e}")))?;
            serde_json::to_string(&DeviceCheckBody { hwid, ver: version })
                .map_err(|e| AuthError::Encoding(format!("device check: {e}")))?
        },
        Request::Login { credentials } => {
            if credentials.username.is_empty() {
                return Err(AuthError::Encoding(
                    "login requires a username".to_string(),
                ));
            }
            format!("{},{}", credentials.username, credentials.password)
        },
    };

    Ok(Packet::outbound(request.kind(), session_id, payload))
}

/// Decode an inbound packet.
pub fn decode(packet: &Packet) -> Result<Response> {
    if packet.direction != Direction::Read {
        return Err(AuthError::Decode(format!(
            "{} packet declared as outbound",
            packet.kind
        )));
    }
    decode_payload(packet.kind, packet.session_id.as_ref(), packet.payload_bytes())
}

/// Decode raw payload bytes for `kind`. `session_id` is the envelope token,
/// only consulted for session-init.
pub fn decode_payload(
    kind: PacketKind,
    session_id: Option<&SessionId>,
    payload: &[u8],
) -> Result<Response> {
    match kind {
        PacketKind::Session => match session_id {
            Some(id) if !id.is_empty() => Ok(Response::SessionInit {
                session_id: id.clone(),
            }),
            _ => Err(AuthError::Decode(
                "session packet without a token".to_string(),
            )),
        },
        PacketKind::HwidResp => {
            let reply: DeviceCheckReply = parse(kind, payload)?;
            let status = match reply.status {
                HWID_STATUS_OK => HwidStatus::Ok,
                HWID_STATUS_REJECTED => HwidStatus::Rejected,
                other => {
                    return Err(AuthError::Decode(format!(
                        "unknown device check status {other}"
                    )))
                },
            };
            Ok(Response::DeviceCheck { status })
        },
        PacketKind::LoginResp => {
            let reply: LoginReply = parse(kind, payload)?;
            let status = match reply.result {
                LOGIN_RESULT_SUCCESS => LoginStatus::Success,
                LOGIN_RESULT_SERVER_ERROR => LoginStatus::ServerError,
                other => LoginStatus::Other(other),
            };
            let games = match (status, reply.games) {
                (LoginStatus::Success, Some(games)) => Some(decode_games(games)?),
                _ => None,
            };
            Ok(Response::Login { status, games })
        },
        PacketKind::Ban => Ok(Response::Ban),
        PacketKind::Hwid | PacketKind::LoginReq => Err(AuthError::Decode(format!(
            "{kind} is an outbound-only packet"
        ))),
    }
}

fn parse<T: serde::de::DeserializeOwned>(kind: PacketKind, payload: &[u8]) -> Result<T> {
    let text = std::str::from_utf8(payload)
        .map_err(|e| AuthError::Decode(format!("{kind} payload is not UTF-8: {e}")))?;
    serde_json::from_str(text).map_err(|e| AuthError::Decode(format!("{kind} payload: {e}")))
}

fn decode_games(games: Value) -> Result<Vec<GameEntry>> {
    let Value::Object(map) = games else {
        return Err(AuthError::Decode("games must be an object".to_string()));
    };

    // serde_json is built with preserve_order, so this walks document order.
    map.into_iter()
        .map(|(name, data)| {
            let record: GameRecord = serde_json::from_value(data)
                .map_err(|e| AuthError::Decode(format!("game '{name}': {e}")))?;
            Ok(GameEntry {
                id: record.id,
                version: record.version,
                name,
                process_name: record.process,
                is_64bit: record.x64,
            })
        })
        .collect()
}
