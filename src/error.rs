//! Authlink error types.
//!
//! Errors fall into four groups:
//!
//! - **Codec**: a request could not be encoded or a response could not be
//!   decoded ([`AuthError::Encoding`], [`AuthError::SessionNotEstablished`],
//!   [`AuthError::Decode`]).
//! - **Transport**: a send failed or the connection went away. Fatal for the
//!   session, not for the process.
//! - **Protocol**: the authority refused us (device rejected, server error,
//!   ban). Always terminal.
//! - **Ambient**: configuration and I/O.
//!
//! User acknowledgment in a terminal state is ordinary shutdown and has no
//! variant here.

use thiserror::Error;

/// Authlink errors.
#[derive(Error, Debug)]
pub enum AuthError {
    /// A request was missing a field its packet kind requires.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// An outbound packet other than session-init was built before the
    /// authority assigned a session token.
    #[error("Session not established")]
    SessionNotEstablished,

    /// Inbound payload or envelope was not well-formed for its kind.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Send failed or the connection was lost.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The authority rejected the device identity.
    #[error("Device check rejected")]
    DeviceRejected,

    /// The authority reported an internal error for the login request.
    #[error("Server error during login")]
    ServerError,

    /// The authority banned this client.
    #[error("Client banned")]
    Banned,

    /// Login response carried a result code we do not know.
    #[error("Unexpected login result: {0}")]
    UnexpectedLoginResult(i64),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuthError {
    /// Whether this error came from malformed inbound data.
    pub fn is_decode(&self) -> bool {
        matches!(self, AuthError::Decode(_))
    }
}

/// Result type alias for authlink operations
pub type Result<T> = std::result::Result<T, AuthError>;

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        AuthError::Decode(format!("JSON: {err}"))
    }
}

impl From<toml::de::Error> for AuthError {
    fn from(err: toml::de::Error) -> Self {
        AuthError::Config(err.to_string())
    }
}
