//! # Authlink - client-side session handshake
//!
//! Authenticates a process to a remote authority over a byte-stream
//! transport: negotiates a session token, proves device identity, submits
//! credentials, and retrieves the list of games the account may launch.
//!
//! ## Protocol Overview
//!
//! ```text
//! Client                              Authority
//!    |<--------- session (token) -------|
//!    |---------- hwid (identity) ------>|
//!    |<--------- hwid_resp (status) ----|
//!    |---------- login_req (creds) ---->|
//!    |<--------- login_resp (games) ----|
//! ```
//!
//! A `ban` may arrive at any point and ends the session. Every failure is
//! terminal for the session; nothing is retried.
//!
//! ### Packet Kinds
//!
//! | Kind         | Direction       | Payload                                   |
//! |--------------|-----------------|-------------------------------------------|
//! | `session`    | Server→Client   | token in envelope                         |
//! | `hwid`       | Client→Server   | `{"hwid": "<identity>", "ver": "<ver>"}`  |
//! | `hwid_resp`  | Server→Client   | `{"status": 1 \| 2}`                      |
//! | `login_req`  | Client→Server   | `user,password`                           |
//! | `login_resp` | Server→Client   | `{"result": 1 \| 2, "games": {...}}`      |
//! | `ban`        | Server→Client   | none                                      |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use authlink::{AutoAck, Client, Config, TcpTransport};
//!
//! let config = Config::load(None)?;
//! let (mut transport, events) =
//!     TcpTransport::connect_host(&config.server.host, config.server.port).await?;
//!
//! let report = Client::from_config(&config)
//!     .run(&mut transport, events, &mut AutoAck)
//!     .await?;
//!
//! for game in &report.games {
//!     println!("{} ({})", game.name, game.process_name);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: Packets, codec, session state machine, games catalog
//! - [`transport`]: Transport trait and TCP implementation
//! - [`client`]: Driver loop and user acknowledgment
//! - [`config`]: Configuration management
//! - [`error`]: Error types and result aliases

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod transport;

// Re-exports for convenience
pub use client::{Acknowledge, AutoAck, Client, SessionReport, StdinAck};
pub use config::Config;
pub use error::{AuthError, Result};
pub use protocol::{
    Catalog, Credentials, GameEntry, Packet, PacketKind, Session, SessionConfig, SessionState,
};
pub use transport::{TcpTransport, Transport, TransportEvent};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
