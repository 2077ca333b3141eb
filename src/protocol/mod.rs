//! Authlink handshake protocol.
//!
//! A client authenticates to the authority in three round trips before it
//! receives the list of games it may launch.
//!
//! ## Message Flow
//!
//! ```text
//! Client                              Server
//!    |                                  |
//!    |<--------- session (token) -------|  Token assigned
//!    |                                  |
//!    |---------- hwid (identity) ------>|  Device check
//!    |<--------- hwid_resp (status) ----|
//!    |                                  |
//!    |---------- login_req (creds) ---->|  Credential submission
//!    |<--------- login_resp (games) ----|
//!    |                                  |
//!    |<--------- ban -------------------|  May arrive at any time
//! ```
//!
//! ## State Machine
//!
//! | State              | Description                       | Valid Transitions                  |
//! |--------------------|-----------------------------------|------------------------------------|
//! | `Connecting`       | Transport not up yet              | → ConnectedPending, Error, Shutdown|
//! | `ConnectedPending` | Awaiting token / device verdict   | → Connected, Error, Shutdown       |
//! | `Connected`        | Device accepted                   | → LoggingIn, Error, Shutdown       |
//! | `LoggingIn`        | Login request being written       | → WaitingInput, Error              |
//! | `WaitingInput`     | Awaiting login verdict            | → LoggedIn, Error, Shutdown        |
//! | `LoggedIn`         | Catalog available                 | → Shutdown (on acknowledgment)     |
//! | `Error`            | Handshake failed                  | → Shutdown (on acknowledgment)     |
//! | `Shutdown`         | Done                              | (final)                            |
//!
//! A ban moves any non-terminal state to `Shutdown`. Any send failure or
//! transport close moves a non-terminal state to `Error`. Nothing is retried.
//!
//! # Usage
//!
//! ```rust,ignore
//! use authlink::protocol::{Action, Credentials, Input, Session, SessionConfig};
//!
//! let mut session = Session::new(SessionConfig::default());
//! for action in session.handle(Input::Received(packet)) {
//!     match action {
//!         Action::Send(packet) => { /* write to transport */ }
//!         Action::Teardown => { /* close transport */ }
//!     }
//! }
//! ```

mod catalog;
pub mod codec;
mod packet;
mod session;

pub use catalog::{Catalog, GameEntry};
pub use codec::{Credentials, HwidStatus, Identity, LoginStatus, Request, Response};
pub use packet::{Direction, Packet, PacketKind, SessionId};
pub use session::{
    Action, Disposition, HwidResult, Input, LoginResult, Session, SessionConfig, SessionState,
    SessionStats, Transition, Update,
};
