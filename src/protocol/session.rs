//! Session state machine.
//!
//! Owns the handshake for one connection: session token, device check,
//! credential submission, and the games catalog. Every input is turned into
//! a [`Transition`] by the pure [`Session::transition`], then committed.
//! Outbound packets are returned as [`Action`]s for the caller to send; the
//! session never touches the transport.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::catalog::{Catalog, GameEntry};
use super::codec::{self, Credentials, HwidStatus, LoginStatus, Request, Response};
use super::packet::{Packet, PacketKind, SessionId};
use crate::error::AuthError;

/// Session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Transport not connected yet
    Connecting,
    /// Connected, device check not settled
    ConnectedPending,
    /// Device accepted, ready to submit credentials
    Connected,
    /// Login request being sent
    LoggingIn,
    /// Login request sent, awaiting verdict
    WaitingInput,
    /// Login accepted (terminal)
    LoggedIn,
    /// Handshake failed (terminal)
    Error,
    /// Session over (terminal, final)
    Shutdown,
}

impl SessionState {
    /// Whether no protocol packet can move the session any further
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::LoggedIn | Self::Error | Self::Shutdown)
    }

    /// Whether the session waits for user acknowledgment
    pub fn awaits_acknowledgment(&self) -> bool {
        matches!(self, Self::LoggedIn | Self::Error)
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::ConnectedPending => "connected_pending",
            Self::Connected => "connected",
            Self::LoggingIn => "logging_in",
            Self::WaitingInput => "waiting_input",
            Self::LoggedIn => "logged_in",
            Self::Error => "error",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of the device check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HwidResult {
    /// No verdict yet
    #[default]
    Unknown,
    /// Identity accepted
    Ok,
    /// Identity rejected
    Rejected,
}

/// Outcome of the login request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginResult {
    /// No verdict yet
    #[default]
    Unknown,
    /// Credentials accepted
    Success,
    /// Server failed internally
    ServerError,
}

/// What to do with inbound data the session cannot use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    /// Log at warn and keep the current state
    #[default]
    Ignore,
    /// Move the session to `Error`
    Fail,
}

/// Session behaviour knobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Client version reported in the device check
    pub client_version: String,
    /// Handling of packets that fail to decode
    pub decode_failure: Disposition,
    /// Handling of login results outside the known set
    pub unknown_login_result: Disposition,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            client_version: crate::VERSION.to_string(),
            decode_failure: Disposition::Ignore,
            unknown_login_result: Disposition::Ignore,
        }
    }
}

impl SessionConfig {
    /// Set the reported client version
    pub fn with_client_version(mut self, version: impl Into<String>) -> Self {
        self.client_version = version.into();
        self
    }

    /// Set decode failure handling
    pub fn with_decode_failure(mut self, disposition: Disposition) -> Self {
        self.decode_failure = disposition;
        self
    }

    /// Set unknown login result handling
    pub fn with_unknown_login_result(mut self, disposition: Disposition) -> Self {
        self.unknown_login_result = disposition;
        self
    }
}

/// Something that happened to the session
#[derive(Debug, Clone)]
pub enum Input {
    /// Transport connected
    Connected,
    /// Packet arrived
    Received(Packet),
    /// A frame arrived that could not be parsed into a packet
    Malformed(String),
    /// Driver is ready to submit credentials
    SubmitCredentials(Credentials),
    /// An outbound packet was written
    SendCompleted(PacketKind),
    /// An outbound packet could not be written
    SendFailed {
        /// Kind of the packet that failed
        kind: PacketKind,
        /// Transport's reason
        reason: String,
    },
    /// Transport closed
    Closed,
    /// User acknowledged a terminal state
    Acknowledged,
}

impl Input {
    fn name(&self) -> String {
        match self {
            Self::Connected => "connect".to_string(),
            Self::Received(packet) => format!("{} packet", packet.kind),
            Self::Malformed(_) => "malformed frame".to_string(),
            Self::SubmitCredentials(_) => "credential submission".to_string(),
            Self::SendCompleted(kind) => format!("{kind} send completion"),
            Self::SendFailed { kind, .. } => format!("{kind} send failure"),
            Self::Closed => "transport close".to_string(),
            Self::Acknowledged => "acknowledgment".to_string(),
        }
    }
}

/// Side effect the caller must perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Write this packet to the transport
    Send(Packet),
    /// Tear the transport down
    Teardown,
}

/// Field change carried by a transition
#[derive(Debug)]
pub enum Update {
    /// Store the session token
    SessionId(SessionId),
    /// Record the device check verdict
    Hwid(HwidResult),
    /// Record the login verdict
    Login(LoginResult),
    /// Replace the catalog
    Catalog(Vec<GameEntry>),
    /// Record why the session failed
    Failure(AuthError),
    /// Inbound data failed to decode
    DecodeFailure(String),
    /// Input had no effect
    Ignored(String),
}

/// Result of applying one input to the current session, not yet committed
#[derive(Debug)]
pub struct Transition {
    /// State after the transition
    pub next: SessionState,
    /// Field changes to commit
    pub updates: Vec<Update>,
    /// Side effects for the caller
    pub actions: Vec<Action>,
}

impl Transition {
    fn to(next: SessionState) -> Self {
        Self {
            next,
            updates: Vec::new(),
            actions: Vec::new(),
        }
    }

    fn update(mut self, update: Update) -> Self {
        self.updates.push(update);
        self
    }

    fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    fn fail(self, err: AuthError) -> Self {
        self.update(Update::Failure(err))
    }

    fn ignored(self, reason: impl Into<String>) -> Self {
        self.update(Update::Ignored(reason.into()))
    }
}

/// Session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Packets (and unparseable frames) received
    pub packets_received: u64,
    /// Packets written
    pub packets_sent: u64,
    /// Inbound data that failed to decode
    pub decode_failures: u64,
    /// Inputs that changed nothing
    pub ignored: u64,
}

/// Authentication context for one connection
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    session_id: Option<SessionId>,
    state: SessionState,
    hwid_result: HwidResult,
    login_result: LoginResult,
    catalog: Catalog,
    failure: Option<AuthError>,
    stats: SessionStats,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl Session {
    /// Create a session in `Connecting`
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            session_id: None,
            state: SessionState::Connecting,
            hwid_result: HwidResult::Unknown,
            login_result: LoginResult::Unknown,
            catalog: Catalog::new(),
            failure: None,
            stats: SessionStats::default(),
        }
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Session token, once assigned
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Device check verdict
    pub fn hwid_result(&self) -> HwidResult {
        self.hwid_result
    }

    /// Login verdict
    pub fn login_result(&self) -> LoginResult {
        self.login_result
    }

    /// Authorized games
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Why the session failed, if it did
    pub fn failure(&self) -> Option<&AuthError> {
        self.failure.as_ref()
    }

    /// Take the failure out of the session
    pub fn take_failure(&mut self) -> Option<AuthError> {
        self.failure.take()
    }

    /// Counters
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether the session is in a terminal state
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Apply an input and return the side effects to perform.
    pub fn handle(&mut self, input: Input) -> Vec<Action> {
        match &input {
            Input::Received(_) | Input::Malformed(_) => self.stats.packets_received += 1,
            Input::SendCompleted(_) => self.stats.packets_sent += 1,
            _ => {},
        }

        let transition = self.transition(&input);
        self.apply(transition)
    }

    /// Compute the transition for `input` without changing the session.
    pub fn transition(&self, input: &Input) -> Transition {
        let state = self.state;

        if let Input::Acknowledged = input {
            return if state.awaits_acknowledgment() {
                Transition::to(SessionState::Shutdown)
            } else {
                Transition::to(state).ignored(format!("acknowledgment in state {state}"))
            };
        }

        if state.is_terminal() {
            return Transition::to(state)
                .ignored(format!("{} in terminal state {state}", input.name()));
        }

        match input {
            Input::Connected => match state {
                SessionState::Connecting => Transition::to(SessionState::ConnectedPending),
                _ => Transition::to(state).ignored(format!("connect in state {state}")),
            },
            Input::Received(packet) => match codec::decode(packet) {
                Ok(response) => self.on_response(response),
                Err(err) => self.on_decode_failure(err),
            },
            Input::Malformed(reason) => self.on_decode_failure(AuthError::Decode(reason.clone())),
            Input::SubmitCredentials(credentials) => self.on_submit(credentials),
            Input::SendCompleted(kind) => match (state, kind) {
                (SessionState::LoggingIn, PacketKind::LoginReq) => {
                    Transition::to(SessionState::WaitingInput)
                },
                _ => Transition::to(state),
            },
            Input::SendFailed { kind, reason } => Transition::to(SessionState::Error).fail(
                AuthError::Transport(format!("failed to send {kind}: {reason}")),
            ),
            Input::Closed => Transition::to(SessionState::Error)
                .fail(AuthError::Transport("connection closed".to_string())),
            Input::Acknowledged => Transition::to(state),
        }
    }

    fn on_response(&self, response: Response) -> Transition {
        let state = self.state;

        match (state, response) {
            (
                SessionState::Connecting | SessionState::ConnectedPending | SessionState::Connected,
                Response::SessionInit { session_id },
            ) => {
                let request = Request::device_check(self.config.client_version.clone());
                match codec::encode(&request, Some(&session_id)) {
                    Ok(packet) => Transition::to(SessionState::ConnectedPending)
                        .update(Update::SessionId(session_id))
                        .action(Action::Send(packet)),
                    Err(err) => Transition::to(SessionState::Error)
                        .update(Update::SessionId(session_id))
                        .fail(err),
                }
            },
            (SessionState::ConnectedPending, Response::DeviceCheck { status }) => match status {
                HwidStatus::Ok => {
                    Transition::to(SessionState::Connected).update(Update::Hwid(HwidResult::Ok))
                },
                HwidStatus::Rejected => Transition::to(SessionState::Error)
                    .update(Update::Hwid(HwidResult::Rejected))
                    .fail(AuthError::DeviceRejected),
            },
            (SessionState::WaitingInput, Response::Login { status, games }) => match status {
                LoginStatus::Success => {
                    let transition = Transition::to(SessionState::LoggedIn)
                        .update(Update::Login(LoginResult::Success));
                    match games {
                        Some(games) => transition.update(Update::Catalog(games)),
                        None => transition,
                    }
                },
                LoginStatus::ServerError => Transition::to(SessionState::Error)
                    .update(Update::Login(LoginResult::ServerError))
                    .fail(AuthError::ServerError),
                LoginStatus::Other(code) => match self.config.unknown_login_result {
                    Disposition::Ignore => {
                        Transition::to(state).ignored(format!("unrecognized login result {code}"))
                    },
                    Disposition::Fail => Transition::to(SessionState::Error)
                        .fail(AuthError::UnexpectedLoginResult(code)),
                },
            },
            (_, Response::Ban) => Transition::to(SessionState::Shutdown)
                .fail(AuthError::Banned)
                .action(Action::Teardown),
            (state, response) => Transition::to(state)
                .ignored(format!("unexpected {} in state {state}", response_name(&response))),
        }
    }

    fn on_submit(&self, credentials: &Credentials) -> Transition {
        let state = self.state;

        if state != SessionState::Connected || self.hwid_result != HwidResult::Ok {
            return Transition::to(state)
                .ignored(format!("credential submission in state {state}"));
        }

        match codec::encode(&Request::login(credentials.clone()), self.session_id.as_ref()) {
            Ok(packet) => Transition::to(SessionState::LoggingIn).action(Action::Send(packet)),
            Err(err) => Transition::to(SessionState::Error).fail(err),
        }
    }

    fn on_decode_failure(&self, err: AuthError) -> Transition {
        let note = Update::DecodeFailure(err.to_string());
        match self.config.decode_failure {
            Disposition::Ignore => Transition::to(self.state).update(note),
            Disposition::Fail => Transition::to(SessionState::Error).update(note).fail(err),
        }
    }

    fn apply(&mut self, transition: Transition) -> Vec<Action> {
        let Transition {
            next,
            updates,
            actions,
        } = transition;

        for update in updates {
            match update {
                Update::SessionId(id) => {
                    tracing::debug!("Session token assigned: {}", id);
                    self.session_id = Some(id);
                },
                Update::Hwid(result) => self.hwid_result = result,
                Update::Login(result) => self.login_result = result,
                Update::Catalog(games) => {
                    tracing::info!("Available games:");
                    for game in &games {
                        tracing::info!("    {}", game.name);
                    }
                    self.catalog.replace(games);
                },
                Update::Failure(err) => {
                    match &err {
                        AuthError::Banned => tracing::warn!("Client banned by server"),
                        other => tracing::error!("Session failed: {}", other),
                    }
                    self.failure = Some(err);
                },
                Update::DecodeFailure(reason) => {
                    tracing::warn!("Dropping undecodable packet: {}", reason);
                    self.stats.decode_failures += 1;
                },
                Update::Ignored(reason) => {
                    tracing::debug!("Ignored {}", reason);
                    self.stats.ignored += 1;
                },
            }
        }

        if next != self.state {
            tracing::info!("Session state {} -> {}", self.state, next);
            if next == SessionState::LoggedIn {
                tracing::info!("Login successful");
            }
            self.state = next;
        }

        actions
    }
}

fn response_name(response: &Response) -> &'static str {
    match response {
        Response::SessionInit { .. } => "session-init",
        Response::DeviceCheck { .. } => "device check response",
        Response::Login { .. } => "login response",
        Response::Ban => "ban",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::{HWID_STATUS_OK, HWID_STATUS_REJECTED};
    use serde_json::json;

    fn session_init(token: &str) -> Input {
        Input::Received(Packet::inbound(
            PacketKind::Session,
            Some(SessionId::new(token)),
            "",
        ))
    }

    fn hwid_resp(status: i64) -> Input {
        Input::Received(Packet::inbound(
            PacketKind::HwidResp,
            Some(SessionId::new("abc")),
            json!({ "status": status }).to_string(),
        ))
    }

    fn login_resp(body: serde_json::Value) -> Input {
        Input::Received(Packet::inbound(
            PacketKind::LoginResp,
            Some(SessionId::new("abc")),
            body.to_string(),
        ))
    }

    fn connected_session() -> Session {
        let mut session = Session::default();
        session.handle(Input::Connected);
        session.handle(session_init("abc"));
        session.handle(hwid_resp(HWID_STATUS_OK));
        assert_eq!(session.state(), SessionState::Connected);
        session
    }

    fn waiting_session() -> Session {
        let mut session = connected_session();
        session.handle(Input::SubmitCredentials(Credentials::new("user", "pass")));
        session.handle(Input::SendCompleted(PacketKind::LoginReq));
        assert_eq!(session.state(), SessionState::WaitingInput);
        session
    }

    #[test]
    fn test_connect_moves_to_pending() {
        let mut session = Session::default();
        let actions = session.handle(Input::Connected);
        assert!(actions.is_empty());
        assert_eq!(session.state(), SessionState::ConnectedPending);
    }

    #[test]
    fn test_session_init_sends_device_check() {
        let mut session = Session::default();
        session.handle(Input::Connected);
        let actions = session.handle(session_init("abc"));

        assert_eq!(session.session_id().map(|s| s.as_str()), Some("abc"));
        assert_eq!(actions.len(), 1);
        let Action::Send(packet) = &actions[0] else {
            panic!("expected a send action");
        };
        assert_eq!(packet.kind, PacketKind::Hwid);
        assert_eq!(packet.session_id, Some(SessionId::new("abc")));
    }

    #[test]
    fn test_device_check_rejected() {
        let mut session = Session::default();
        session.handle(session_init("abc"));
        session.handle(hwid_resp(HWID_STATUS_REJECTED));

        assert_eq!(session.state(), SessionState::Error);
        assert_eq!(session.hwid_result(), HwidResult::Rejected);
        assert!(matches!(session.failure(), Some(AuthError::DeviceRejected)));
    }

    #[test]
    fn test_device_check_send_failure() {
        let mut session = Session::default();
        session.handle(session_init("abc"));
        session.handle(Input::SendFailed {
            kind: PacketKind::Hwid,
            reason: "broken pipe".to_string(),
        });

        assert_eq!(session.state(), SessionState::Error);
        assert!(matches!(session.failure(), Some(AuthError::Transport(_))));
    }

    #[test]
    fn test_submit_before_device_check_is_ignored() {
        let mut session = Session::default();
        session.handle(session_init("abc"));
        let actions = session.handle(Input::SubmitCredentials(Credentials::new("u", "p")));

        assert!(actions.is_empty());
        assert_eq!(session.state(), SessionState::ConnectedPending);
        assert_eq!(session.stats().ignored, 1);
    }

    #[test]
    fn test_submit_sends_login_request() {
        let mut session = connected_session();
        let actions = session.handle(Input::SubmitCredentials(Credentials::new("user", "pass")));

        assert_eq!(session.state(), SessionState::LoggingIn);
        assert_eq!(
            actions,
            vec![Action::Send(Packet::outbound(
                PacketKind::LoginReq,
                SessionId::new("abc"),
                "user,pass"
            ))]
        );
    }

    #[test]
    fn test_login_send_failure() {
        let mut session = connected_session();
        session.handle(Input::SubmitCredentials(Credentials::new("user", "pass")));
        session.handle(Input::SendFailed {
            kind: PacketKind::LoginReq,
            reason: "reset".to_string(),
        });
        assert_eq!(session.state(), SessionState::Error);
    }

    #[test]
    fn test_login_success_fills_catalog() {
        let mut session = waiting_session();
        session.handle(login_resp(json!({
            "result": 1,
            "games": {"Foo": {"id": 1, "x64": true, "version": "1.0", "process": "foo.exe"}}
        })));

        assert_eq!(session.state(), SessionState::LoggedIn);
        assert_eq!(session.login_result(), LoginResult::Success);
        assert_eq!(session.catalog().len(), 1);
        assert_eq!(session.catalog().get("Foo").map(|g| g.id), Some(1));
    }

    #[test]
    fn test_login_server_error() {
        let mut session = waiting_session();
        session.handle(login_resp(json!({"result": 2})));

        assert_eq!(session.state(), SessionState::Error);
        assert_eq!(session.login_result(), LoginResult::ServerError);
        assert!(session.catalog().is_empty());
    }

    #[test]
    fn test_unknown_login_result_policies() {
        let mut lenient = waiting_session();
        lenient.handle(login_resp(json!({"result": 7})));
        assert_eq!(lenient.state(), SessionState::WaitingInput);

        let config = SessionConfig::default().with_unknown_login_result(Disposition::Fail);
        let mut strict = Session::new(config);
        strict.handle(session_init("abc"));
        strict.handle(hwid_resp(HWID_STATUS_OK));
        strict.handle(Input::SubmitCredentials(Credentials::new("u", "p")));
        strict.handle(Input::SendCompleted(PacketKind::LoginReq));
        strict.handle(login_resp(json!({"result": 7})));

        assert_eq!(strict.state(), SessionState::Error);
        assert!(matches!(
            strict.failure(),
            Some(AuthError::UnexpectedLoginResult(7))
        ));
    }

    #[test]
    fn test_decode_failure_policies() {
        let mut lenient = Session::default();
        lenient.handle(session_init("abc"));
        lenient.handle(hwid_resp(99));
        assert_eq!(lenient.state(), SessionState::ConnectedPending);
        assert_eq!(lenient.stats().decode_failures, 1);

        let config = SessionConfig::default().with_decode_failure(Disposition::Fail);
        let mut strict = Session::new(config);
        strict.handle(session_init("abc"));
        strict.handle(Input::Malformed("truncated frame".to_string()));
        assert_eq!(strict.state(), SessionState::Error);
        assert!(strict.failure().map(AuthError::is_decode).unwrap_or(false));
    }

    #[test]
    fn test_ban_tears_down() {
        let mut session = Session::default();
        session.handle(session_init("abc"));
        let actions = session.handle(Input::Received(Packet::inbound(PacketKind::Ban, None, "")));

        assert_eq!(actions, vec![Action::Teardown]);
        assert_eq!(session.state(), SessionState::Shutdown);
    }

    #[test]
    fn test_terminal_state_ignores_packets() {
        let mut session = waiting_session();
        session.handle(login_resp(json!({"result": 2})));
        assert_eq!(session.state(), SessionState::Error);

        let actions = session.handle(Input::Received(Packet::inbound(PacketKind::Ban, None, "")));
        assert!(actions.is_empty());
        assert_eq!(session.state(), SessionState::Error);

        session.handle(Input::Acknowledged);
        assert_eq!(session.state(), SessionState::Shutdown);

        session.handle(session_init("xyz"));
        assert_eq!(session.state(), SessionState::Shutdown);
        assert_eq!(session.session_id().map(|s| s.as_str()), Some("abc"));
    }

    #[test]
    fn test_transition_is_pure() {
        let session = connected_session();
        let transition = session.transition(&Input::Closed);

        assert_eq!(transition.next, SessionState::Error);
        assert_eq!(session.state(), SessionState::Connected);
        assert!(session.failure().is_none());
    }

    #[test]
    fn test_closed_is_fatal() {
        let mut session = waiting_session();
        session.handle(Input::Closed);
        assert_eq!(session.state(), SessionState::Error);
    }

    #[test]
    fn test_acknowledge_outside_terminal_is_ignored() {
        let mut session = Session::default();
        session.handle(Input::Acknowledged);
        assert_eq!(session.state(), SessionState::Connecting);
    }
}
