//! Driver loop.
//!
//! [`Client`] owns the [`Session`] for one connection. It sleeps on the
//! transport's event channel, feeds each event to the session, performs the
//! actions the session asks for, and runs the state-entry steps only the
//! driver can take: submitting credentials once the device is accepted and
//! waiting for the user to acknowledge a terminal state.
//!
//! Every committed state is published on a [`watch`] channel so observers
//! wake on real transitions instead of polling.

mod ack;

pub use ack::{Acknowledge, AutoAck, StdinAck};

use std::collections::VecDeque;

use serde::Serialize;
use tokio::sync::{mpsc, watch};

use crate::config::Config;
use crate::error::{AuthError, Result};
use crate::protocol::{
    Action, Credentials, GameEntry, HwidResult, Input, LoginResult, Session, SessionConfig,
    SessionId, SessionState, SessionStats,
};
use crate::transport::{Transport, TransportEvent};

/// Final account of a finished session
#[derive(Debug, Serialize)]
pub struct SessionReport {
    /// State the session ended in
    pub state: SessionState,
    /// Token the authority assigned, if any
    pub session_id: Option<SessionId>,
    /// Device check verdict
    pub hwid_result: HwidResult,
    /// Login verdict
    pub login_result: LoginResult,
    /// Authorized games, in response order
    pub games: Vec<GameEntry>,
    /// Why the session failed, if it did
    #[serde(serialize_with = "serialize_failure")]
    pub failure: Option<AuthError>,
    /// Counters
    pub stats: SessionStats,
}

impl SessionReport {
    /// Whether the login went through
    pub fn is_success(&self) -> bool {
        self.login_result == LoginResult::Success && self.failure.is_none()
    }
}

fn serialize_failure<S>(failure: &Option<AuthError>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match failure {
        Some(err) => serializer.serialize_some(&err.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Session driver
pub struct Client {
    session: Session,
    credentials: Credentials,
    state_tx: watch::Sender<SessionState>,
    torn_down: bool,
}

impl Client {
    /// Create a driver for a fresh session
    pub fn new(config: SessionConfig, credentials: Credentials) -> Self {
        let session = Session::new(config);
        let (state_tx, _) = watch::channel(session.state());
        Self {
            session,
            credentials,
            state_tx,
            torn_down: false,
        }
    }

    /// Create a driver from loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.session_config(), config.credentials())
    }

    /// Receive every committed state change
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// The session being driven
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Drive the session until it reaches `Shutdown`.
    ///
    /// The transport is torn down exactly once, either when the session asks
    /// for it or on the way out.
    pub async fn run<T, A>(
        mut self,
        transport: &mut T,
        mut events: mpsc::Receiver<TransportEvent>,
        ack: &mut A,
    ) -> Result<SessionReport>
    where
        T: Transport + ?Sized,
        A: Acknowledge + ?Sized,
    {
        tracing::debug!("Driving session over {}", transport.name());

        loop {
            match self.session.state() {
                SessionState::Connected => {
                    tracing::info!("Ready for authentication");
                    let input = Input::SubmitCredentials(self.credentials.clone());
                    self.step(transport, input).await;
                    continue;
                },
                state @ (SessionState::LoggedIn | SessionState::Error) => {
                    if let Err(e) = ack.wait(state).await {
                        tracing::warn!("Acknowledgment failed, exiting anyway: {}", e);
                    }
                    self.step(transport, Input::Acknowledged).await;
                    continue;
                },
                SessionState::Shutdown => break,
                _ => {},
            }

            let input = match events.recv().await {
                Some(event) => Input::from(event),
                None => Input::Closed,
            };
            self.step(transport, input).await;
        }

        if !self.torn_down {
            transport.shutdown().await;
            self.torn_down = true;
        }

        Ok(self.into_report())
    }

    async fn step<T>(&mut self, transport: &mut T, input: Input)
    where
        T: Transport + ?Sized,
    {
        let mut pending: VecDeque<Action> = self.session.handle(input).into();

        while let Some(action) = pending.pop_front() {
            match action {
                Action::Send(packet) => {
                    let feedback = match transport.send(&packet).await {
                        Ok(written) if written > 0 => Input::SendCompleted(packet.kind),
                        Ok(_) => Input::SendFailed {
                            kind: packet.kind,
                            reason: "no bytes written".to_string(),
                        },
                        Err(e) => Input::SendFailed {
                            kind: packet.kind,
                            reason: e.to_string(),
                        },
                    };
                    pending.extend(self.session.handle(feedback));
                },
                Action::Teardown => {
                    if !self.torn_down {
                        transport.shutdown().await;
                        self.torn_down = true;
                    }
                },
            }
        }

        let state = self.session.state();
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    fn into_report(mut self) -> SessionReport {
        let failure = self.session.take_failure();
        SessionReport {
            state: self.session.state(),
            session_id: self.session.session_id().cloned(),
            hwid_result: self.session.hwid_result(),
            login_result: self.session.login_result(),
            games: self.session.catalog().as_slice().to_vec(),
            failure,
            stats: self.session.stats(),
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("session", &self.session)
            .field("torn_down", &self.torn_down)
            .finish()
    }
}
