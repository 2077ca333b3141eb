//! User acknowledgment of terminal states.

use std::future::Future;
use std::pin::Pin;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::error::Result;
use crate::protocol::SessionState;

/// Waits for the user to acknowledge a terminal state.
pub trait Acknowledge: Send {
    /// Resolve once the user has seen `state`.
    fn wait(&mut self, state: SessionState) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Waits for a line on stdin.
#[derive(Debug, Default)]
pub struct StdinAck;

impl Acknowledge for StdinAck {
    fn wait(&mut self, state: SessionState) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            match state {
                SessionState::Error => tracing::error!("Press Enter to exit"),
                _ => tracing::info!("Press Enter to exit"),
            }
            let mut line = String::new();
            BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
            Ok(())
        })
    }
}

/// Acknowledges immediately.
#[derive(Debug, Default)]
pub struct AutoAck;

impl Acknowledge for AutoAck {
    fn wait(&mut self, _state: SessionState) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }
}
