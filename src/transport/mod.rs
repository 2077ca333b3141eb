//! Transport layer abstraction.
//!
//! The session never touches sockets. A transport delivers what happens on
//! the wire as [`TransportEvent`]s over an mpsc channel (one subscriber) and
//! exposes a send primitive and an idempotent teardown.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  TransportEvent   ┌──────────────┐   Input    ┌──────────┐
//! │  reader task │ ────────────────> │    Client    │ ─────────> │ Session  │
//! └──────────────┘     (mpsc)        │ (driver loop)│ <───────── │  (FSM)   │
//!        ▲                           └──────┬───────┘   Action   └──────────┘
//!        │ socket                           │ send / shutdown
//!        └──────────────────────────────────┘
//! ```
//!
//! Reconnection and link-health monitoring are out of scope: a closed
//! connection is reported once as [`TransportEvent::Closed`].

mod tcp;

pub use tcp::TcpTransport;

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::protocol::{Input, Packet};

/// Capacity of the event channel between a transport and its subscriber.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Notification from the transport's own execution context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connection established
    Connected,
    /// A packet arrived
    Packet(Packet),
    /// A frame arrived that is not a valid packet envelope
    Malformed(String),
    /// Connection closed by the peer or failed
    Closed,
}

impl From<TransportEvent> for Input {
    fn from(event: TransportEvent) -> Self {
        match event {
            TransportEvent::Connected => Input::Connected,
            TransportEvent::Packet(packet) => Input::Received(packet),
            TransportEvent::Malformed(reason) => Input::Malformed(reason),
            TransportEvent::Closed => Input::Closed,
        }
    }
}

/// Transport trait for pluggable byte-stream backends.
pub trait Transport: Send {
    /// Write one packet. Returns the number of bytes written.
    fn send<'a>(
        &'a mut self,
        packet: &'a Packet,
    ) -> Pin<Box<dyn Future<Output = Result<usize>> + Send + 'a>>;

    /// Tear the connection down. Calling it again is a no-op.
    fn shutdown(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;

    /// Get the transport name for logging.
    fn name(&self) -> &'static str;
}
