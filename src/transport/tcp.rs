//! TCP transport.
//!
//! Newline-delimited JSON frames over a plain TCP stream. A background task
//! reads frames and forwards them as [`TransportEvent`]s; sends go straight
//! to the write half.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{Transport, TransportEvent, EVENT_CHANNEL_CAPACITY};
use crate::error::{AuthError, Result};
use crate::protocol::Packet;

/// Plain TCP transport
#[derive(Debug)]
pub struct TcpTransport {
    /// Remote address
    peer: SocketAddr,
    writer: Option<OwnedWriteHalf>,
    reader: Option<JoinHandle<()>>,
}

impl TcpTransport {
    /// Connect to `addr` and start the reader task.
    pub async fn connect(addr: SocketAddr) -> Result<(Self, mpsc::Receiver<TransportEvent>)> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| AuthError::Transport(format!("Failed to connect to {}: {}", addr, e)))?;
        Self::from_stream(stream)
    }

    /// Resolve `host` and connect to the first address that accepts.
    pub async fn connect_host(
        host: &str,
        port: u16,
    ) -> Result<(Self, mpsc::Receiver<TransportEvent>)> {
        let stream = TcpStream::connect((host, port)).await.map_err(|e| {
            AuthError::Transport(format!("Failed to connect to {}:{}: {}", host, port, e))
        })?;
        Self::from_stream(stream)
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: TcpStream) -> Result<(Self, mpsc::Receiver<TransportEvent>)> {
        let peer = stream.peer_addr()?;
        stream.set_nodelay(true)?;

        let (read_half, write_half) = stream.into_split();
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let reader = tokio::spawn(read_loop(read_half, tx));

        tracing::debug!("TCP transport connected to {}", peer);

        Ok((
            Self {
                peer,
                writer: Some(write_half),
                reader: Some(reader),
            },
            rx,
        ))
    }

    /// Remote address
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Whether `shutdown` has not been called yet
    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }
}

impl Transport for TcpTransport {
    fn send<'a>(
        &'a mut self,
        packet: &'a Packet,
    ) -> Pin<Box<dyn Future<Output = Result<usize>> + Send + 'a>> {
        Box::pin(async move {
            let peer = self.peer;
            let frame = packet.to_frame()?;
            let writer = self
                .writer
                .as_mut()
                .ok_or_else(|| AuthError::Transport("transport is shut down".to_string()))?;

            writer
                .write_all(frame.as_bytes())
                .await
                .map_err(|e| AuthError::Transport(format!("write to {}: {}", peer, e)))?;
            writer
                .flush()
                .await
                .map_err(|e| AuthError::Transport(format!("flush to {}: {}", peer, e)))?;

            tracing::trace!("Sent {} ({} bytes)", packet.kind, frame.len());
            Ok(frame.len())
        })
    }

    fn shutdown(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            if let Some(mut writer) = self.writer.take() {
                if let Err(e) = writer.shutdown().await {
                    tracing::debug!("Error closing connection to {}: {}", self.peer, e);
                }
                tracing::info!("Disconnected from {}", self.peer);
            }
            if let Some(reader) = self.reader.take() {
                reader.abort();
            }
        })
    }

    fn name(&self) -> &'static str {
        "TCP"
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

async fn read_loop(read_half: OwnedReadHalf, events: mpsc::Sender<TransportEvent>) {
    if events.send(TransportEvent::Connected).await.is_err() {
        return;
    }

    let mut lines = BufReader::new(read_half).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("TCP read failed: {}", e);
                break;
            },
        };

        if line.trim().is_empty() {
            continue;
        }

        let event = match Packet::from_frame(&line) {
            Ok(packet) => TransportEvent::Packet(packet),
            Err(e) => TransportEvent::Malformed(e.to_string()),
        };
        if events.send(event).await.is_err() {
            return;
        }
    }

    let _ = events.send(TransportEvent::Closed).await;
}
