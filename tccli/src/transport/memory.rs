//! In-process transport for testing.
//!
//! Each [`MemoryConnector::connect`] creates a [`tokio::io::duplex`] pipe,
//! returns the client end and hands the server end to whoever holds the
//! [`MemoryListener`] created alongside the connector.

use tokio::io::DuplexStream;
use tokio::sync::mpsc;

use super::{Connector, TransportError};

/// Capacity of each direction of the in-memory pipe.
const PIPE_CAPACITY: usize = 64 * 1024;

/// Connector that produces in-memory duplex streams.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    accept_tx: mpsc::UnboundedSender<MemoryConnection>,
}

/// Server side of a [`MemoryConnector`].
#[derive(Debug)]
pub struct MemoryListener {
    accept_rx: mpsc::UnboundedReceiver<MemoryConnection>,
}

/// One accepted in-memory connection.
#[derive(Debug)]
pub struct MemoryConnection {
    /// Host the client asked for.
    pub host: String,
    /// Port the client asked for.
    pub port: u16,
    /// Server end of the pipe.
    pub stream: DuplexStream,
}

impl MemoryConnector {
    /// Create a connected connector/listener pair.
    #[must_use]
    pub fn new() -> (Self, MemoryListener) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        (Self { accept_tx }, MemoryListener { accept_rx })
    }
}

impl MemoryListener {
    /// Wait for the next client connection. Returns `None` once every
    /// connector has been dropped.
    pub async fn accept(&mut self) -> Option<MemoryConnection> {
        self.accept_rx.recv().await
    }
}

impl Connector for MemoryConnector {
    type Stream = DuplexStream;

    async fn connect(&self, host: &str, port: u16) -> Result<Self::Stream, TransportError> {
        let (client, server) = tokio::io::duplex(PIPE_CAPACITY);
        self.accept_tx
            .send(MemoryConnection {
                host: host.to_owned(),
                port,
                stream: server,
            })
            .map_err(|_| {
                TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "memory listener dropped",
                ))
            })?;
        Ok(client)
    }
}
