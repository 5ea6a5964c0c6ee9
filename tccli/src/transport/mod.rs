//! Stream transport for the chat connection.
//!
//! A [`Connector`] opens a byte stream to `host:port`; [`split`] turns that
//! stream into a [`TransportReader`] for the read loop and a
//! [`TransportWriter`] shared by every sender. Implementations:
//! - [`tls::TlsConnector`] — TCP + TLS trusted by the bundled web PKI roots
//! - [`tcp::TcpConnector`] — plaintext TCP, for local servers
//! - [`memory::MemoryConnector`] — in-process duplex pipes for testing

pub mod memory;
pub mod tcp;
pub mod tls;

use std::future::Future;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

/// Default chat server host.
pub const DEFAULT_HOST: &str = "irc.twitch.tv";

/// Default chat server port (TLS).
pub const DEFAULT_PORT: u16 = 6697;

/// Maximum number of bytes requested by a single [`TransportReader::receive`].
pub const READ_CHUNK_SIZE: usize = 1024;

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An underlying I/O error occurred (resolution, connect, read, write).
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The host cannot be used as a TLS server name.
    #[error("invalid server name {0:?}")]
    InvalidServerName(String),

    /// The TLS client configuration could not be built.
    #[error("TLS configuration error: {0}")]
    Tls(#[from] rustls::Error),
}

/// Opens byte streams to a chat server.
///
/// The returned stream carries protocol text in both directions; the
/// connector decides whether it is encrypted.
pub trait Connector: Send + Sync + 'static {
    /// Stream type produced by this connector.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Resolve `host`, connect to `port` and complete any transport-level
    /// handshake.
    fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> impl Future<Output = Result<Self::Stream, TransportError>> + Send;
}

/// Split an open stream into its read and write sides.
pub fn split<S>(stream: S) -> (TransportReader<S>, TransportWriter<S>)
where
    S: AsyncRead + AsyncWrite,
{
    let (read, write) = tokio::io::split(stream);
    (
        TransportReader { inner: read },
        TransportWriter { inner: write },
    )
}

/// Read side of a connection. Owned by the session's read loop.
pub struct TransportReader<S> {
    inner: ReadHalf<S>,
}

impl<S: AsyncRead> TransportReader<S> {
    /// Perform one read into `buf`.
    ///
    /// Returns the number of bytes read; `0` means the peer closed the
    /// stream. Cancel-safe.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if the read fails.
    pub async fn receive(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        Ok(self.inner.read(buf).await?)
    }
}

/// Write side of a connection.
pub struct TransportWriter<S> {
    inner: WriteHalf<S>,
}

impl<S: AsyncWrite> TransportWriter<S> {
    /// Write every byte of `bytes`, retrying partial writes, then flush.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] on the first failed write.
    pub async fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.inner.write_all(bytes).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Orderly shutdown of the write direction (TLS `close_notify`, then FIN).
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if the shutdown fails.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
