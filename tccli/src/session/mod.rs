//! Chat session: handshake, background read loop, serialized sends.
//!
//! A [`Session`] owns at most one connection at a time. [`Session::connect`]
//! opens the transport, writes the four handshake commands and spawns a read
//! task; [`Session::disconnect`] leaves the room, closes the transport and
//! joins that task. Application lines are delivered to the handlers
//! registered with [`Session::add_handler`], in order, on the read task.
//!
//! # Locking
//!
//! - The connection slot is a `parking_lot::Mutex` held only for
//!   check-and-set, never across an `.await`.
//! - The write side of the transport sits behind a `tokio::sync::Mutex`
//!   held across each complete command write, so concurrent senders never
//!   interleave bytes on the wire.

pub mod handlers;
mod reader;

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use tccli_proto::command::Command;
use tccli_proto::framer::{FramingError, LineFramer};
use tccli_proto::line::{DEFAULT_SERVER_NAME, LineFilter};

use crate::transport::tls::TlsConnector;
use crate::transport::{self, Connector, TransportError, TransportWriter};

use self::handlers::HandlerRegistry;
use self::reader::ReadLoop;

/// Write side shared between senders and the read loop's keep-alive replies.
type SharedWriter<S> = Arc<tokio::sync::Mutex<TransportWriter<S>>>;

/// Errors returned by [`Session`] operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The server could not be reached or the TLS handshake failed.
    #[error("failed to connect to {host}:{port}: {source}")]
    ConnectionFailure {
        /// Host that was attempted.
        host: String,
        /// Port that was attempted.
        port: u16,
        /// Underlying transport error.
        source: TransportError,
    },

    /// Reading or writing the established connection failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The operation needs a connection and there is none.
    #[error("session is not connected")]
    NotConnected,

    /// `connect` was called while a connection exists or is being set up.
    #[error("session is already connected")]
    AlreadyConnected,

    /// The server sent bytes that do not form protocol lines.
    #[error("malformed data from server: {0}")]
    Framing(#[from] FramingError),
}

/// Everything needed to join one room.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectParams {
    /// Server host name.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Account name.
    pub user: String,
    /// Credential, including its `oauth:` prefix.
    pub credential: String,
    /// Room to join, including its leading `#`.
    pub room: String,
    /// Name the server uses as the source of its own notices.
    pub server_name: String,
}

impl ConnectParams {
    /// Parameters with the default server name ([`DEFAULT_SERVER_NAME`]).
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        credential: impl Into<String>,
        room: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            credential: credential.into(),
            room: room.into(),
            server_name: DEFAULT_SERVER_NAME.to_owned(),
        }
    }

    /// Override the server name used to recognize server notices.
    #[must_use]
    pub fn with_server_name(mut self, server_name: impl Into<String>) -> Self {
        self.server_name = server_name.into();
        self
    }
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("credential", &"<redacted>")
            .field("room", &self.room)
            .field("server_name", &self.server_name)
            .finish()
    }
}

/// A live connection: the shared writer plus the read task serving it.
struct Connection<S> {
    params: Arc<ConnectParams>,
    writer: SharedWriter<S>,
    shutdown: watch::Sender<bool>,
    closed: watch::Receiver<()>,
    read_task: JoinHandle<Result<(), SessionError>>,
}

impl<S> Connection<S>
where
    S: tokio::io::AsyncWrite,
{
    /// Leave the room, close the transport and wait for the read task.
    ///
    /// Every step runs even if an earlier one failed; the first error wins.
    async fn close(self) -> Result<(), SessionError> {
        let written = {
            let mut writer = self.writer.lock().await;
            let part = writer.send(&Command::Part(&self.params.room).encode()).await;
            let shutdown = writer.close().await;
            part.and(shutdown)
        };

        let _ = self.shutdown.send(true);
        let read_result = match self.read_task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                tracing::debug!(error = %e, "read task cancelled");
                Ok(())
            }
        };

        written?;
        read_result
    }
}

/// Connection slot. `Connecting` reserves the slot while the handshake runs
/// so the guard never has to be held across I/O.
enum Slot<S> {
    Absent,
    Connecting,
    Connected(Connection<S>),
}

impl<S> Slot<S> {
    fn connection(&self) -> Option<&Connection<S>> {
        match self {
            Self::Connected(conn) => Some(conn),
            Self::Absent | Self::Connecting => None,
        }
    }

    fn take_connected(&mut self) -> Option<Connection<S>> {
        if !matches!(self, Self::Connected(_)) {
            return None;
        }
        match std::mem::replace(self, Self::Absent) {
            Self::Connected(conn) => Some(conn),
            Self::Absent | Self::Connecting => None,
        }
    }
}

/// Returns a `Connecting` slot to `Absent` unless the connect succeeded,
/// including when the connect future is dropped part-way.
struct ConnectingGuard<'a, S> {
    slot: &'a Mutex<Slot<S>>,
    armed: bool,
}

impl<S> Drop for ConnectingGuard<'_, S> {
    fn drop(&mut self) {
        if self.armed {
            *self.slot.lock() = Slot::Absent;
        }
    }
}

/// Client session for one chat room at a time.
///
/// # Example
///
/// ```rust,no_run
/// use tccli::session::{ConnectParams, Session};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let session = Session::new()?;
/// session.add_handler(|line| println!("{line}"));
/// session
///     .connect(ConnectParams::new("irc.twitch.tv", 6697, "bob", "oauth:abc", "#room"))
///     .await?;
/// session.send_message("hello").await?;
/// session.disconnect().await?;
/// # Ok(())
/// # }
/// ```
pub struct Session<C: Connector = TlsConnector> {
    connector: C,
    handlers: Arc<HandlerRegistry>,
    slot: Mutex<Slot<C::Stream>>,
}

impl Session<TlsConnector> {
    /// Create a session that connects over TLS with the bundled roots.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Tls`] if the TLS configuration cannot be built.
    pub fn new() -> Result<Self, TransportError> {
        Ok(Self::with_connector(TlsConnector::new()?))
    }
}

impl<C: Connector> Session<C> {
    /// Create a session that opens connections through `connector`.
    pub fn with_connector(connector: C) -> Self {
        Self {
            connector,
            handlers: Arc::new(HandlerRegistry::new()),
            slot: Mutex::new(Slot::Absent),
        }
    }

    /// Register a handler for application lines.
    ///
    /// Handlers run on the read task, in registration order, and receive the
    /// raw line without its terminator. A handler that blocks stalls all
    /// further processing for this session.
    pub fn add_handler<F>(&self, handler: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.handlers.add(handler);
    }

    /// Whether a connection is held by this session.
    ///
    /// Stays `true` after the server hangs up, until
    /// [`disconnect`](Self::disconnect) releases the connection. Use
    /// [`wait_closed`](Self::wait_closed) to learn that the read task has
    /// stopped.
    pub fn is_connected(&self) -> bool {
        self.slot.lock().connection().is_some()
    }

    /// Open the transport, authenticate, join the room and start reading.
    ///
    /// Returns as soon as the handshake commands have been written; server
    /// acknowledgements arrive through the handlers like any other line.
    ///
    /// # Errors
    ///
    /// - [`SessionError::AlreadyConnected`] if a connection exists or another
    ///   `connect` is in progress.
    /// - [`SessionError::ConnectionFailure`] if the server cannot be reached.
    /// - [`SessionError::Transport`] if a handshake command cannot be written.
    ///
    /// On error the session is left without a connection and may be reused.
    pub async fn connect(&self, params: ConnectParams) -> Result<(), SessionError> {
        {
            let mut slot = self.slot.lock();
            if !matches!(*slot, Slot::Absent) {
                return Err(SessionError::AlreadyConnected);
            }
            *slot = Slot::Connecting;
        }
        let mut guard = ConnectingGuard {
            slot: &self.slot,
            armed: true,
        };

        tracing::info!(host = %params.host, port = params.port, room = %params.room, "connecting");
        let stream = self
            .connector
            .connect(&params.host, params.port)
            .await
            .map_err(|source| {
                tracing::warn!(host = %params.host, port = params.port, err = %source, "connect failed");
                SessionError::ConnectionFailure {
                    host: params.host.clone(),
                    port: params.port,
                    source,
                }
            })?;

        let (reader, writer) = transport::split(stream);
        let writer: SharedWriter<C::Stream> = Arc::new(tokio::sync::Mutex::new(writer));
        {
            let mut writer = writer.lock().await;
            for command in [
                Command::Pass(&params.credential),
                Command::Nick(&params.user),
                Command::User {
                    user: &params.user,
                    host: &params.host,
                },
                Command::Join(&params.room),
            ] {
                writer.send(&command.encode()).await?;
            }
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (closed_tx, closed_rx) = watch::channel(());
        let read_loop = ReadLoop {
            reader,
            framer: LineFramer::new(),
            filter: LineFilter::new(&params.user, &params.server_name),
            writer: Arc::clone(&writer),
            handlers: Arc::clone(&self.handlers),
            shutdown: shutdown_rx,
            closed: closed_tx,
        };
        let read_task = tokio::spawn(read_loop.run());

        tracing::info!(user = %params.user, room = %params.room, "handshake sent");
        guard.armed = false;
        *self.slot.lock() = Slot::Connected(Connection {
            params: Arc::new(params),
            writer,
            shutdown: shutdown_tx,
            closed: closed_rx,
            read_task,
        });
        Ok(())
    }

    /// Post `text` to the joined room.
    ///
    /// Concurrent calls are serialized; each message is written in full
    /// before the next one starts.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotConnected`] if there is no connection.
    /// - [`SessionError::Transport`] if the write fails.
    pub async fn send_message(&self, text: &str) -> Result<(), SessionError> {
        let (writer, params) = {
            let slot = self.slot.lock();
            let conn = slot.connection().ok_or(SessionError::NotConnected)?;
            (Arc::clone(&conn.writer), Arc::clone(&conn.params))
        };

        let bytes = Command::Privmsg {
            target: &params.room,
            text,
        }
        .encode();
        writer.lock().await.send(&bytes).await?;
        Ok(())
    }

    /// Leave the room, close the connection and wait for the read task.
    ///
    /// The connection is detached from the session before any I/O, so the
    /// session accepts a new `connect` as soon as this is called. No handler
    /// runs after this returns.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotConnected`] if there is no connection.
    /// - [`SessionError::Transport`] if leaving or closing failed.
    /// - [`SessionError::Framing`] if the read task had stopped on malformed
    ///   data.
    ///
    /// The connection is released in every case.
    ///
    /// # Panics
    ///
    /// Re-raises a panic from a handler that brought down the read task.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        let conn = self
            .slot
            .lock()
            .take_connected()
            .ok_or(SessionError::NotConnected)?;

        tracing::info!(room = %conn.params.room, "disconnecting");
        conn.close().await
    }

    /// Wait until the current connection's read task has stopped.
    ///
    /// Resolves when the server closes the stream, a transport or framing
    /// error ends the read loop, or [`disconnect`](Self::disconnect) runs.
    /// Resolves immediately when there is no connection.
    pub async fn wait_closed(&self) {
        let closed = self.slot.lock().connection().map(|conn| conn.closed.clone());
        if let Some(mut closed) = closed {
            while closed.changed().await.is_ok() {}
        }
    }
}

impl<C: Connector> Drop for Session<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.slot.get_mut().take_connected() {
            tracing::debug!(room = %conn.params.room, "session dropped while connected");
            let _ = conn.shutdown.send(true);
            conn.read_task.abort();
        }
    }
}

impl<C: Connector> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("connected", &self.is_connected())
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}
