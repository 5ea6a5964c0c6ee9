//! Background read loop: framing, keep-alive replies, filtering, dispatch.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;

use tccli_proto::command::Command;
use tccli_proto::framer::LineFramer;
use tccli_proto::line::{LineFilter, LineKind};

use super::handlers::HandlerRegistry;
use super::{SessionError, SharedWriter};
use crate::transport::{READ_CHUNK_SIZE, TransportError, TransportReader};

/// State owned by the read task of one connection.
pub(super) struct ReadLoop<S> {
    pub(super) reader: TransportReader<S>,
    pub(super) framer: LineFramer,
    pub(super) filter: LineFilter,
    pub(super) writer: SharedWriter<S>,
    pub(super) handlers: Arc<HandlerRegistry>,
    /// Flipped to `true` by `disconnect`.
    pub(super) shutdown: watch::Receiver<bool>,
    /// Dropped when the loop ends; observers wait for the channel to close.
    pub(super) closed: watch::Sender<()>,
}

impl<S> ReadLoop<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Run until shutdown, end of stream, a transport error or a framing error.
    ///
    /// Only a framing error is returned; the other endings are the normal
    /// ways for a connection to go away.
    pub(super) async fn run(mut self) -> Result<(), SessionError> {
        let result = self.run_inner().await;
        if let Err(ref e) = result {
            tracing::error!(error = %e, "read loop terminated");
        }
        drop(self.closed);
        result
    }

    async fn run_inner(&mut self) -> Result<(), SessionError> {
        let mut buf = [0u8; READ_CHUNK_SIZE];

        loop {
            // Drain everything already buffered before reading again.
            if let Some(line) = self.framer.next_line()? {
                if let Err(e) = self.process(&line).await {
                    tracing::debug!(error = %e, "keep-alive reply failed, stopping read loop");
                    return Ok(());
                }
                continue;
            }

            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::debug!("read loop shutdown requested");
                    return Ok(());
                }
                received = self.reader.receive(&mut buf) => match received {
                    Ok(0) => {
                        tracing::info!("server closed the connection");
                        return Ok(());
                    }
                    Ok(n) => self.framer.feed(&buf[..n]),
                    Err(e) => {
                        tracing::debug!(error = %e, "receive failed, stopping read loop");
                        return Ok(());
                    }
                },
            }
        }
    }

    async fn process(&mut self, line: &str) -> Result<(), TransportError> {
        match self.filter.classify(line) {
            LineKind::KeepAlive { payload } => {
                let reply = Command::Pong(payload).encode();
                self.writer.lock().await.send(&reply).await?;
                tracing::trace!(payload, "answered keep-alive");
            }
            LineKind::Application => {
                tracing::trace!(line, "dispatching line");
                self.handlers.dispatch(line);
            }
            kind @ (LineKind::Empty | LineKind::Housekeeping | LineKind::SelfEcho) => {
                tracing::trace!(?kind, line, "discarding line");
            }
        }
        Ok(())
    }
}
