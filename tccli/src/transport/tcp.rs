//! Plaintext TCP connector.

use tokio::net::TcpStream;

use super::{Connector, TransportError};

/// Connects over unencrypted TCP.
///
/// Intended for local test servers and development relays; production
/// connections use [`super::tls::TlsConnector`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, host: &str, port: u16) -> Result<Self::Stream, TransportError> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}
