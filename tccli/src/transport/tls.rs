//! TLS connector trusted by the bundled Mozilla root store.

use std::sync::Arc;

use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

use super::{Connector, TransportError};

/// Connects over TCP and wraps the stream in TLS.
///
/// Certificates are verified against [`webpki_roots::TLS_SERVER_ROOTS`] with
/// the host name as SNI, using the `ring` crypto provider.
#[derive(Clone)]
pub struct TlsConnector {
    inner: tokio_rustls::TlsConnector,
}

impl TlsConnector {
    /// Build a connector with the bundled trust anchors.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Tls`] if the crypto provider rejects the
    /// default protocol versions.
    pub fn new() -> Result<Self, TransportError> {
        let roots = rustls::RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        let config = rustls::ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();

        Ok(Self {
            inner: tokio_rustls::TlsConnector::from(Arc::new(config)),
        })
    }
}

impl Connector for TlsConnector {
    type Stream = TlsStream<TcpStream>;

    async fn connect(&self, host: &str, port: u16) -> Result<Self::Stream, TransportError> {
        let server_name = ServerName::try_from(host.to_owned())
            .map_err(|_| TransportError::InvalidServerName(host.to_owned()))?;

        let tcp = TcpStream::connect((host, port)).await?;
        tracing::debug!(host, port, "TCP connected, starting TLS handshake");

        let stream = self.inner.connect(server_name, tcp).await?;
        tracing::debug!(host, port, "TLS handshake complete");
        Ok(stream)
    }
}
