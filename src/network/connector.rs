//! Transport setup: plain TCP or TLS to a network's server.

use crate::config::NetworkConfig;
use crate::error::ConnectError;
use async_trait::async_trait;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{self, ClientConfig, RootCertStore};
use tracing::{debug, warn};

/// Default time allowed for TCP connect plus TLS handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens the byte stream a session runs over.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    async fn connect(&self, network: &NetworkConfig) -> Result<Self::Stream, ConnectError>;
}

/// A unified stream type for plaintext and TLS connections.
pub enum BotStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl BotStream {
    pub fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl AsyncRead for BotStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            BotStream::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            BotStream::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for BotStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            BotStream::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            BotStream::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            BotStream::Plain(stream) => Pin::new(stream).poll_flush(cx),
            BotStream::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            BotStream::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            BotStream::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Connects over TCP and upgrades to TLS when the network asks for it.
///
/// Server certificates are always verified against the system roots.
pub struct TcpConnector {
    timeout: Duration,
    tls: TlsConnector,
}

impl TcpConnector {
    pub fn new(timeout: Duration) -> Result<Self, ConnectError> {
        let mut roots = RootCertStore::empty();
        let certs = rustls_native_certs::load_native_certs();
        for cert in certs.certs {
            if let Err(e) = roots.add(cert) {
                warn!(error = %e, "Failed to add root cert");
            }
        }
        for e in &certs.errors {
            warn!(error = %e, "Error loading native certs");
        }
        if roots.is_empty() {
            warn!("No system root certificates found; TLS networks will fail to connect");
        }

        let config = ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .map_err(|e| ConnectError::Tls(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();

        Ok(Self {
            timeout,
            tls: TlsConnector::from(Arc::new(config)),
        })
    }

    async fn open(&self, network: &NetworkConfig) -> Result<BotStream, ConnectError> {
        let tcp = TcpStream::connect((network.host.as_str(), network.port)).await?;
        if let Err(e) = tcp.set_nodelay(true) {
            debug!(error = %e, "Failed to set TCP_NODELAY");
        }
        if !network.tls {
            return Ok(BotStream::Plain(tcp));
        }

        let server_name = ServerName::try_from(network.host.clone())
            .map_err(|_| ConnectError::InvalidServerName(network.host.clone()))?;
        let stream = self
            .tls
            .connect(server_name, tcp)
            .await
            .map_err(|e| ConnectError::Tls(e.to_string()))?;
        Ok(BotStream::Tls(Box::new(stream)))
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Stream = BotStream;

    async fn connect(&self, network: &NetworkConfig) -> Result<BotStream, ConnectError> {
        let stream = tokio::time::timeout(self.timeout, self.open(network))
            .await
            .map_err(|_| ConnectError::Timeout)??;
        debug!(
            host = %network.host,
            port = network.port,
            tls = stream.is_tls(),
            "Transport established"
        );
        Ok(stream)
    }
}
