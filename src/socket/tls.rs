//! TLS channels over BoringSSL.

use crate::base::neterror::NetError;
use crate::socket::connectjob::ChannelFactory;
use crate::socket::stream::BoxedSocket;
use boring::ssl::{SslConnector, SslMethod, SslVerifyMode, SslVersion};
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Client TLS settings. Trust roots come from the system store.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub min_version: Option<SslVersion>,
    pub max_version: Option<SslVersion>,
    /// OpenSSL cipher string; `None` keeps BoringSSL's defaults.
    pub cipher_list: Option<String>,
    pub alpn_protos: Vec<String>,
    /// Verify the peer's certificate chain.
    pub verify_peer: bool,
    /// Check that the certificate matches the host name.
    pub verify_hostname: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            min_version: Some(SslVersion::TLS1_2),
            max_version: Some(SslVersion::TLS1_3),
            cipher_list: None,
            // The engine only speaks HTTP/1.1.
            alpn_protos: vec!["http/1.1".to_string()],
            verify_peer: true,
            verify_hostname: true,
        }
    }
}

impl TlsConfig {
    /// Skips certificate and host name checks. Test servers only.
    pub fn danger_accept_invalid_certs(mut self) -> Self {
        self.verify_peer = false;
        self.verify_hostname = false;
        self
    }

    pub fn build_connector(&self) -> Result<SslConnector, NetError> {
        let mut builder =
            SslConnector::builder(SslMethod::tls()).map_err(|_| NetError::SslProtocolError)?;

        builder
            .set_min_proto_version(self.min_version)
            .map_err(|_| NetError::SslProtocolError)?;
        builder
            .set_max_proto_version(self.max_version)
            .map_err(|_| NetError::SslProtocolError)?;

        if let Some(ciphers) = &self.cipher_list {
            builder
                .set_cipher_list(ciphers)
                .map_err(|_| NetError::SslProtocolError)?;
        }

        if !self.alpn_protos.is_empty() {
            builder
                .set_alpn_protos(&alpn_wire(&self.alpn_protos)?)
                .map_err(|_| NetError::SslProtocolError)?;
        }

        builder.set_verify(if self.verify_peer {
            SslVerifyMode::PEER
        } else {
            SslVerifyMode::NONE
        });

        Ok(builder.build())
    }

    /// SNI must not carry an IP literal (RFC 6066).
    pub fn should_set_sni(host: &str) -> bool {
        host.parse::<std::net::IpAddr>().is_err()
    }
}

/// Length-prefixed ALPN protocol list.
fn alpn_wire(protos: &[String]) -> Result<Vec<u8>, NetError> {
    let mut wire = Vec::new();
    for proto in protos {
        let len = u8::try_from(proto.len()).map_err(|_| NetError::SslProtocolError)?;
        wire.push(len);
        wire.extend_from_slice(proto.as_bytes());
    }
    Ok(wire)
}

/// Performs a TLS handshake over channels opened by `inner`.
///
/// The connector is built on first use and shared afterwards.
pub struct TlsChannelFactory {
    inner: Arc<dyn ChannelFactory>,
    config: TlsConfig,
    connector: OnceCell<SslConnector>,
}

impl TlsChannelFactory {
    pub fn new(inner: Arc<dyn ChannelFactory>, config: TlsConfig) -> Self {
        Self {
            inner,
            config,
            connector: OnceCell::new(),
        }
    }

    async fn handshake(&self, host: &str, port: u16) -> Result<BoxedSocket, NetError> {
        let connector = self
            .connector
            .get_or_try_init(|| async { self.config.build_connector() })
            .await?;

        let transport = self.inner.open(host, port).await?;

        let mut ssl = connector
            .configure()
            .map_err(|_| NetError::SslProtocolError)?;
        ssl.set_use_server_name_indication(TlsConfig::should_set_sni(host));
        ssl.set_verify_hostname(self.config.verify_hostname);

        let stream = tokio_boring::connect(ssl, host, transport)
            .await
            .map_err(|_| {
                tracing::warn!(host, port, "TLS handshake failed");
                NetError::SslProtocolError
            })?;
        tracing::debug!(host, port, "TLS established");
        Ok(BoxedSocket::new(stream))
    }
}

impl ChannelFactory for TlsChannelFactory {
    fn open<'a>(&'a self, host: &'a str, port: u16) -> BoxFuture<'a, Result<BoxedSocket, NetError>> {
        Box::pin(self.handshake(host, port))
    }
}

impl fmt::Debug for TlsChannelFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsChannelFactory")
            .field("config", &self.config)
            .field("initialized", &self.connector.initialized())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sni_skips_ip_literals() {
        assert!(TlsConfig::should_set_sni("example.test"));
        assert!(!TlsConfig::should_set_sni("127.0.0.1"));
        assert!(!TlsConfig::should_set_sni("::1"));
    }

    #[test]
    fn test_alpn_wire_format() {
        let wire = alpn_wire(&["http/1.1".to_string()]).unwrap();
        assert_eq!(wire, b"\x08http/1.1");
        assert!(alpn_wire(&["x".repeat(256)]).is_err());
    }

    #[test]
    fn test_default_connector_builds() {
        assert!(TlsConfig::default().build_connector().is_ok());
        assert!(TlsConfig::default()
            .danger_accept_invalid_certs()
            .build_connector()
            .is_ok());
    }
}
