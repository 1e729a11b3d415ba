//! Opening channels: DNS then TCP, optionally wrapped in TLS.
//!
//! The engine never dials sockets itself; it asks a [`ChannelFactory`].
//! [`ConnectJob`] pairs the plain and secure factories and picks one per
//! connection, roughly like Chromium's `ConnectJob`.

use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::dns::{GaiResolver, Name, Resolve};
use crate::socket::stream::BoxedSocket;
use crate::socket::tls::{TlsChannelFactory, TlsConfig};
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

/// Opens a connected channel to `host:port`.
pub trait ChannelFactory: Send + Sync {
    fn open<'a>(&'a self, host: &'a str, port: u16)
        -> BoxFuture<'a, Result<BoxedSocket, NetError>>;
}

impl<F: ChannelFactory + ?Sized> ChannelFactory for Arc<F> {
    fn open<'a>(&'a self, host: &'a str, port: u16) -> BoxFuture<'a, Result<BoxedSocket, NetError>> {
        (**self).open(host, port)
    }
}

/// Resolves the host and connects to each address in turn until one
/// accepts.
pub struct TcpChannelFactory {
    resolver: Arc<dyn Resolve>,
    connect_timeout: Option<Duration>,
}

impl TcpChannelFactory {
    pub fn new(resolver: Arc<dyn Resolve>) -> Self {
        Self {
            resolver,
            connect_timeout: None,
        }
    }

    /// Per-address connect deadline.
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    async fn connect(&self, host: &str, port: u16) -> Result<TcpStream, NetError> {
        let addrs = self.resolver.resolve(Name::new(host)).await?;

        let mut last_error = None;
        for mut addr in addrs {
            addr.set_port(port);
            let attempt = TcpStream::connect(addr);
            let result = match self.connect_timeout {
                Some(limit) => match tokio::time::timeout(limit, attempt).await {
                    Ok(result) => result.connection_context(host, port),
                    Err(_) => Err(NetError::ConnectionTimedOut),
                },
                None => attempt.await.connection_context(host, port),
            };
            match result {
                Ok(stream) => {
                    let _ = stream.set_nodelay(true);
                    tracing::debug!(host, %addr, "tcp connected");
                    return Ok(stream);
                }
                Err(e) => {
                    tracing::debug!(host, %addr, error = %e, "tcp connect failed");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or(NetError::NameNotResolvedFor {
            domain: host.to_string(),
            reason: "no addresses".to_string(),
        }))
    }
}

impl Default for TcpChannelFactory {
    fn default() -> Self {
        Self::new(Arc::new(GaiResolver::new()))
    }
}

impl ChannelFactory for TcpChannelFactory {
    fn open<'a>(&'a self, host: &'a str, port: u16) -> BoxFuture<'a, Result<BoxedSocket, NetError>> {
        Box::pin(async move { self.connect(host, port).await.map(BoxedSocket::new) })
    }
}

impl fmt::Debug for TcpChannelFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpChannelFactory")
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

/// Plain and secure channel factories, selected per connection.
#[derive(Clone)]
pub struct ConnectJob {
    plain: Arc<dyn ChannelFactory>,
    secure: Arc<dyn ChannelFactory>,
}

impl ConnectJob {
    pub fn new(plain: Arc<dyn ChannelFactory>, secure: Arc<dyn ChannelFactory>) -> Self {
        Self { plain, secure }
    }

    /// TCP via `resolver`, with BoringSSL layered on top for secure channels.
    pub fn with_resolver(
        resolver: Arc<dyn Resolve>,
        connect_timeout: Option<Duration>,
        tls: TlsConfig,
    ) -> Self {
        let plain: Arc<dyn ChannelFactory> =
            Arc::new(TcpChannelFactory::new(resolver).with_connect_timeout(connect_timeout));
        let secure = Arc::new(TlsChannelFactory::new(plain.clone(), tls));
        Self { plain, secure }
    }

    pub async fn connect(&self, host: &str, port: u16, secure: bool) -> Result<BoxedSocket, NetError> {
        if secure {
            self.secure.open(host, port).await
        } else {
            self.plain.open(host, port).await
        }
    }
}

impl Default for ConnectJob {
    fn default() -> Self {
        Self::with_resolver(Arc::new(GaiResolver::new()), None, TlsConfig::default())
    }
}

impl fmt::Debug for ConnectJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectJob").finish_non_exhaustive()
    }
}
