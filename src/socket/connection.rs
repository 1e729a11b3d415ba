//! A single HTTP/1.1 connection to one host and port.
//!
//! Lifecycle: `Unopened -> Open -> Closed`. Closed is terminal; a closed
//! connection is never reopened or returned to the pool.

use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::http::codec::HttpCodec;
use crate::http::request::Request;
use crate::http::url::HttpUrl;
use crate::socket::connectjob::ConnectJob;
use crate::socket::stream::{BoxedSocket, StreamSocket};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::time::Instant;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unopened,
    Open,
    Closed,
}

/// Owned by exactly one exchange or by the pool at any time.
#[derive(Debug)]
pub struct Connection {
    id: u64,
    host: String,
    port: u16,
    secure: bool,
    channel: Option<BufReader<BoxedSocket>>,
    state: ConnectionState,
    last_used: Instant,
}

impl Connection {
    pub fn new(host: impl Into<String>, port: u16, secure: bool) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            host: host.into(),
            port,
            secure,
            channel: None,
            state: ConnectionState::Unopened,
            last_used: Instant::now(),
        }
    }

    pub fn for_url(url: &HttpUrl) -> Self {
        Self::new(url.host(), url.port(), url.is_https())
    }

    /// Wraps an already connected channel.
    pub fn with_channel(host: impl Into<String>, port: u16, secure: bool, socket: BoxedSocket) -> Self {
        let mut conn = Self::new(host, port, secure);
        conn.channel = Some(BufReader::new(socket));
        conn.state = ConnectionState::Open;
        conn
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn is_closed(&self) -> bool {
        self.state == ConnectionState::Closed
    }

    pub fn same_address(&self, host: &str, port: u16) -> bool {
        self.port == port && self.host.eq_ignore_ascii_case(host)
    }

    /// Same endpoint and same transport security as `url`.
    pub fn matches(&self, url: &HttpUrl) -> bool {
        self.secure == url.is_https() && self.same_address(url.host(), url.port())
    }

    /// Opens the channel if needed. No-op when already open.
    pub async fn open(&mut self, job: &ConnectJob) -> Result<(), NetError> {
        match self.state {
            ConnectionState::Open => Ok(()),
            ConnectionState::Closed => Err(NetError::ConnectionClosed),
            ConnectionState::Unopened => {
                let socket = job.connect(&self.host, self.port, self.secure).await?;
                tracing::debug!(id = self.id, host = %self.host, port = self.port, secure = self.secure, "connection opened");
                self.channel = Some(BufReader::new(socket));
                self.state = ConnectionState::Open;
                self.last_used = Instant::now();
                Ok(())
            }
        }
    }

    /// Writes `request` and returns the buffered channel to read the
    /// response from.
    pub async fn send(
        &mut self,
        job: &ConnectJob,
        codec: &HttpCodec,
        request: &Request,
    ) -> Result<&mut BufReader<BoxedSocket>, NetError> {
        self.open(job).await?;
        let bytes = codec.encode_request(request);
        let channel = self.channel.as_mut().ok_or(NetError::SocketNotConnected)?;
        channel.write_all(&bytes).await.io_context()?;
        channel.flush().await.io_context()?;
        Ok(channel)
    }

    /// Drops the channel. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.state != ConnectionState::Closed {
            tracing::debug!(id = self.id, host = %self.host, port = self.port, "connection closed");
        }
        self.channel = None;
        self.state = ConnectionState::Closed;
    }

    pub fn touch(&mut self) {
        self.last_used = Instant::now();
    }

    pub fn last_used(&self) -> Instant {
        self.last_used
    }

    pub fn idle_duration(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_used)
    }

    /// Open, nothing buffered, and the peer has neither closed nor sent
    /// unsolicited bytes.
    pub fn is_healthy(&self) -> bool {
        match (&self.state, &self.channel) {
            (ConnectionState::Open, Some(channel)) => {
                channel.buffer().is_empty() && channel.get_ref().is_connected_and_idle()
            }
            _ => false,
        }
    }
}
