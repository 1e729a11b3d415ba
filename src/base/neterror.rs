use std::io;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum NetError {
    // Connection Errors
    #[error("Connection closed (TCP FIN)")]
    ConnectionClosed,
    #[error("Connection reset (TCP RST)")]
    ConnectionReset,
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Connection aborted")]
    ConnectionAborted,
    #[error("Connection failed")]
    ConnectionFailed,
    #[error("Name not resolved")]
    NameNotResolved,
    #[error("Socket not connected")]
    SocketNotConnected,
    #[error("SSL protocol error")]
    SslProtocolError,
    #[error("Connection timed out")]
    ConnectionTimedOut,
    #[error("Connection to {host}:{port} failed: {kind}")]
    ConnectionFailedTo {
        host: String,
        port: u16,
        kind: io::ErrorKind,
    },
    #[error("Could not resolve {domain}: {reason}")]
    NameNotResolvedFor { domain: String, reason: String },
    #[error("I/O error ({kind}): {message}")]
    Io { kind: io::ErrorKind, message: String },

    // Request construction
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Unknown URL scheme")]
    UnknownUrlScheme,
    #[error("Invalid header")]
    InvalidHeader,
    #[error("Method {0} must not have a request body")]
    BodyNotPermitted(String),
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),

    // Wire framing
    #[error("Invalid status line: {0:?}")]
    InvalidStatusLine(String),
    #[error("Malformed header line: {0:?}")]
    MalformedHeaderLine(String),
    #[error("Invalid chunked encoding")]
    InvalidChunkedEncoding,
    #[error("Incomplete chunked encoding")]
    IncompleteChunkedEncoding,
    #[error("Incomplete body: expected {expected} bytes, received {received}")]
    IncompleteBody { expected: u64, received: u64 },
    #[error("Invalid Content-Length")]
    InvalidContentLength,
    #[error("Empty response")]
    EmptyResponse,
    #[error("Response headers truncated")]
    ResponseHeadersTruncated,
    #[error("Response headers too big")]
    ResponseHeadersTooBig,

    // Protocol
    #[error("Too many redirects")]
    TooManyRedirects,
    #[error("Unexpected proxy auth")]
    UnexpectedProxyAuth,

    // Call lifecycle
    #[error("Call already executed")]
    AlreadyExecuted,
    #[error("Canceled")]
    Canceled,
    #[error("Interceptor chain exhausted at step {index} of {len}")]
    ChainExhausted { index: usize, len: usize },
    #[error("Interceptor panicked")]
    InterceptorPanicked,
}

impl NetError {
    /// Chromium-style numeric code (see `net_error_list.h`).
    ///
    /// Variants with no Chromium counterpart use the -900 range.
    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::ConnectionClosed => -100,
            NetError::ConnectionReset => -101,
            NetError::ConnectionRefused => -102,
            NetError::ConnectionAborted => -103,
            NetError::ConnectionFailed => -104,
            NetError::ConnectionFailedTo { .. } => -104,
            NetError::NameNotResolved => -105,
            NetError::NameNotResolvedFor { .. } => -105,
            NetError::SslProtocolError => -107,
            NetError::SocketNotConnected => -112,
            NetError::ConnectionTimedOut => -118,
            NetError::Io { .. } => -2,
            NetError::Canceled => -3,

            NetError::InvalidUrl => -300,
            NetError::UnknownUrlScheme => -302,
            NetError::TooManyRedirects => -310,
            NetError::InvalidStatusLine(_) => -320,
            NetError::MalformedHeaderLine(_) => -320,
            NetError::InvalidChunkedEncoding => -321,
            NetError::UnexpectedProxyAuth => -323,
            NetError::EmptyResponse => -324,
            NetError::ResponseHeadersTooBig => -325,
            NetError::InvalidContentLength => -346,
            NetError::IncompleteBody { .. } => -354,
            NetError::IncompleteChunkedEncoding => -355,
            NetError::ResponseHeadersTruncated => -357,
            NetError::InvalidHeader => -910,
            NetError::BodyNotPermitted(_) => -911,
            NetError::InvalidConfig(_) => -912,

            NetError::AlreadyExecuted => -920,
            NetError::ChainExhausted { .. } => -921,
            NetError::InterceptorPanicked => -922,
        }
    }

    /// Malformed wire data. Fatal to the exchange; the connection must be closed.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            NetError::InvalidStatusLine(_)
                | NetError::MalformedHeaderLine(_)
                | NetError::InvalidChunkedEncoding
                | NetError::IncompleteChunkedEncoding
                | NetError::IncompleteBody { .. }
                | NetError::InvalidContentLength
                | NetError::EmptyResponse
                | NetError::ResponseHeadersTruncated
                | NetError::ResponseHeadersTooBig
        )
    }

    /// Channel-level failure: refused, reset, timed out and friends.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            NetError::ConnectionClosed
                | NetError::ConnectionReset
                | NetError::ConnectionRefused
                | NetError::ConnectionAborted
                | NetError::ConnectionFailed
                | NetError::ConnectionFailedTo { .. }
                | NetError::ConnectionTimedOut
                | NetError::NameNotResolved
                | NetError::NameNotResolvedFor { .. }
                | NetError::SocketNotConnected
                | NetError::Io { .. }
        )
    }

    /// Whether a fresh attempt on a new connection may succeed.
    ///
    /// TLS failures, request construction errors and call lifecycle errors
    /// are never recoverable.
    pub fn is_recoverable(&self) -> bool {
        self.is_connection() || self.is_framing()
    }
}

impl From<io::Error> for NetError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::ConnectionRefused => NetError::ConnectionRefused,
            io::ErrorKind::ConnectionReset => NetError::ConnectionReset,
            io::ErrorKind::ConnectionAborted => NetError::ConnectionAborted,
            io::ErrorKind::NotConnected => NetError::SocketNotConnected,
            io::ErrorKind::BrokenPipe => NetError::ConnectionClosed,
            io::ErrorKind::TimedOut => NetError::ConnectionTimedOut,
            kind => NetError::Io {
                kind,
                message: e.to_string(),
            },
        }
    }
}
