//! Socket abstraction shared by plain, TLS and in-memory channels.
//!
//! Based on Chromium's `StreamSocket` interface, which gives
//! `TcpClientSocket` and `SSLClientSocket` one polymorphic face.

use futures::task::noop_waker_ref;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::net::TcpStream;
use tokio_boring::SslStream;

/// Any bidirectional byte channel the engine can run HTTP/1.1 over.
///
/// Chromium equivalent: `net::StreamSocket`
pub trait StreamSocket: AsyncRead + AsyncWrite + Unpin + Send + 'static {
    /// False once the peer is known to have closed or reset the channel.
    fn is_connected(&self) -> bool {
        true
    }

    /// Connected and with no unread bytes waiting. An idle HTTP/1.1
    /// connection that has data pending is out of sync with its peer.
    ///
    /// Matches Chromium's `IsConnectedAndIdle()`.
    fn is_connected_and_idle(&self) -> bool {
        self.is_connected()
    }
}

/// Zero-timeout peek: `Some(true)` when bytes are waiting, `Some(false)`
/// when nothing is, `None` when the peer closed or the socket errored.
fn probe(stream: &TcpStream) -> Option<bool> {
    let mut cx = Context::from_waker(noop_waker_ref());
    let mut byte = [0u8; 1];
    let mut buf = ReadBuf::new(&mut byte);
    match stream.poll_peek(&mut cx, &mut buf) {
        Poll::Pending => Some(false),
        Poll::Ready(Ok(0)) => None,
        Poll::Ready(Ok(_)) => Some(true),
        Poll::Ready(Err(_)) => None,
    }
}

impl StreamSocket for TcpStream {
    fn is_connected(&self) -> bool {
        probe(self).is_some()
    }

    fn is_connected_and_idle(&self) -> bool {
        probe(self) == Some(false)
    }
}

// Pending bytes under TLS may be session tickets, so only the transport's
// liveness is checked.
impl<S: StreamSocket> StreamSocket for SslStream<S> {
    fn is_connected(&self) -> bool {
        self.get_ref().is_connected()
    }
}

/// In-memory channel, used by tests and embedders.
impl StreamSocket for DuplexStream {}

/// Owned, type-erased [`StreamSocket`].
pub struct BoxedSocket {
    inner: Pin<Box<dyn StreamSocket>>,
}

impl BoxedSocket {
    pub fn new<S: StreamSocket>(socket: S) -> Self {
        Self {
            inner: Box::pin(socket),
        }
    }

    pub fn as_mut(&mut self) -> Pin<&mut dyn StreamSocket> {
        self.inner.as_mut()
    }
}

impl StreamSocket for BoxedSocket {
    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    fn is_connected_and_idle(&self) -> bool {
        self.inner.is_connected_and_idle()
    }
}

impl fmt::Debug for BoxedSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxedSocket")
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl AsyncRead for BoxedSocket {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        self.inner.as_mut().poll_read(cx, buf)
    }
}

impl AsyncWrite for BoxedSocket {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.inner.as_mut().poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        self.inner.as_mut().poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        self.inner.as_mut().poll_shutdown(cx)
    }
}
