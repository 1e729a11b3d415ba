//! Channels and connections, mirroring Chromium's `net/socket/`:
//! - [`stream`]: the `StreamSocket` abstraction over TCP, TLS and in-memory channels
//! - [`connectjob`]: DNS → TCP → TLS channel opening
//! - [`tls`]: BoringSSL client configuration
//! - [`connection`]: one HTTP/1.1 connection and its lifecycle
//! - [`pool`]: idle connections with keep-alive eviction

pub mod connectjob;
pub mod connection;
pub mod pool;
pub mod stream;
pub mod tls;

pub use connectjob::{ChannelFactory, ConnectJob, TcpChannelFactory};
pub use connection::{Connection, ConnectionState};
pub use pool::ConnectionPool;
pub use stream::{BoxedSocket, StreamSocket};
pub use tls::{TlsChannelFactory, TlsConfig};
