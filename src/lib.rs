//! # relaynet
//!
//! A client-side HTTP/1.1 engine built around an interceptor chain.
//!
//! Every call runs through the same pipeline: user interceptors, retry and
//! follow-up handling, default headers, connection acquisition, network
//! interceptors, and finally the exchange on the wire. Connections are
//! kept alive in a shared pool and asynchronous calls are scheduled by a
//! dispatcher with global and per-host concurrency ceilings.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use relaynet::Client;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = Client::new();
//!     let response = client.get("http://example.com/").send().await.unwrap();
//!     println!("Status: {}", response.status());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error definitions
//! - [`call`] - Single-use calls and completion callbacks
//! - [`client`] - Client and builder
//! - [`config`] - Serializable client configuration
//! - [`dispatcher`] - Concurrency limits for asynchronous calls
//! - [`dns`] - Host name resolution
//! - [`http`] - Requests, responses, and the HTTP/1.1 wire codec
//! - [`interceptor`] - The interceptor chain and its built-in steps
//! - [`socket`] - Connections, TLS, and the connection pool

pub mod base;
pub mod call;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod dns;
pub mod http;
pub mod interceptor;
pub mod socket;

pub use base::neterror::NetError;
pub use call::{Call, Callback};
pub use client::{Client, ClientBuilder, ClientRequest};
pub use config::ClientConfig;
pub use dispatcher::Dispatcher;
pub use crate::http::{Request, RequestBuilder, Response};
pub use interceptor::{Chain, Interceptor};
pub use socket::ConnectionPool;
