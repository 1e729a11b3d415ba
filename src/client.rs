//! HTTP client with builder pattern.
//!
//! A [`Client`] owns the interceptor chain, a [`Dispatcher`] and a
//! [`ConnectionPool`]. Clones share all three; build separate clients for
//! isolated state.
//!
//! # Example
//!
//! ```rust,no_run
//! use relaynet::Client;
//!
//! # async fn run() -> Result<(), relaynet::base::neterror::NetError> {
//! let client = Client::builder().retries(1).user_agent("relaynet").build();
//!
//! let resp = client.get("http://example.com/").send().await?;
//! println!("{} {}", resp.code(), resp.text());
//! # Ok(())
//! # }
//! ```

use crate::base::neterror::NetError;
use crate::call::{Call, Callback};
use crate::config::ClientConfig;
use crate::dispatcher::Dispatcher;
use crate::dns::{GaiResolver, Resolve};
use crate::http::authcache::Authenticator;
use crate::http::codec::HttpCodec;
use crate::http::request::{Request, RequestBuilder};
use crate::http::requestbody::{FormBody, RequestBody};
use crate::http::response::Response;
use crate::http::retry::RetryConfig;
use crate::interceptor::{
    CallServerInterceptor, ConnectInterceptor, HeadersInterceptor, Interceptor,
    RetryAndFollowUpInterceptor,
};
use crate::socket::connectjob::{ChannelFactory, ConnectJob, TcpChannelFactory};
use crate::socket::pool::ConnectionPool;
use crate::socket::tls::{TlsChannelFactory, TlsConfig};
use http::Method;
use std::sync::Arc;
use std::time::Duration;

struct ClientInner {
    config: ClientConfig,
    dispatcher: Dispatcher,
    pool: ConnectionPool,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

/// HTTP client for making requests.
///
/// Use [`Client::builder()`] to configure and create a client.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("dispatcher", &self.inner.dispatcher)
            .field("pool", &self.inner.pool)
            .field("interceptors", &self.inner.interceptors.len())
            .finish()
    }
}

impl Client {
    /// Create a new client with default settings.
    pub fn new() -> Self {
        ClientBuilder::default().build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Prepares `request` for execution. Nothing is sent until the call
    /// is enqueued or executed.
    pub fn new_call(&self, request: Request) -> Call {
        Call::new(self.clone(), request)
    }

    /// Runs `request` to completion.
    pub async fn execute(&self, request: Request) -> Result<Response, NetError> {
        self.new_call(request).execute().await
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn connection_pool(&self) -> &ConnectionPool {
        &self.inner.pool
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub(crate) fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.inner.interceptors
    }

    /// Fails queued calls, cancels running ones and closes idle
    /// connections.
    pub fn shutdown(&self) {
        self.inner.dispatcher.shutdown();
        self.inner.pool.evict_all();
    }

    /// Start building a GET request.
    pub fn get<U: AsRef<str>>(&self, url: U) -> ClientRequest {
        self.request(Method::GET, url)
    }

    /// Start building a POST request.
    pub fn post<U: AsRef<str>>(&self, url: U) -> ClientRequest {
        self.request(Method::POST, url)
    }

    /// Start building a PUT request.
    pub fn put<U: AsRef<str>>(&self, url: U) -> ClientRequest {
        self.request(Method::PUT, url)
    }

    /// Start building a DELETE request.
    pub fn delete<U: AsRef<str>>(&self, url: U) -> ClientRequest {
        self.request(Method::DELETE, url)
    }

    /// Start building a HEAD request.
    pub fn head<U: AsRef<str>>(&self, url: U) -> ClientRequest {
        self.request(Method::HEAD, url)
    }

    /// Start building a PATCH request.
    pub fn patch<U: AsRef<str>>(&self, url: U) -> ClientRequest {
        self.request(Method::PATCH, url)
    }

    /// Start building a request with custom method.
    pub fn request<U: AsRef<str>>(&self, method: Method, url: U) -> ClientRequest {
        ClientRequest {
            client: self.clone(),
            builder: Request::builder().url(url.as_ref()).method(method),
        }
    }
}

/// Builder for creating a [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    dispatcher: Option<Dispatcher>,
    pool: Option<ConnectionPool>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    network_interceptors: Vec<Arc<dyn Interceptor>>,
    resolver: Option<Arc<dyn Resolve>>,
    plain: Option<Arc<dyn ChannelFactory>>,
    secure: Option<Arc<dyn ChannelFactory>>,
    tls: TlsConfig,
    authenticator: Option<Arc<dyn Authenticator>>,
}

impl ClientBuilder {
    /// Replace the whole configuration. Later setters still apply.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Extra attempts after a recoverable failure (default 3).
    pub fn retries(mut self, retries: usize) -> Self {
        self.config.retry.retries = retries;
        self
    }

    pub fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Share a dispatcher between clients. Its limits are left as they are.
    pub fn dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Share a connection pool between clients.
    pub fn connection_pool(mut self, pool: ConnectionPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Runs before retries and follow-ups, once per call.
    pub fn add_interceptor<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Runs once per network exchange, with the connection bound.
    pub fn add_network_interceptor<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.network_interceptors.push(Arc::new(interceptor));
        self
    }

    /// Name resolution for the default TCP channel factory.
    pub fn resolver(mut self, resolver: Arc<dyn Resolve>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Replaces DNS + TCP entirely for `http` URLs.
    pub fn plain_channel_factory(mut self, factory: Arc<dyn ChannelFactory>) -> Self {
        self.plain = Some(factory);
        self
    }

    /// Replaces DNS + TCP + TLS entirely for `https` URLs.
    pub fn secure_channel_factory(mut self, factory: Arc<dyn ChannelFactory>) -> Self {
        self.secure = Some(factory);
        self
    }

    pub fn tls_config(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }

    /// Answers `401` challenges.
    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout_ms = Some(saturating_millis(timeout));
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout_ms = Some(saturating_millis(timeout));
        self
    }

    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.config.follow_redirects = follow;
        self
    }

    pub fn follow_ssl_redirects(mut self, follow: bool) -> Self {
        self.config.follow_ssl_redirects = follow;
        self
    }

    pub fn retry_on_connection_failure(mut self, retry: bool) -> Self {
        self.config.retry_on_connection_failure = retry;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    pub fn max_requests(mut self, max: usize) -> Self {
        self.config.max_requests = max;
        self
    }

    pub fn max_requests_per_host(mut self, max: usize) -> Self {
        self.config.max_requests_per_host = max;
        self
    }

    /// Idle lifetime of pooled connections (default 60s).
    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.config.keep_alive_ms = saturating_millis(keep_alive);
        self
    }

    /// Build the client.
    pub fn build(self) -> Client {
        let config = self.config;
        let dispatcher = self.dispatcher.unwrap_or_else(|| {
            Dispatcher::with_limits(config.max_requests, config.max_requests_per_host)
        });
        let pool = self
            .pool
            .unwrap_or_else(|| ConnectionPool::new(config.keep_alive()));

        let plain = self.plain.unwrap_or_else(|| {
            let resolver = self
                .resolver
                .unwrap_or_else(|| Arc::new(GaiResolver::new()));
            Arc::new(TcpChannelFactory::new(resolver).with_connect_timeout(config.connect_timeout()))
        });
        let secure = self
            .secure
            .unwrap_or_else(|| Arc::new(TlsChannelFactory::new(plain.clone(), self.tls)));
        let job = ConnectJob::new(plain, secure);

        let mut interceptors = self.interceptors;
        interceptors.push(Arc::new(RetryAndFollowUpInterceptor::new(
            config.retry.clone(),
            config.follow_up_policy(),
            self.authenticator,
        )));
        interceptors.push(Arc::new(HeadersInterceptor::new(config.user_agent.clone())));
        interceptors.push(Arc::new(ConnectInterceptor::new(pool.clone())));
        interceptors.extend(self.network_interceptors);
        interceptors.push(Arc::new(CallServerInterceptor::new(
            job,
            HttpCodec::new(),
            config.read_timeout(),
        )));

        Client {
            inner: Arc::new(ClientInner {
                config,
                dispatcher,
                pool,
                interceptors,
            }),
        }
    }
}

/// Builder for a single request bound to a client.
pub struct ClientRequest {
    client: Client,
    builder: RequestBuilder,
}

impl ClientRequest {
    /// Set a header, replacing any earlier value.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.builder = self.builder.body(body);
        self
    }

    /// `application/x-www-form-urlencoded` body.
    pub fn form(self, form: FormBody) -> Self {
        self.body(form.build())
    }

    /// Set JSON body.
    #[cfg(feature = "json")]
    pub fn json<T: serde::Serialize + ?Sized>(self, json: &T) -> Result<Self, NetError> {
        let body = RequestBody::json(json)?;
        Ok(self.body(body))
    }

    pub fn build(self) -> Result<Request, NetError> {
        self.builder.build()
    }

    /// Build the request and wrap it in a call.
    pub fn call(self) -> Result<Call, NetError> {
        let client = self.client.clone();
        Ok(client.new_call(self.build()?))
    }

    /// Run the call in the background; `callback` receives the outcome.
    pub fn enqueue<C: Callback>(self, callback: C) -> Result<Call, NetError> {
        let call = self.call()?;
        call.enqueue(callback)?;
        Ok(call)
    }

    /// Send the request.
    pub async fn send(self) -> Result<Response, NetError> {
        self.call()?.execute().await
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
