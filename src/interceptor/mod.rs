//! The interceptor chain.
//!
//! Every call runs through one immutable list of interceptors. A [`Chain`]
//! is a cursor into that list: an interceptor inspects or rewrites the
//! request, calls [`Chain::proceed`] to hand it to the next step, and may
//! inspect or replace the response on the way back.
//!
//! Order for a client: user interceptors, [`RetryAndFollowUpInterceptor`],
//! [`HeadersInterceptor`], [`ConnectInterceptor`], network interceptors,
//! [`CallServerInterceptor`].

mod callserver;
mod connect;
mod headers;
mod retry;

pub use callserver::CallServerInterceptor;
pub use connect::ConnectInterceptor;
pub use headers::HeadersInterceptor;
pub use retry::RetryAndFollowUpInterceptor;

use crate::base::neterror::NetError;
use crate::call::Call;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::socket::connection::Connection;
use futures::future::BoxFuture;
use std::sync::Arc;

/// One step of request processing.
pub trait Interceptor: Send + Sync {
    fn intercept<'a>(&'a self, chain: Chain<'a>) -> BoxFuture<'a, Result<Response, NetError>>;
}

/// Position in the interceptor list plus the state handed down to the
/// remaining steps.
pub struct Chain<'a> {
    interceptors: &'a [Arc<dyn Interceptor>],
    index: usize,
    call: &'a Call,
    request: Request,
    connection: Option<&'a mut Connection>,
}

impl<'a> Chain<'a> {
    /// Runs `request` through `interceptors` from the first step.
    pub fn run(
        interceptors: &'a [Arc<dyn Interceptor>],
        call: &'a Call,
        request: Request,
    ) -> BoxFuture<'a, Result<Response, NetError>> {
        let Some(first) = interceptors.first() else {
            return Box::pin(async { Err(NetError::ChainExhausted { index: 0, len: 0 }) });
        };
        first.intercept(Chain {
            interceptors,
            index: 0,
            call,
            request,
            connection: None,
        })
    }

    /// The request as handed to this step.
    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn call(&self) -> &'a Call {
        self.call
    }

    /// The connection bound by the connect step, if this step runs after it.
    pub fn connection_mut(&mut self) -> Option<&mut Connection> {
        self.connection.as_deref_mut()
    }

    /// Hands `request` to the next step, keeping any bound connection.
    pub fn proceed(&mut self, request: Request) -> BoxFuture<'_, Result<Response, NetError>> {
        let next = self.index + 1;
        let Some(interceptor) = self.interceptors.get(next) else {
            return exhausted(next, self.interceptors.len());
        };
        interceptor.intercept(Chain {
            interceptors: self.interceptors,
            index: next,
            call: self.call,
            request,
            connection: self.connection.as_deref_mut(),
        })
    }

    /// Hands `request` to the next step with `connection` bound to it.
    pub fn proceed_with_connection<'b>(
        &'b mut self,
        request: Request,
        connection: &'b mut Connection,
    ) -> BoxFuture<'b, Result<Response, NetError>> {
        let next = self.index + 1;
        let Some(interceptor) = self.interceptors.get(next) else {
            return exhausted(next, self.interceptors.len());
        };
        interceptor.intercept(Chain {
            interceptors: self.interceptors,
            index: next,
            call: self.call,
            request,
            connection: Some(connection),
        })
    }
}

fn exhausted<'b>(index: usize, len: usize) -> BoxFuture<'b, Result<Response, NetError>> {
    tracing::error!(index, len, "interceptor chain exhausted");
    Box::pin(async move { Err(NetError::ChainExhausted { index, len }) })
}

impl std::fmt::Debug for Chain<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("index", &self.index)
            .field("len", &self.interceptors.len())
            .field("request", &self.request)
            .field("connection", &self.connection.as_ref().map(|c| c.id()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use std::sync::Mutex;

    struct Record {
        tag: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Interceptor for Record {
        fn intercept<'a>(&'a self, mut chain: Chain<'a>) -> BoxFuture<'a, Result<Response, NetError>> {
            Box::pin(async move {
                self.log.lock().unwrap().push(self.tag);
                let request = chain
                    .request()
                    .new_builder()
                    .header("X-Seen", self.tag)
                    .build()?;
                chain.proceed(request).await
            })
        }
    }

    struct Respond;

    impl Interceptor for Respond {
        fn intercept<'a>(&'a self, chain: Chain<'a>) -> BoxFuture<'a, Result<Response, NetError>> {
            let seen = chain.request().header("X-Seen").unwrap_or_default().to_string();
            Box::pin(async move { Ok(Response::builder().body(seen).build()) })
        }
    }

    fn call() -> Call {
        Client::new().new_call(Request::get("http://a.test/").unwrap())
    }

    #[tokio::test]
    async fn test_runs_in_order_and_passes_request_down() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let interceptors: Vec<Arc<dyn Interceptor>> = vec![
            Arc::new(Record { tag: "first", log: log.clone() }),
            Arc::new(Record { tag: "second", log: log.clone() }),
            Arc::new(Respond),
        ];
        let call = call();
        let response = Chain::run(&interceptors, &call, call.request().clone())
            .await
            .unwrap();
        assert_eq!(response.text(), "second");
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_proceed_past_end() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let interceptors: Vec<Arc<dyn Interceptor>> =
            vec![Arc::new(Record { tag: "only", log })];
        let call = call();
        let err = Chain::run(&interceptors, &call, call.request().clone())
            .await
            .unwrap_err();
        assert_eq!(err, NetError::ChainExhausted { index: 1, len: 1 });

        let err = Chain::run(&[], &call, call.request().clone())
            .await
            .unwrap_err();
        assert_eq!(err, NetError::ChainExhausted { index: 0, len: 0 });
    }
}
