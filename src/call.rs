//! A prepared request that can be executed once.

use crate::base::neterror::NetError;
use crate::client::Client;
use crate::dispatcher::AsyncTask;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::interceptor::Chain;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{oneshot, watch};

/// Receives the outcome of an enqueued call. Exactly one method is
/// invoked, exactly once.
///
/// Any `FnOnce(&Call, Result<Response, NetError>)` closure is a callback.
pub trait Callback: Send + 'static {
    fn on_response(self: Box<Self>, call: &Call, response: Response);
    fn on_failure(self: Box<Self>, call: &Call, error: NetError);
}

impl<F> Callback for F
where
    F: FnOnce(&Call, Result<Response, NetError>) + Send + 'static,
{
    fn on_response(self: Box<Self>, call: &Call, response: Response) {
        (*self)(call, Ok(response))
    }

    fn on_failure(self: Box<Self>, call: &Call, error: NetError) {
        (*self)(call, Err(error))
    }
}

struct CallInner {
    request: Request,
    client: Client,
    executed: Mutex<bool>,
    canceled: watch::Sender<bool>,
}

/// Cheap to clone; clones refer to the same call.
#[derive(Clone)]
pub struct Call {
    inner: Arc<CallInner>,
}

impl std::fmt::Debug for Call {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Call")
            .field("request", &self.inner.request)
            .field("executed", &self.is_executed())
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

impl Call {
    pub(crate) fn new(client: Client, request: Request) -> Self {
        let (canceled, _) = watch::channel(false);
        Self {
            inner: Arc::new(CallInner {
                request,
                client,
                executed: Mutex::new(false),
                canceled,
            }),
        }
    }

    pub fn request(&self) -> &Request {
        &self.inner.request
    }

    pub fn is_executed(&self) -> bool {
        *self.inner.executed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mark_executed(&self) -> Result<(), NetError> {
        let mut executed = self.inner.executed.lock().unwrap_or_else(PoisonError::into_inner);
        if *executed {
            return Err(NetError::AlreadyExecuted);
        }
        *executed = true;
        Ok(())
    }

    /// Cancels the call. Once canceled, the call reports `Canceled` no
    /// matter how far it got.
    pub fn cancel(&self) {
        if !self.inner.canceled.send_replace(true) {
            tracing::debug!(url = %self.inner.request.url(), "call canceled");
        }
    }

    pub fn is_canceled(&self) -> bool {
        *self.inner.canceled.borrow()
    }

    /// Resolves once the call is canceled.
    pub async fn canceled(&self) {
        let mut rx = self.inner.canceled.subscribe();
        let _ = rx.wait_for(|canceled| *canceled).await;
    }

    /// Schedules the call on the client's dispatcher.
    ///
    /// Fails with `AlreadyExecuted` if the call was enqueued or executed
    /// before; `callback` is then dropped without being invoked.
    pub fn enqueue<C: Callback>(&self, callback: C) -> Result<(), NetError> {
        self.mark_executed()?;

        let mut reporter = Reporter {
            call: self.clone(),
            callback: Some(Box::new(callback)),
        };
        let call = self.clone();
        let future = async move {
            let result = AssertUnwindSafe(call.run())
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    tracing::error!(url = %call.request().url(), "interceptor panicked");
                    Err(NetError::InterceptorPanicked)
                });
            reporter.complete(result);
        };

        let canceler = self.clone();
        let task = AsyncTask::new(self.inner.request.url().host(), future)
            .with_canceler(move || canceler.cancel());
        self.inner.client.dispatcher().enqueue(task);
        Ok(())
    }

    /// Enqueues the call and waits for its outcome.
    pub async fn execute(&self) -> Result<Response, NetError> {
        let (tx, rx) = oneshot::channel();
        self.enqueue(move |_: &Call, result: Result<Response, NetError>| {
            let _ = tx.send(result);
        })?;
        rx.await.unwrap_or(Err(NetError::Canceled))
    }

    async fn run(&self) -> Result<Response, NetError> {
        if self.is_canceled() {
            return Err(NetError::Canceled);
        }
        Chain::run(
            self.inner.client.interceptors(),
            self,
            self.inner.request.clone(),
        )
        .await
    }
}

/// Delivers the outcome to the callback, or `Canceled` if the task is
/// dropped before finishing.
struct Reporter {
    call: Call,
    callback: Option<Box<dyn Callback>>,
}

impl Reporter {
    fn complete(&mut self, result: Result<Response, NetError>) {
        let Some(callback) = self.callback.take() else {
            return;
        };
        let result = if self.call.is_canceled() {
            Err(NetError::Canceled)
        } else {
            result
        };
        match result {
            Ok(response) => callback.on_response(&self.call, response),
            Err(error) => callback.on_failure(&self.call, error),
        }
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        self.complete(Err(NetError::Canceled));
    }
}
