use crate::base::neterror::NetError;
use crate::http::authcache::Authenticator;
use crate::http::followup::{follow_up_request, FollowUpPolicy, MAX_FOLLOW_UPS};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::retry::{calculate_backoff, RetryConfig, RetryReason};
use crate::interceptor::{Chain, Interceptor};
use futures::future::BoxFuture;
use std::sync::Arc;

/// Retries recoverable failures and follows redirects, auth challenges
/// and retryable statuses.
///
/// Each hop gets up to `retries + 1` attempts; cancellation is checked
/// before every attempt. After a successful attempt the follow-up policy
/// decides whether another request is needed, at most
/// [`MAX_FOLLOW_UPS`] times per call.
pub struct RetryAndFollowUpInterceptor {
    retry: RetryConfig,
    policy: FollowUpPolicy,
    authenticator: Option<Arc<dyn Authenticator>>,
}

impl RetryAndFollowUpInterceptor {
    pub fn new(
        retry: RetryConfig,
        policy: FollowUpPolicy,
        authenticator: Option<Arc<dyn Authenticator>>,
    ) -> Self {
        Self {
            retry,
            policy,
            authenticator,
        }
    }

    fn attempts(&self) -> usize {
        if self.policy.retry_on_connection_failure {
            self.retry.max_attempts()
        } else {
            1
        }
    }

    async fn execute_with_retry(
        &self,
        chain: &mut Chain<'_>,
        request: &Request,
    ) -> Result<Response, NetError> {
        let attempts = self.attempts();
        let mut attempt = 0;
        loop {
            if chain.call().is_canceled() {
                return Err(NetError::Canceled);
            }
            let delay = calculate_backoff(attempt, &self.retry);
            if !delay.is_zero() {
                let call = chain.call();
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = call.canceled() => return Err(NetError::Canceled),
                }
            }

            let error = match chain.proceed(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };
            attempt += 1;
            match RetryReason::from_error(&error) {
                Some(reason) if attempt < attempts => {
                    tracing::warn!(
                        url = %request.url(),
                        attempt,
                        ?reason,
                        error = %error,
                        "request failed, retrying"
                    );
                }
                _ => return Err(error),
            }
        }
    }
}

impl Interceptor for RetryAndFollowUpInterceptor {
    fn intercept<'a>(&'a self, mut chain: Chain<'a>) -> BoxFuture<'a, Result<Response, NetError>> {
        Box::pin(async move {
            let mut request = chain.request().clone();
            let mut prior: Option<Response> = None;
            let mut follow_ups = 0;

            loop {
                let mut response = self.execute_with_retry(&mut chain, &request).await?;
                if let Some(prior) = prior.take() {
                    response = response.with_prior(prior);
                }

                let next = follow_up_request(
                    &request,
                    &response,
                    &self.policy,
                    self.authenticator.as_deref(),
                )?;
                let Some(next) = next else {
                    return Ok(response);
                };

                follow_ups += 1;
                if follow_ups > MAX_FOLLOW_UPS {
                    tracing::debug!(url = %request.url(), follow_ups, "too many follow-ups");
                    return Err(NetError::TooManyRedirects);
                }
                tracing::debug!(status = response.code(), to = %next.url(), "follow-up request");
                request = next;
                prior = Some(response);
            }
        })
    }
}
