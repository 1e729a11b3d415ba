//! Follow-up requests: what to send after a redirect, an auth challenge, or
//! a retryable status.
//!
//! [`follow_up_request`] is a pure decision over the request that was sent
//! and the response that came back. The retry interceptor owns the loop and
//! the follow-up counter.

use crate::base::neterror::NetError;
use crate::http::authcache::Authenticator;
use crate::http::request::Request;
use crate::http::response::Response;
use http::{Method, StatusCode};

/// Follow-ups allowed per call before failing with `TooManyRedirects`.
pub const MAX_FOLLOW_UPS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowUpPolicy {
    pub follow_redirects: bool,
    /// Follow redirects that switch between `http` and `https`.
    pub follow_ssl_redirects: bool,
    /// Repeat requests answered with `408 Request Timeout`.
    pub retry_on_connection_failure: bool,
}

impl Default for FollowUpPolicy {
    fn default() -> Self {
        Self {
            follow_redirects: true,
            follow_ssl_redirects: true,
            retry_on_connection_failure: true,
        }
    }
}

/// Decides the next request after `response`, or `None` when `response` is
/// final.
///
/// | status | action |
/// |---|---|
/// | 300-303, 307, 308 | redirect to `Location` (see [`redirect`]) |
/// | 401 | ask the authenticator |
/// | 407 | `UnexpectedProxyAuth` |
/// | 408 | repeat, unless the last response was also 408 or `Retry-After` > 0 |
/// | 503 | repeat only on `Retry-After: 0`, and not twice in a row |
pub fn follow_up_request(
    request: &Request,
    response: &Response,
    policy: &FollowUpPolicy,
    authenticator: Option<&dyn Authenticator>,
) -> Result<Option<Request>, NetError> {
    let status = response.status();
    match status {
        StatusCode::PROXY_AUTHENTICATION_REQUIRED => Err(NetError::UnexpectedProxyAuth),
        StatusCode::UNAUTHORIZED => Ok(authenticator.and_then(|a| a.authenticate(request, response))),
        StatusCode::MULTIPLE_CHOICES
        | StatusCode::MOVED_PERMANENTLY
        | StatusCode::FOUND
        | StatusCode::SEE_OTHER
        | StatusCode::TEMPORARY_REDIRECT
        | StatusCode::PERMANENT_REDIRECT => redirect(request, response, policy),
        StatusCode::REQUEST_TIMEOUT => {
            if !policy.retry_on_connection_failure {
                return Ok(None);
            }
            if prior_status(response) == Some(StatusCode::REQUEST_TIMEOUT) {
                return Ok(None);
            }
            if retry_after(response, 0) > 0 {
                return Ok(None);
            }
            Ok(Some(request.clone()))
        }
        StatusCode::SERVICE_UNAVAILABLE => {
            if prior_status(response) == Some(StatusCode::SERVICE_UNAVAILABLE) {
                return Ok(None);
            }
            if retry_after(response, u64::MAX) == 0 {
                return Ok(Some(request.clone()));
            }
            Ok(None)
        }
        _ => Ok(None),
    }
}

/// Builds the redirected request.
///
/// The method is kept except for 303 (to GET) and 302 answering a method
/// other than GET/HEAD (to GET); a method change drops the body and its
/// headers. `Authorization` is never forwarded to a different host and
/// port.
pub fn redirect(
    request: &Request,
    response: &Response,
    policy: &FollowUpPolicy,
) -> Result<Option<Request>, NetError> {
    if !policy.follow_redirects {
        return Ok(None);
    }
    let Some(location) = response.header("Location") else {
        return Ok(None);
    };
    let Some(target) = request.url().resolve(location) else {
        tracing::debug!(location, "redirect target unsupported");
        return Ok(None);
    };
    if target.scheme() != request.url().scheme() && !policy.follow_ssl_redirects {
        return Ok(None);
    }

    let method = request.method();
    let to_get = match response.status() {
        StatusCode::SEE_OTHER => *method != Method::HEAD && *method != Method::GET,
        StatusCode::FOUND => *method != Method::GET && *method != Method::HEAD,
        _ => false,
    };

    let mut builder = request.new_builder();
    if to_get {
        builder = builder
            .get()
            .remove_header("Transfer-Encoding")
            .remove_header("Content-Length")
            .remove_header("Content-Type");
    }
    if !request.url().same_endpoint(&target) {
        builder = builder.remove_header("Authorization").remove_header("Host");
    }

    tracing::debug!(from = %request.url(), to = %target, status = response.code(), "following redirect");
    builder.http_url(target).build().map(Some)
}

fn prior_status(response: &Response) -> Option<StatusCode> {
    response.prior_response().map(Response::status)
}

/// Seconds from `Retry-After`. Absent → `default`; a non-integer value
/// (an HTTP date) counts as "not soon".
fn retry_after(response: &Response, default: u64) -> u64 {
    match response.header("Retry-After") {
        None => default,
        Some(v) => v.trim().parse().unwrap_or(u64::MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::authcache::{AuthCache, AuthEntry};

    fn response(status: u16) -> crate::http::response::ResponseBuilder {
        Response::builder().status(StatusCode::from_u16(status).unwrap())
    }

    fn post() -> Request {
        Request::builder()
            .url("http://a.test/form")
            .post("x=1")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Authorization", "Basic abc")
            .build()
            .unwrap()
    }

    fn decide(request: &Request, response: &Response) -> Option<Request> {
        follow_up_request(request, response, &FollowUpPolicy::default(), None).unwrap()
    }

    #[test]
    fn test_303_downgrades_to_get() {
        let next = decide(&post(), &response(303).header("Location", "/done").build()).unwrap();
        assert_eq!(next.method(), &Method::GET);
        assert!(next.body().is_none());
        assert_eq!(next.header("Content-Type"), None);
        assert_eq!(next.url().to_string(), "http://a.test/done");
        // Same host keeps credentials.
        assert_eq!(next.header("Authorization"), Some("Basic abc"));
    }

    #[test]
    fn test_302_on_post_downgrades_but_get_stays() {
        let next = decide(&post(), &response(302).header("Location", "/x").build()).unwrap();
        assert_eq!(next.method(), &Method::GET);

        let head = Request::builder()
            .url("http://a.test/")
            .method(Method::HEAD)
            .build()
            .unwrap();
        let next = decide(&head, &response(302).header("Location", "/x").build()).unwrap();
        assert_eq!(next.method(), &Method::HEAD);
    }

    #[test]
    fn test_307_308_and_301_preserve_method_and_body() {
        for status in [301, 307, 308] {
            let next = decide(&post(), &response(status).header("Location", "/again").build())
                .unwrap();
            assert_eq!(next.method(), &Method::POST, "status {status}");
            assert_eq!(next.body().unwrap().content().as_ref(), b"x=1");
        }
    }

    #[test]
    fn test_cross_host_strips_authorization() {
        let next = decide(
            &post(),
            &response(307).header("Location", "http://b.test/form").build(),
        )
        .unwrap();
        assert_eq!(next.header("Authorization"), None);
        assert_eq!(next.url().host(), "b.test");
    }

    #[test]
    fn test_redirect_without_location_is_final() {
        assert!(decide(&post(), &response(302).build()).is_none());
    }

    #[test]
    fn test_unsupported_location_is_final() {
        assert!(decide(&post(), &response(302).header("Location", "ftp://x/").build()).is_none());
    }

    #[test]
    fn test_scheme_change_respects_policy() {
        let request = Request::get("http://a.test/").unwrap();
        let moved = response(301).header("Location", "https://a.test/").build();
        let strict = FollowUpPolicy {
            follow_ssl_redirects: false,
            ..Default::default()
        };
        assert!(follow_up_request(&request, &moved, &strict, None)
            .unwrap()
            .is_none());
        assert!(decide(&request, &moved).is_some());
    }

    #[test]
    fn test_redirects_disabled() {
        let policy = FollowUpPolicy {
            follow_redirects: false,
            ..Default::default()
        };
        let request = Request::get("http://a.test/").unwrap();
        let moved = response(302).header("Location", "/b").build();
        assert!(follow_up_request(&request, &moved, &policy, None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_407_is_protocol_error() {
        let request = Request::get("http://a.test/").unwrap();
        let err = follow_up_request(
            &request,
            &response(407).build(),
            &FollowUpPolicy::default(),
            None,
        )
        .unwrap_err();
        assert_eq!(err, NetError::UnexpectedProxyAuth);
    }

    #[test]
    fn test_401_delegates_to_authenticator() {
        let request = Request::get("http://a.test/").unwrap();
        let challenge = response(401)
            .header("WWW-Authenticate", r#"Basic realm="r""#)
            .build();
        assert!(decide(&request, &challenge).is_none());

        let cache = AuthCache::new();
        cache.store("a.test", 80, AuthEntry::basic("r", "u", "p"));
        let next = follow_up_request(
            &request,
            &challenge,
            &FollowUpPolicy::default(),
            Some(&cache),
        )
        .unwrap()
        .unwrap();
        assert!(next.header("Authorization").is_some());
    }

    #[test]
    fn test_408_retried_once() {
        let request = Request::get("http://a.test/").unwrap();
        let first = response(408).build();
        assert!(decide(&request, &first).is_some());

        let second = response(408).build().with_prior(response(408).build());
        assert!(decide(&request, &second).is_none());

        let later = response(408).header("Retry-After", "5").build();
        assert!(decide(&request, &later).is_none());
    }

    #[test]
    fn test_503_needs_zero_retry_after() {
        let request = Request::get("http://a.test/").unwrap();
        assert!(decide(&request, &response(503).build()).is_none());
        assert!(decide(&request, &response(503).header("Retry-After", "0").build()).is_some());
        assert!(decide(&request, &response(503).header("Retry-After", "1").build()).is_none());

        let repeated = response(503)
            .header("Retry-After", "0")
            .build()
            .with_prior(response(503).build());
        assert!(decide(&request, &repeated).is_none());
    }

    #[test]
    fn test_plain_statuses_are_final() {
        let request = Request::get("http://a.test/").unwrap();
        for status in [200, 204, 404, 500] {
            assert!(decide(&request, &response(status).build()).is_none());
        }
    }
}
