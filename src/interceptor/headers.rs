use crate::base::neterror::NetError;
use crate::http::response::Response;
use crate::interceptor::{Chain, Interceptor};
use futures::future::BoxFuture;
use http::Method;

/// Fills in the headers HTTP/1.1 needs that callers usually omit.
///
/// Caller-supplied values win, except `Content-Length`, which always
/// matches the body.
#[derive(Debug, Default)]
pub struct HeadersInterceptor {
    user_agent: Option<String>,
}

impl HeadersInterceptor {
    pub fn new(user_agent: Option<String>) -> Self {
        Self { user_agent }
    }
}

impl Interceptor for HeadersInterceptor {
    fn intercept<'a>(&'a self, mut chain: Chain<'a>) -> BoxFuture<'a, Result<Response, NetError>> {
        Box::pin(async move {
            let original = chain.request();
            let mut headers = original.headers().clone();

            headers.insert_if_absent("Host", original.url().host_header());
            headers.insert_if_absent("Connection", "Keep-Alive");

            match original.body() {
                Some(body) => {
                    if let Some(content_type) = body.content_type() {
                        headers.insert_if_absent("Content-Type", content_type);
                    }
                    headers.insert("Content-Length", body.len().to_string());
                    headers.remove("Transfer-Encoding");
                }
                None => {
                    let method = original.method();
                    if *method == Method::POST || *method == Method::PUT || *method == Method::PATCH {
                        headers.insert("Content-Length", "0");
                    }
                }
            }

            if let Some(agent) = &self.user_agent {
                headers.insert_if_absent("User-Agent", agent.as_str());
            }

            let request = original.new_builder().headers(headers).build()?;
            chain.proceed(request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use crate::http::request::Request;
    use crate::http::requestbody::FormBody;
    use std::sync::{Arc, Mutex};

    /// Answers immediately and keeps the request it received.
    #[derive(Default)]
    struct Capture(Mutex<Option<Request>>);

    impl Interceptor for Capture {
        fn intercept<'a>(&'a self, chain: Chain<'a>) -> BoxFuture<'a, Result<Response, NetError>> {
            *self.0.lock().unwrap() = Some(chain.request().clone());
            Box::pin(async { Ok(Response::builder().build()) })
        }
    }

    async fn normalize(headers: HeadersInterceptor, request: Request) -> Request {
        let capture = Arc::new(Capture::default());
        let chain: Vec<Arc<dyn Interceptor>> = vec![Arc::new(headers), capture.clone()];
        let call = Client::new().new_call(request.clone());
        Chain::run(&chain, &call, request).await.unwrap();
        let seen = capture.0.lock().unwrap().take().unwrap();
        seen
    }

    #[tokio::test]
    async fn test_adds_host_and_connection_in_order() {
        let request = Request::get("http://example.test:80/a").unwrap();
        let sent = normalize(HeadersInterceptor::default(), request).await;
        let names: Vec<_> = sent.headers().iter().map(|(n, v)| (n.to_string(), v.to_string())).collect();
        assert_eq!(
            names,
            vec![
                ("Host".to_string(), "example.test".to_string()),
                ("Connection".to_string(), "Keep-Alive".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_non_default_port_in_host() {
        let request = Request::get("http://example.test:8080/").unwrap();
        let sent = normalize(HeadersInterceptor::default(), request).await;
        assert_eq!(sent.header("Host"), Some("example.test:8080"));
    }

    #[tokio::test]
    async fn test_caller_headers_win() {
        let request = Request::builder()
            .url("http://example.test/")
            .header("Host", "override.test")
            .header("Connection", "close")
            .header("User-Agent", "mine")
            .build()
            .unwrap();
        let sent = normalize(HeadersInterceptor::new(Some("default/1.0".into())), request).await;
        assert_eq!(sent.header("Host"), Some("override.test"));
        assert_eq!(sent.header("Connection"), Some("close"));
        assert_eq!(sent.header("User-Agent"), Some("mine"));
    }

    #[tokio::test]
    async fn test_body_headers() {
        let request = Request::builder()
            .url("http://example.test/form")
            .post(FormBody::new().add("a", "1 2").build())
            .header("Transfer-Encoding", "chunked")
            .header("Content-Length", "999")
            .build()
            .unwrap();
        let sent = normalize(HeadersInterceptor::new(Some("relaynet".into())), request).await;
        assert_eq!(sent.header("Content-Length"), Some("5"));
        assert_eq!(
            sent.header("Content-Type"),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(sent.header("Transfer-Encoding"), None);
        assert_eq!(sent.header("User-Agent"), Some("relaynet"));
    }

    #[tokio::test]
    async fn test_empty_post_gets_zero_length() {
        let request = Request::builder()
            .url("http://example.test/")
            .method(Method::POST)
            .build()
            .unwrap();
        let sent = normalize(HeadersInterceptor::default(), request).await;
        assert_eq!(sent.header("Content-Length"), Some("0"));
    }
}
