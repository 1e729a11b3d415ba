//! Materialized HTTP responses.

use crate::http::headers::Headers;
use bytes::Bytes;
use http::{StatusCode, Version};

/// A fully read response. Built once by the network exchange step.
#[derive(Debug, Clone)]
pub struct Response {
    version: Version,
    status: StatusCode,
    reason: String,
    headers: Headers,
    body: Bytes,
    keep_alive: bool,
    prior: Option<Box<Response>>,
}

impl Response {
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::default()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.code(), 300..=303 | 307 | 308)
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body decoded as UTF-8, invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    #[cfg(feature = "json")]
    pub fn json<T: serde::de::DeserializeOwned>(
        &self,
    ) -> Result<T, crate::base::neterror::NetError> {
        serde_json::from_slice(&self.body).map_err(|e| crate::base::neterror::NetError::Io {
            kind: std::io::ErrorKind::InvalidData,
            message: e.to_string(),
        })
    }

    /// Whether the connection that carried this response may be reused.
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Declared `Content-Length`, or the materialized body length when the
    /// header is absent.
    pub fn content_length(&self) -> u64 {
        self.headers
            .get("Content-Length")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(self.body.len() as u64)
    }

    /// The response that triggered the follow-up which produced this one.
    /// Its body is always empty.
    pub fn prior_response(&self) -> Option<&Response> {
        self.prior.as_deref()
    }

    /// Attaches `prior` (body stripped) as this response's predecessor.
    pub(crate) fn with_prior(mut self, prior: Response) -> Self {
        self.prior = Some(Box::new(prior.without_body()));
        self
    }

    fn without_body(mut self) -> Self {
        self.body = Bytes::new();
        self
    }
}

#[derive(Debug)]
pub struct ResponseBuilder {
    version: Version,
    status: StatusCode,
    reason: String,
    headers: Headers,
    body: Bytes,
    keep_alive: bool,
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self {
            version: Version::HTTP_11,
            status: StatusCode::OK,
            reason: String::new(),
            headers: Headers::new(),
            body: Bytes::new(),
            keep_alive: true,
        }
    }
}

impl ResponseBuilder {
    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn build(self) -> Response {
        Response {
            version: self.version,
            status: self.status,
            reason: self.reason,
            headers: self.headers,
            body: self.body,
            keep_alive: self.keep_alive,
            prior: None,
        }
    }
}
