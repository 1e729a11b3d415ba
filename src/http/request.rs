//! Immutable HTTP requests and their builder.

use crate::base::neterror::NetError;
use crate::http::headers::{self, Headers};
use crate::http::requestbody::RequestBody;
use crate::http::url::HttpUrl;
use http::Method;

/// A request ready to be sent. Build one with [`Request::builder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    url: HttpUrl,
    headers: Headers,
    body: Option<RequestBody>,
}

impl Request {
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// Shorthand for a GET request to `url`.
    pub fn get(url: &str) -> Result<Request, NetError> {
        Request::builder().url(url).build()
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &HttpUrl {
        &self.url
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// Reopens this request so a derived one can be built from it.
    pub fn new_builder(&self) -> RequestBuilder {
        RequestBuilder {
            method: self.method.clone(),
            url: Some(Ok(self.url.clone())),
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }
}

/// Accumulates request state, validated once in [`build`](Self::build).
#[derive(Debug, Default)]
pub struct RequestBuilder {
    method: Method,
    url: Option<Result<HttpUrl, NetError>>,
    headers: Headers,
    body: Option<RequestBody>,
}

impl RequestBuilder {
    pub fn url(mut self, url: &str) -> Self {
        self.url = Some(HttpUrl::parse(url));
        self
    }

    pub fn http_url(mut self, url: HttpUrl) -> Self {
        self.url = Some(Ok(url));
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets a header, replacing any existing value for the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn remove_header(mut self, name: &str) -> Self {
        self.headers.remove(name);
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn no_body(mut self) -> Self {
        self.body = None;
        self
    }

    pub fn get(self) -> Self {
        self.method(Method::GET).no_body()
    }

    pub fn post(self, body: impl Into<RequestBody>) -> Self {
        self.method(Method::POST).body(body)
    }

    pub fn build(self) -> Result<Request, NetError> {
        let url = self.url.ok_or(NetError::InvalidUrl)??;
        for (name, value) in self.headers.iter() {
            headers::validate(name, value)?;
        }
        if self.body.is_some() && (self.method == Method::GET || self.method == Method::HEAD) {
            return Err(NetError::BodyNotPermitted(self.method.to_string()));
        }
        Ok(Request {
            method: self.method,
            url,
            headers: self.headers,
            body: self.body,
        })
    }
}
