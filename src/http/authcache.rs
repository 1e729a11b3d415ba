//! Server authentication: credential cache and the 401 responder.
//!
//! Based on Chromium's HttpAuthCache. Only the Basic scheme is answered.

use crate::http::request::Request;
use crate::http::response::Response;
use base64::{engine::general_purpose, Engine as _};
use dashmap::DashMap;
use std::sync::Arc;

/// Answers an authentication challenge.
///
/// Returns the request to send next (usually the original with an
/// `Authorization` header), or `None` to give up and hand the 401 to the
/// caller.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, request: &Request, response: &Response) -> Option<Request>;
}

/// Cached credentials for one realm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEntry {
    pub realm: String,
    pub username: String,
    pub password: String,
}

impl AuthEntry {
    pub fn basic(
        realm: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            realm: realm.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// `Authorization` header value.
    pub fn to_header_value(&self) -> String {
        let creds = format!("{}:{}", self.username, self.password);
        format!("Basic {}", general_purpose::STANDARD.encode(creds))
    }
}

/// Thread-safe credential store keyed by host, port and realm.
#[derive(Clone, Default)]
pub struct AuthCache {
    entries: Arc<DashMap<String, AuthEntry>>,
}

impl AuthCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(host: &str, port: u16, realm: &str) -> String {
        format!("{}:{}:{}", host.to_ascii_lowercase(), port, realm)
    }

    pub fn lookup(&self, host: &str, port: u16, realm: &str) -> Option<AuthEntry> {
        self.entries
            .get(&Self::key(host, port, realm))
            .map(|e| e.clone())
    }

    pub fn store(&self, host: &str, port: u16, entry: AuthEntry) {
        let key = Self::key(host, port, &entry.realm);
        self.entries.insert(key, entry);
    }

    /// Drops every realm cached for `host:port`.
    pub fn remove_host(&self, host: &str, port: u16) {
        let prefix = format!("{}:{}:", host.to_ascii_lowercase(), port);
        self.entries.retain(|k, _| !k.starts_with(&prefix));
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for AuthCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthCache")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Answers `Basic` challenges from an [`AuthCache`].
///
/// Gives up when the request already carried the cached credentials, so a
/// server rejecting them does not cause a loop.
impl Authenticator for AuthCache {
    fn authenticate(&self, request: &Request, response: &Response) -> Option<Request> {
        let challenge = response.header("WWW-Authenticate")?;
        let realm = basic_realm(challenge)?;
        let url = request.url();
        let entry = self.lookup(url.host(), url.port(), &realm)?;
        let value = entry.to_header_value();
        if request.header("Authorization") == Some(value.as_str()) {
            tracing::debug!(host = %url.host(), realm = %realm, "cached credentials rejected");
            return None;
        }
        request
            .new_builder()
            .header("Authorization", value)
            .build()
            .ok()
    }
}

/// Extracts the realm of the first `Basic` challenge in a
/// `WWW-Authenticate` value.
pub fn basic_realm(challenge: &str) -> Option<String> {
    let lower = challenge.to_ascii_lowercase();
    let mut search = 0;
    while let Some(pos) = lower[search..].find("basic") {
        let start = search + pos;
        let at_token_start = start == 0 || matches!(lower.as_bytes()[start - 1], b' ' | b',');
        let after = &challenge[start + 5..];
        if at_token_start && after.starts_with([' ', '\t']) {
            return realm_param(after);
        }
        search = start + 5;
    }
    None
}

fn realm_param(params: &str) -> Option<String> {
    let lower = params.to_ascii_lowercase();
    let idx = lower.find("realm=")?;
    let value = params[idx + 6..].trim_start();
    if let Some(quoted) = value.strip_prefix('"') {
        let end = quoted.find('"')?;
        Some(quoted[..end].to_string())
    } else {
        let end = value.find([',', ' ']).unwrap_or(value.len());
        Some(value[..end].to_string())
    }
}
