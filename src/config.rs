//! Client configuration as plain data.
//!
//! Every field has a default, so a partial JSON document is enough:
//!
//! ```rust
//! use relaynet::config::ClientConfig;
//!
//! let config = ClientConfig::from_json(r#"{"retry": {"retries": 1}, "max_requests": 8}"#).unwrap();
//! assert_eq!(config.retry.retries, 1);
//! assert_eq!(config.max_requests_per_host, 5);
//! ```

use crate::base::neterror::NetError;
use crate::dispatcher::{DEFAULT_MAX_REQUESTS, DEFAULT_MAX_REQUESTS_PER_HOST};
use crate::http::followup::FollowUpPolicy;
use crate::http::retry::RetryConfig;
use crate::socket::pool::DEFAULT_KEEP_ALIVE;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub retry: RetryConfig,
    /// Per-address TCP connect deadline.
    pub connect_timeout_ms: Option<u64>,
    /// Deadline for writing a request and reading its whole response.
    pub read_timeout_ms: Option<u64>,
    pub follow_redirects: bool,
    /// Follow redirects between `http` and `https`.
    pub follow_ssl_redirects: bool,
    /// Retry recoverable I/O failures and `408` responses.
    pub retry_on_connection_failure: bool,
    pub max_requests: usize,
    pub max_requests_per_host: usize,
    /// Idle lifetime of pooled connections.
    pub keep_alive_ms: u64,
    /// Sent when a request has no `User-Agent` of its own.
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            connect_timeout_ms: None,
            read_timeout_ms: None,
            follow_redirects: true,
            follow_ssl_redirects: true,
            retry_on_connection_failure: true,
            max_requests: DEFAULT_MAX_REQUESTS,
            max_requests_per_host: DEFAULT_MAX_REQUESTS_PER_HOST,
            keep_alive_ms: DEFAULT_KEEP_ALIVE.as_millis() as u64,
            user_agent: None,
        }
    }
}

impl ClientConfig {
    pub fn from_json(json: &str) -> Result<Self, NetError> {
        serde_json::from_str(json).map_err(|e| NetError::InvalidConfig(e.to_string()))
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_millis(self.keep_alive_ms)
    }

    pub fn follow_up_policy(&self) -> FollowUpPolicy {
        FollowUpPolicy {
            follow_redirects: self.follow_redirects,
            follow_ssl_redirects: self.follow_ssl_redirects,
            retry_on_connection_failure: self.retry_on_connection_failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.retry.retries, 3);
        assert_eq!(config.max_requests, 64);
        assert_eq!(config.max_requests_per_host, 5);
        assert_eq!(config.keep_alive(), Duration::from_secs(60));
        assert_eq!(config.connect_timeout(), None);
        assert_eq!(config.follow_up_policy(), FollowUpPolicy::default());
    }

    #[test]
    fn test_partial_json() {
        let config = ClientConfig::from_json(
            r#"{
                "read_timeout_ms": 1500,
                "follow_redirects": false,
                "user_agent": "relaynet/0.1"
            }"#,
        )
        .unwrap();
        assert_eq!(config.read_timeout(), Some(Duration::from_millis(1500)));
        assert!(!config.follow_up_policy().follow_redirects);
        assert_eq!(config.user_agent.as_deref(), Some("relaynet/0.1"));
        assert_eq!(config.retry, RetryConfig::default());
    }

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(ClientConfig::from_json("{}").unwrap(), ClientConfig::default());
    }

    #[test]
    fn test_bad_json() {
        let err = ClientConfig::from_json(r#"{"max_requests": "many"}"#).unwrap_err();
        assert!(matches!(err, NetError::InvalidConfig(_)));
    }
}
