//! Retry policy with optional exponential backoff.
//!
//! Modelled on Chromium's `HttpNetworkTransaction::RetryReason`; see
//! net/http/http_network_transaction.h.

use crate::base::neterror::NetError;
use serde::Deserialize;
use std::time::Duration;

/// Why a failed attempt is worth repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    ConnectionReset,
    ConnectionClosed,
    ConnectionAborted,
    ConnectionRefused,
    SocketNotConnected,
    NameNotResolved,
    Timeout,
    /// Server sent nothing, or something unparseable, on a reused connection.
    EmptyResponse,
    MalformedResponse,
    Io,
}

impl RetryReason {
    /// Maps an error to a reason, or `None` when retrying cannot help.
    pub fn from_error(error: &NetError) -> Option<Self> {
        if !error.is_recoverable() {
            return None;
        }
        match error {
            NetError::ConnectionReset => Some(Self::ConnectionReset),
            NetError::ConnectionClosed => Some(Self::ConnectionClosed),
            NetError::ConnectionAborted => Some(Self::ConnectionAborted),
            NetError::ConnectionRefused
            | NetError::ConnectionFailed
            | NetError::ConnectionFailedTo { .. } => Some(Self::ConnectionRefused),
            NetError::SocketNotConnected => Some(Self::SocketNotConnected),
            NetError::NameNotResolved | NetError::NameNotResolvedFor { .. } => {
                Some(Self::NameNotResolved)
            }
            NetError::ConnectionTimedOut => Some(Self::Timeout),
            NetError::EmptyResponse => Some(Self::EmptyResponse),
            NetError::Io { .. } => Some(Self::Io),
            _ => Some(Self::MalformedResponse),
        }
    }
}

/// Retry configuration.
///
/// `retries` extra attempts follow the first, so a request is tried at most
/// `retries + 1` times.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Extra attempts after the first (default: 3).
    pub retries: usize,
    /// Backoff base in milliseconds; 0 retries immediately (default: 0).
    pub base_delay_ms: u64,
    /// Backoff cap in milliseconds (default: 5000).
    pub max_delay_ms: u64,
    /// Jitter factor in 0.0..=1.0 applied on top of the delay (default: 0.0).
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            base_delay_ms: 0,
            max_delay_ms: 5000,
            jitter_factor: 0.0,
        }
    }
}

impl RetryConfig {
    pub fn with_retries(retries: usize) -> Self {
        Self {
            retries,
            ..Default::default()
        }
    }

    /// Exponential backoff: 100ms base, 10s cap, 20% jitter.
    pub fn with_backoff(retries: usize) -> Self {
        Self {
            retries,
            base_delay_ms: 100,
            max_delay_ms: 10_000,
            jitter_factor: 0.2,
        }
    }

    /// Total attempts allowed, first one included.
    pub fn max_attempts(&self) -> usize {
        self.retries.saturating_add(1)
    }
}

/// Delay before retry number `retry` (1-based). Zero for the first attempt.
///
/// `base_delay * 2^(retry-1)`, capped at `max_delay_ms`, plus deterministic
/// jitter.
pub fn calculate_backoff(retry: usize, config: &RetryConfig) -> Duration {
    if retry == 0 || config.base_delay_ms == 0 {
        return Duration::ZERO;
    }

    let delay_ms = config
        .base_delay_ms
        .saturating_mul(1 << (retry - 1).min(10));
    let capped_ms = delay_ms.min(config.max_delay_ms);

    let jitter_range = (capped_ms as f64 * config.jitter_factor.clamp(0.0, 1.0)) as u64;
    let jittered_ms = if jitter_range > 0 {
        capped_ms.saturating_add((retry as u64 * 7) % jitter_range)
    } else {
        capped_ms
    };

    Duration::from_millis(jittered_ms)
}
