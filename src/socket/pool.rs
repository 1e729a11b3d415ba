//! Idle connection pool with keep-alive eviction.
//!
//! One mutex guards the idle set and the sweep generation. A background
//! sweep runs exactly while the idle set is non-empty: it evicts the
//! longest-idle connection once it has been idle for the keep-alive
//! duration, otherwise sleeps until that moment or until a new
//! connection arrives. A sweep task that ends for any reason, including
//! its runtime shutting down, releases its generation so the next `put`
//! starts a fresh one.

use crate::http::url::HttpUrl;
use crate::socket::connection::Connection;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Default idle lifetime of a pooled connection.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);

struct PoolState {
    idle: VecDeque<Connection>,
    /// Generation of the live sweep task, if any.
    sweep: Option<u64>,
    next_sweep: u64,
}

struct PoolInner {
    state: Mutex<PoolState>,
    keep_alive: Duration,
    wake: Notify,
}

/// Shared handle to a set of idle connections. Clones share the pool.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new(DEFAULT_KEEP_ALIVE)
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("keep_alive", &self.inner.keep_alive)
            .field("idle", &self.idle_count())
            .finish()
    }
}

impl ConnectionPool {
    pub fn new(keep_alive: Duration) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                state: Mutex::new(PoolState {
                    idle: VecDeque::new(),
                    sweep: None,
                    next_sweep: 0,
                }),
                keep_alive,
                wake: Notify::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn keep_alive(&self) -> Duration {
        self.inner.keep_alive
    }

    /// Removes and returns an idle connection to `host:port`.
    pub fn get(&self, host: &str, port: u16) -> Option<Connection> {
        self.take(|c| c.same_address(host, port))
    }

    /// Like [`get`](Self::get), also requiring the scheme's transport
    /// security to match.
    pub fn get_for(&self, url: &HttpUrl) -> Option<Connection> {
        self.take(|c| c.matches(url))
    }

    fn take(&self, matches: impl Fn(&Connection) -> bool) -> Option<Connection> {
        loop {
            let mut conn = {
                let mut state = self.lock();
                let idx = state.idle.iter().position(&matches)?;
                state.idle.remove(idx)?
            };
            if conn.is_healthy() {
                tracing::debug!(id = conn.id(), host = %conn.host(), port = conn.port(), "reusing pooled connection");
                return Some(conn);
            }
            tracing::debug!(id = conn.id(), host = %conn.host(), "discarding stale pooled connection");
            conn.close();
        }
    }

    /// Parks `conn` for reuse. Closed connections are dropped.
    pub fn put(&self, conn: Connection) {
        if !conn.is_open() {
            return;
        }
        tracing::debug!(id = conn.id(), host = %conn.host(), port = conn.port(), "connection pooled");

        let start_sweep = {
            let mut state = self.lock();
            state.idle.push_back(conn);
            match state.sweep {
                Some(_) => None,
                None => {
                    let generation = state.next_sweep;
                    state.next_sweep = state.next_sweep.wrapping_add(1);
                    state.sweep = Some(generation);
                    Some(generation)
                }
            }
        };

        match start_sweep {
            Some(generation) => self.spawn_sweep(generation),
            None => self.inner.wake.notify_one(),
        }
    }

    fn spawn_sweep(&self, generation: u64) {
        let guard = SweepGuard {
            pool: self.clone(),
            generation,
        };
        let Ok(handle) = Handle::try_current() else {
            tracing::debug!("no runtime for pool sweep; idle connections will not expire");
            return;
        };
        handle.spawn(async move {
            let pool = &guard.pool;
            while let Some(wait) = pool.sweep_step(Instant::now(), Some(guard.generation)) {
                if wait.is_zero() {
                    continue;
                }
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = pool.inner.wake.notified() => {}
                }
            }
        });
    }

    /// One sweep step. Returns how long to wait before the next step, or
    /// `None` (ending the sweep) when the pool is empty.
    pub(crate) fn cleanup(&self, now: Instant) -> Option<Duration> {
        self.sweep_step(now, None)
    }

    /// A step on behalf of sweep `generation` stops as soon as that sweep
    /// is no longer the live one.
    fn sweep_step(&self, now: Instant, generation: Option<u64>) -> Option<Duration> {
        let keep_alive = self.inner.keep_alive;
        let mut evicted = {
            let mut state = self.lock();
            if generation.is_some() && state.sweep != generation {
                return None;
            }
            let Some((idx, idle_for)) = state
                .idle
                .iter()
                .map(|c| c.idle_duration(now))
                .enumerate()
                .max_by_key(|(_, idle)| *idle)
            else {
                state.sweep = None;
                return None;
            };
            if idle_for < keep_alive {
                return Some(keep_alive - idle_for);
            }
            state.idle.remove(idx)?
        };
        tracing::debug!(id = evicted.id(), host = %evicted.host(), "evicting idle connection");
        evicted.close();
        Some(Duration::ZERO)
    }

    /// Closes and drops every idle connection and retires the sweep.
    pub fn evict_all(&self) {
        let drained: Vec<Connection> = {
            let mut state = self.lock();
            state.sweep = None;
            state.idle.drain(..).collect()
        };
        for mut conn in drained {
            conn.close();
        }
        self.inner.wake.notify_waiters();
    }

    pub fn idle_count(&self) -> usize {
        self.lock().idle.len()
    }

    #[cfg(test)]
    fn cleanup_running(&self) -> bool {
        self.lock().sweep.is_some()
    }
}

/// Owned by a sweep task. Dropping it, whether the task finished or was
/// dropped unpolled by a dying runtime, releases the task's generation.
struct SweepGuard {
    pool: ConnectionPool,
    generation: u64,
}

impl Drop for SweepGuard {
    fn drop(&mut self) {
        let mut state = self.pool.lock();
        if state.sweep == Some(self.generation) {
            state.sweep = None;
        }
    }
}
