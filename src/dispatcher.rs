//! Admission control for asynchronous calls.
//!
//! At most `max_requests` calls run at once, and at most
//! `max_requests_per_host` of them share a host. Everything else waits in
//! a FIFO ready queue and is promoted as running calls finish.
//!
//! Calls run as tokio tasks on the ambient runtime. Outside a runtime the
//! dispatcher starts its own multi-thread runtime on first use and keeps
//! it until [`Dispatcher::shutdown`] or drop.

use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::{Builder, Handle, Runtime};

pub const DEFAULT_MAX_REQUESTS: usize = 64;
pub const DEFAULT_MAX_REQUESTS_PER_HOST: usize = 5;

type Canceler = Arc<dyn Fn() + Send + Sync>;

/// A unit of work the dispatcher admits, keyed by the host it talks to.
pub struct AsyncTask {
    host: String,
    future: BoxFuture<'static, ()>,
    canceler: Option<Canceler>,
}

impl AsyncTask {
    pub fn new(host: impl Into<String>, future: impl Future<Output = ()> + Send + 'static) -> Self {
        Self {
            host: host.into(),
            future: Box::pin(future),
            canceler: None,
        }
    }

    /// Invoked by [`Dispatcher::cancel_all`] while the task is queued or
    /// running.
    pub fn with_canceler(mut self, canceler: impl Fn() + Send + Sync + 'static) -> Self {
        self.canceler = Some(Arc::new(canceler));
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

impl std::fmt::Debug for AsyncTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncTask").field("host", &self.host).finish_non_exhaustive()
    }
}

struct Queued {
    id: u64,
    task: AsyncTask,
}

struct Running {
    id: u64,
    host: String,
    canceler: Option<Canceler>,
}

struct State {
    max_requests: usize,
    max_requests_per_host: usize,
    ready: VecDeque<Queued>,
    running: Vec<Running>,
    next_id: u64,
}

impl State {
    fn running_for_host(&self, host: &str) -> usize {
        self.running
            .iter()
            .filter(|r| r.host.eq_ignore_ascii_case(host))
            .count()
    }

    /// Moves ready tasks to running in arrival order, skipping hosts at
    /// their ceiling, until the global ceiling is reached.
    fn promote(&mut self) -> Vec<(u64, BoxFuture<'static, ()>)> {
        let mut admitted = Vec::new();
        let mut i = 0;
        while i < self.ready.len() && self.running.len() < self.max_requests {
            if self.running_for_host(&self.ready[i].task.host) >= self.max_requests_per_host {
                i += 1;
                continue;
            }
            let Some(Queued { id, task }) = self.ready.remove(i) else {
                break;
            };
            tracing::debug!(id, host = %task.host, "call admitted");
            self.running.push(Running {
                id,
                host: task.host,
                canceler: task.canceler,
            });
            admitted.push((id, task.future));
        }
        admitted
    }
}

struct DispatcherInner {
    state: Mutex<State>,
    runtime: Mutex<Option<Runtime>>,
}

impl Drop for DispatcherInner {
    fn drop(&mut self) {
        let runtime = self
            .runtime
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(runtime) = runtime {
            runtime.shutdown_background();
        }
    }
}

/// Shared handle; clones share queues and limits.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Dispatcher")
            .field("max_requests", &state.max_requests)
            .field("max_requests_per_host", &state.max_requests_per_host)
            .field("running", &state.running.len())
            .field("queued", &state.ready.len())
            .finish()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_REQUESTS, DEFAULT_MAX_REQUESTS_PER_HOST)
    }

    /// Limits below one are raised to one.
    pub fn with_limits(max_requests: usize, max_requests_per_host: usize) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                state: Mutex::new(State {
                    max_requests: max_requests.max(1),
                    max_requests_per_host: max_requests_per_host.max(1),
                    ready: VecDeque::new(),
                    running: Vec::new(),
                    next_id: 0,
                }),
                runtime: Mutex::new(None),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `task` now if both ceilings allow, otherwise queues it.
    pub fn enqueue(&self, task: AsyncTask) {
        let admitted = {
            let mut state = self.lock();
            let id = state.next_id;
            state.next_id += 1;
            tracing::debug!(id, host = %task.host, "call enqueued");
            state.ready.push_back(Queued { id, task });
            state.promote()
        };
        self.spawn_all(admitted);
    }

    /// Removes a running task and promotes waiting ones.
    fn finished(&self, id: u64) {
        let admitted = {
            let mut state = self.lock();
            state.running.retain(|r| r.id != id);
            state.promote()
        };
        self.spawn_all(admitted);
    }

    fn spawn_all(&self, admitted: Vec<(u64, BoxFuture<'static, ()>)>) {
        if admitted.is_empty() {
            return;
        }
        let Some(handle) = self.executor() else {
            for (id, future) in admitted {
                drop(future);
                self.finished(id);
            }
            return;
        };
        for (id, future) in admitted {
            let guard = FinishGuard {
                dispatcher: self.clone(),
                id,
            };
            handle.spawn(async move {
                let _guard = guard;
                future.await;
            });
        }
    }

    fn executor(&self) -> Option<Handle> {
        if let Ok(handle) = Handle::try_current() {
            return Some(handle);
        }
        let mut runtime = self
            .inner
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if runtime.is_none() {
            match Builder::new_multi_thread()
                .enable_all()
                .thread_name("relaynet-dispatcher")
                .build()
            {
                Ok(rt) => *runtime = Some(rt),
                Err(e) => {
                    tracing::error!(error = %e, "failed to start dispatcher runtime");
                    return None;
                }
            }
        }
        runtime.as_ref().map(|rt| rt.handle().clone())
    }

    pub fn max_requests(&self) -> usize {
        self.lock().max_requests
    }

    pub fn max_requests_per_host(&self) -> usize {
        self.lock().max_requests_per_host
    }

    /// Raising the limit admits waiting calls immediately. Lowering it
    /// below the running count never interrupts running calls: they
    /// drain, and nothing new is admitted until the count drops under the
    /// new limit. Until then `running_calls_count` may exceed it.
    pub fn set_max_requests(&self, max_requests: usize) {
        let admitted = {
            let mut state = self.lock();
            state.max_requests = max_requests.max(1);
            state.promote()
        };
        self.spawn_all(admitted);
    }

    /// Same admission rule as [`set_max_requests`](Self::set_max_requests),
    /// applied per host.
    pub fn set_max_requests_per_host(&self, max_requests_per_host: usize) {
        let admitted = {
            let mut state = self.lock();
            state.max_requests_per_host = max_requests_per_host.max(1);
            state.promote()
        };
        self.spawn_all(admitted);
    }

    /// Cancels every queued and running call.
    pub fn cancel_all(&self) {
        let cancelers: Vec<Canceler> = {
            let state = self.lock();
            state
                .ready
                .iter()
                .filter_map(|q| q.task.canceler.clone())
                .chain(state.running.iter().filter_map(|r| r.canceler.clone()))
                .collect()
        };
        for cancel in cancelers {
            cancel();
        }
    }

    pub fn running_calls_count(&self) -> usize {
        self.lock().running.len()
    }

    pub fn queued_calls_count(&self) -> usize {
        self.lock().ready.len()
    }

    pub fn running_calls_for_host(&self, host: &str) -> usize {
        self.lock().running_for_host(host)
    }

    /// Drops queued calls (their callbacks report `Canceled`), cancels
    /// running ones and releases the owned runtime, if any.
    pub fn shutdown(&self) {
        let dropped: Vec<Queued> = self.lock().ready.drain(..).collect();
        drop(dropped);
        self.cancel_all();
        let runtime = self
            .inner
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(runtime) = runtime {
            runtime.shutdown_background();
        }
    }
}

/// Reports a running task finished however its future ends.
struct FinishGuard {
    dispatcher: Dispatcher,
    id: u64,
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.dispatcher.finished(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::{oneshot, Notify};

    /// A task that parks until `release` is notified, then records its tag.
    fn blocked(
        host: &str,
        tag: usize,
        release: Arc<Notify>,
        order: Arc<Mutex<Vec<usize>>>,
    ) -> AsyncTask {
        AsyncTask::new(host, async move {
            release.notified().await;
            order.lock().unwrap().push(tag);
        })
    }

    /// A task that finishes when its sender fires or is dropped.
    fn gated(host: &str, done: Arc<AtomicUsize>) -> (AsyncTask, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel::<()>();
        let task = AsyncTask::new(host, async move {
            let _ = rx.await;
            done.fetch_add(1, Ordering::SeqCst);
        });
        (task, tx)
    }

    /// Both ceilings hold, and a waiting call is left queued only when it
    /// has to be.
    fn assert_admission(dispatcher: &Dispatcher) {
        let state = dispatcher.lock();
        assert!(state.running.len() <= state.max_requests);
        for r in &state.running {
            assert!(state.running_for_host(&r.host) <= state.max_requests_per_host);
        }
        if state.running.len() < state.max_requests {
            for q in &state.ready {
                assert!(state.running_for_host(&q.task.host) >= state.max_requests_per_host);
            }
        }
    }

    async fn settle() {
        for _ in 0..100 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_global_ceiling() {
        let dispatcher = Dispatcher::with_limits(2, 5);
        let release = Arc::new(Notify::new());
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in 0..4 {
            dispatcher.enqueue(blocked(&format!("h{tag}.test"), tag, release.clone(), order.clone()));
        }
        assert_eq!(dispatcher.running_calls_count(), 2);
        assert_eq!(dispatcher.queued_calls_count(), 2);

        settle().await;
        release.notify_waiters();
        settle().await;
        assert_eq!(dispatcher.running_calls_count(), 2);
        assert_eq!(dispatcher.queued_calls_count(), 0);

        release.notify_waiters();
        settle().await;
        assert_eq!(dispatcher.running_calls_count(), 0);

        // Queued calls start only after the first two finish.
        let mut order = order.lock().unwrap().clone();
        order[..2].sort_unstable();
        order[2..].sort_unstable();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_per_host_ceiling_skips_but_keeps_order() {
        let dispatcher = Dispatcher::with_limits(10, 1);
        let release = Arc::new(Notify::new());
        let order = Arc::new(Mutex::new(Vec::new()));
        dispatcher.enqueue(blocked("a.test", 0, release.clone(), order.clone()));
        dispatcher.enqueue(blocked("a.test", 1, release.clone(), order.clone()));
        dispatcher.enqueue(blocked("b.test", 2, release.clone(), order.clone()));

        assert_eq!(dispatcher.running_calls_for_host("a.test"), 1);
        assert_eq!(dispatcher.running_calls_for_host("b.test"), 1);
        assert_eq!(dispatcher.queued_calls_count(), 1);
        assert!(dispatcher.running_calls_for_host("A.TEST") <= 1);
    }

    #[tokio::test]
    async fn test_raising_limit_promotes() {
        let dispatcher = Dispatcher::with_limits(1, 5);
        let release = Arc::new(Notify::new());
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in 0..3 {
            dispatcher.enqueue(blocked("a.test", tag, release.clone(), order.clone()));
        }
        assert_eq!(dispatcher.running_calls_count(), 1);
        dispatcher.set_max_requests(3);
        assert_eq!(dispatcher.running_calls_count(), 3);
        assert_eq!(dispatcher.queued_calls_count(), 0);
    }

    #[tokio::test]
    async fn test_mixed_schedule_keeps_ceilings() {
        let dispatcher = Dispatcher::with_limits(4, 2);
        let hosts = ["a.test", "b.test", "c.test"];
        let done = Arc::new(AtomicUsize::new(0));
        let mut gates = Vec::new();
        let mut seed: u32 = 0x2545_f491;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            seed
        };

        let mut enqueued = 0;
        for _ in 0..200 {
            let roll = next();
            if roll % 3 != 0 || gates.is_empty() {
                let host = hosts[(roll as usize / 3) % hosts.len()];
                let (task, gate) = gated(host, done.clone());
                dispatcher.enqueue(task);
                gates.push(gate);
                enqueued += 1;
            } else {
                let gate = gates.swap_remove(next() as usize % gates.len());
                let _ = gate.send(());
            }
            settle().await;
            assert_admission(&dispatcher);
            assert_eq!(
                dispatcher.running_calls_count() + dispatcher.queued_calls_count(),
                enqueued - done.load(Ordering::SeqCst)
            );
        }

        for gate in gates {
            let _ = gate.send(());
            settle().await;
            assert_admission(&dispatcher);
        }
        settle().await;
        assert_eq!(done.load(Ordering::SeqCst), enqueued);
        assert_eq!(dispatcher.running_calls_count(), 0);
        assert_eq!(dispatcher.queued_calls_count(), 0);
    }

    #[tokio::test]
    async fn test_lowering_limit_drains_before_admitting() {
        let dispatcher = Dispatcher::with_limits(3, 3);
        let done = Arc::new(AtomicUsize::new(0));
        let mut gates = Vec::new();
        for _ in 0..5 {
            let (task, gate) = gated("a.test", done.clone());
            dispatcher.enqueue(task);
            gates.push(gate);
        }
        settle().await;
        assert_eq!(dispatcher.running_calls_count(), 3);

        dispatcher.set_max_requests(1);
        assert_eq!(dispatcher.running_calls_count(), 3);
        assert_eq!(dispatcher.queued_calls_count(), 2);

        let mut gates = gates.into_iter();
        for expected_running in [2, 1] {
            let _ = gates.next().unwrap().send(());
            settle().await;
            assert_eq!(dispatcher.running_calls_count(), expected_running);
            assert_eq!(dispatcher.queued_calls_count(), 2);
        }

        // Below the new limit only now: one queued call moves up.
        let _ = gates.next().unwrap().send(());
        settle().await;
        assert_eq!(dispatcher.running_calls_count(), 1);
        assert_eq!(dispatcher.queued_calls_count(), 1);
    }

    #[tokio::test]
    async fn test_finished_even_when_task_panics() {
        let dispatcher = Dispatcher::with_limits(1, 1);
        dispatcher.enqueue(AsyncTask::new("a.test", async { panic!("boom"); }));
        let (tx, rx) = oneshot::channel();
        dispatcher.enqueue(AsyncTask::new("a.test", async move {
            let _ = tx.send(());
        }));
        rx.await.unwrap();
        settle().await;
        assert_eq!(dispatcher.running_calls_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_all_reaches_queued_and_running() {
        let dispatcher = Dispatcher::with_limits(1, 1);
        let canceled = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());
        for _ in 0..3 {
            let count = canceled.clone();
            let release = release.clone();
            dispatcher.enqueue(
                AsyncTask::new("a.test", async move { release.notified().await })
                    .with_canceler(move || {
                        count.fetch_add(1, Ordering::SeqCst);
                    }),
            );
        }
        dispatcher.cancel_all();
        assert_eq!(canceled.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_owned_runtime_without_ambient() {
        let dispatcher = Dispatcher::new();
        let (tx, rx) = std::sync::mpsc::channel();
        dispatcher.enqueue(AsyncTask::new("a.test", async move {
            tx.send(Handle::try_current().is_ok()).unwrap();
        }));
        assert!(rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap());
        dispatcher.shutdown();
    }

    #[test]
    fn test_shutdown_drops_queued() {
        let dispatcher = Dispatcher::with_limits(1, 1);
        let release = Arc::new(Notify::new());
        let order = Arc::new(Mutex::new(Vec::new()));
        dispatcher.enqueue(blocked("a.test", 0, release.clone(), order.clone()));
        dispatcher.enqueue(blocked("a.test", 1, release, order));
        assert_eq!(dispatcher.queued_calls_count(), 1);
        dispatcher.shutdown();
        assert_eq!(dispatcher.queued_calls_count(), 0);
    }
}
