//! FIFO background executor.
//!
//! # Concurrency Model
//!
//! - Unbounded `mpsc` intake; workers share the receiver behind a mutex so
//!   items are taken strictly in submission order
//! - Each unit of work receives a child of the queue's `CancellationToken`
//! - `shutdown` closes intake, lets workers drain for a grace period, then
//!   cancels the token and drops whatever is still running or pending

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, join_all};
use hoard_core::Settings;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type Work = Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, ()> + Send>;

/// Configuration for a [`WorkQueue`].
#[derive(Debug, Clone)]
pub struct WorkQueueConfig {
    /// Number of worker tasks (at least 1).
    pub workers: usize,
    /// Name used in log messages.
    pub name: String,
}

impl Default for WorkQueueConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            name: "background".to_string(),
        }
    }
}

impl WorkQueueConfig {
    /// Build a config from user settings.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            workers: settings.effective_background_workers() as usize,
            ..Self::default()
        }
    }

    /// Set the worker count (at least 1).
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the log name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Generic FIFO executor for background async work.
///
/// Work is offered to workers in submission order; completion order is not
/// guaranteed when more than one worker is configured. Pending work is not
/// persisted.
pub struct WorkQueue {
    name: String,
    sender: StdMutex<Option<mpsc::UnboundedSender<Work>>>,
    pending: Arc<AtomicUsize>,
    cancel: CancellationToken,
    workers: StdMutex<Vec<JoinHandle<()>>>,
}

impl WorkQueue {
    /// Start the queue and its workers on the current tokio runtime.
    #[must_use]
    pub fn start(config: WorkQueueConfig) -> Arc<Self> {
        let worker_count = config.workers.max(1);
        let (tx, rx) = mpsc::unbounded_channel::<Work>();
        let rx = Arc::new(Mutex::new(rx));
        let pending = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let workers = (0..worker_count)
            .map(|index| {
                tokio::spawn(worker_loop(
                    index,
                    Arc::clone(&rx),
                    Arc::clone(&pending),
                    cancel.clone(),
                ))
            })
            .collect();

        tracing::debug!(
            target: "hoard.runtime",
            queue = %config.name,
            workers = worker_count,
            "Work queue started"
        );

        Arc::new(Self {
            name: config.name,
            sender: StdMutex::new(Some(tx)),
            pending,
            cancel,
            workers: StdMutex::new(workers),
        })
    }

    /// Schedule a unit of work.
    ///
    /// The closure receives a cancellation token that fires on shutdown.
    /// Returns `false` once the queue has been shut down.
    pub fn enqueue<F, Fut>(&self, work: F) -> bool
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Ok(guard) = self.sender.lock() else {
            return false;
        };
        let Some(sender) = guard.as_ref() else {
            tracing::debug!(target: "hoard.runtime", queue = %self.name, "Rejected work after shutdown");
            return false;
        };

        let boxed: Work = Box::new(move |token| work(token).boxed());
        self.pending.fetch_add(1, Ordering::SeqCst);
        if sender.send(boxed).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return false;
        }
        true
    }

    /// Number of submitted units not yet picked up by a worker.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Whether `shutdown` has been called.
    pub fn is_shut_down(&self) -> bool {
        self.sender.lock().map_or(true, |guard| guard.is_none())
    }

    /// Token cancelled when the queue shuts down.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop intake, drain for up to `grace`, then cancel remaining work and
    /// join the workers.
    pub async fn shutdown(&self, grace: Duration) {
        let sender = self.sender.lock().ok().and_then(|mut guard| guard.take());
        if sender.is_none() {
            return;
        }
        drop(sender);

        let handles: Vec<JoinHandle<()>> = self
            .workers
            .lock()
            .map(|mut guard| guard.drain(..).collect())
            .unwrap_or_default();

        let mut joined = Box::pin(join_all(handles));
        if tokio::time::timeout(grace, &mut joined).await.is_err() {
            tracing::warn!(
                target: "hoard.runtime",
                queue = %self.name,
                pending = self.pending(),
                "Grace period elapsed, cancelling outstanding work"
            );
            self.cancel.cancel();
            joined.await;
        }
        self.cancel.cancel();

        tracing::debug!(target: "hoard.runtime", queue = %self.name, "Work queue stopped");
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn worker_loop(
    index: usize,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Work>>>,
    pending: Arc<AtomicUsize>,
    cancel: CancellationToken,
) {
    loop {
        let next = {
            let mut rx = rx.lock().await;
            tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                item = rx.recv() => item,
            }
        };

        let Some(work) = next else {
            break;
        };
        pending.fetch_sub(1, Ordering::SeqCst);

        let token = cancel.child_token();
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = work(token) => {}
        }
    }

    // Drop anything still queued so the pending count reflects reality.
    if cancel.is_cancelled() {
        let mut rx = rx.lock().await;
        while rx.try_recv().is_ok() {
            pending.fetch_sub(1, Ordering::SeqCst);
        }
    }

    tracing::trace!(target: "hoard.runtime", worker = index, "Worker exited");
}
