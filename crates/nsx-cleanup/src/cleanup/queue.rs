//! Bounded retry queue for per-VPC teardown
//!
//! [`RetryQueue`] follows the usual controller work-queue contract: an item
//! is queued at most once, an item being processed is never handed to a
//! second worker, and re-adding an item while it is processing defers it
//! until [`RetryQueue::done`] is called.
//!
//! [`process_queue`] drives a fixed worker pool over a known set of items,
//! requeueing failures after a delay and shutting the queue down once every
//! item has reached a terminal state.

use super::fanout::panic_message;
use crate::context::{TeardownContext, TimeoutError};
use crate::retry::is_retriable;
use anyhow::{Result, anyhow};
use futures::FutureExt;
use nsx_cleanup_common::defaults;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Worker pool and retry limits for [`process_queue`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Number of concurrent workers
    pub workers: usize,
    /// Requeues allowed per item before it is given up on
    pub max_retries: usize,
    /// Fixed delay before a failed item is handed out again
    pub retry_delay: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: defaults::DEFAULT_VPC_WORKERS,
            max_retries: defaults::DEFAULT_VPC_MAX_RETRIES,
            retry_delay: defaults::DEFAULT_VPC_RETRY_DELAY,
        }
    }
}

struct QueueState<T> {
    items: VecDeque<T>,
    /// Items waiting to be processed (queued or deferred behind processing)
    dirty: HashSet<T>,
    processing: HashSet<T>,
    requeues: HashMap<T, usize>,
    shutting_down: bool,
}

/// Deduplicating work queue with delayed requeue and retry accounting
pub struct RetryQueue<T> {
    state: Mutex<QueueState<T>>,
    notify: Notify,
}

impl<T> Default for RetryQueue<T> {
    fn default() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                dirty: HashSet::new(),
                processing: HashSet::new(),
                requeues: HashMap::new(),
                shutting_down: false,
            }),
            notify: Notify::new(),
        }
    }
}

impl<T> RetryQueue<T>
where
    T: Clone + Eq + Hash + Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `item` unless it is already waiting. No-op after shutdown.
    pub fn add(&self, item: T) {
        {
            let mut state = self.lock();
            if state.shutting_down || state.dirty.contains(&item) {
                return;
            }
            state.dirty.insert(item.clone());
            if state.processing.contains(&item) {
                return;
            }
            state.items.push_back(item);
        }
        self.notify.notify_one();
    }

    /// Wait for the next item. Returns `None` once the queue is shut down
    /// and drained.
    pub async fn get(&self) -> Option<T> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(item) = state.items.pop_front() {
                    state.dirty.remove(&item);
                    state.processing.insert(item.clone());
                    return Some(item);
                }
                if state.shutting_down {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Mark `item` as no longer processing, queueing it again if it was
    /// re-added meanwhile
    pub fn done(&self, item: &T) {
        let requeued = {
            let mut state = self.lock();
            state.processing.remove(item);
            if state.dirty.contains(item) {
                state.items.push_back(item.clone());
                true
            } else {
                false
            }
        };
        if requeued {
            self.notify.notify_one();
        }
    }

    /// Queue `item` again after `delay`, counting it as a retry
    pub fn add_after(self: &Arc<Self>, item: T, delay: Duration) {
        {
            let mut state = self.lock();
            if state.shutting_down {
                return;
            }
            *state.requeues.entry(item.clone()).or_default() += 1;
        }

        if delay.is_zero() {
            self.add(item);
            return;
        }

        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(item);
        });
    }

    /// Clear retry accounting for `item`
    pub fn forget(&self, item: &T) {
        self.lock().requeues.remove(item);
    }

    pub fn num_requeues(&self, item: &T) -> usize {
        self.lock().requeues.get(item).copied().unwrap_or(0)
    }

    /// Number of items waiting to be handed out
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop accepting items and wake every idle worker
    pub fn shutdown(&self) {
        self.lock().shutting_down = true;
        self.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.lock().shutting_down
    }
}

/// Tracks which items reached a terminal state and shuts the queue down
/// once all of them have
struct CompletionTracker<T> {
    potential: HashSet<T>,
    completed: Mutex<Completion<T>>,
}

struct Completion<T> {
    items: HashSet<T>,
    failures: usize,
}

impl<T> CompletionTracker<T>
where
    T: Clone + Eq + Hash + Send + 'static,
{
    fn new(potential: HashSet<T>) -> Self {
        Self {
            potential,
            completed: Mutex::new(Completion {
                items: HashSet::new(),
                failures: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Completion<T>> {
        self.completed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn complete(&self, item: &T, succeeded: bool, queue: &RetryQueue<T>) {
        let mut completed = self.lock();
        if completed.items.insert(item.clone()) && !succeeded {
            completed.failures += 1;
        }
        // Shutdown happens under the lock so no worker can complete or
        // requeue concurrently with the decision.
        if completed.items == self.potential {
            info!(
                items = completed.items.len(),
                failures = completed.failures,
                "All queued items finished, shutting down queue"
            );
            queue.shutdown();
        }
    }

    /// Whether every item finished successfully
    fn all_succeeded(&self) -> bool {
        let completed = self.lock();
        completed.failures == 0 && completed.items == self.potential
    }
}

/// Process every item in `items` on a pool of `config.workers` workers.
///
/// A failed item is requeued after `config.retry_delay` until it has been
/// requeued `config.max_retries` times; terminal (timeout) failures are not
/// requeued. Returns the first error of any item that never succeeded, or a
/// [`TimeoutError`] if the context finished before every item was done.
pub async fn process_queue<T, F, Fut>(
    ctx: &TeardownContext,
    items: HashSet<T>,
    config: &QueueConfig,
    process: F,
) -> Result<()>
where
    T: Clone + Eq + Hash + Display + Send + Sync + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let total = items.len();
    if total == 0 {
        return Ok(());
    }

    let queue = Arc::new(RetryQueue::new());
    for item in &items {
        queue.add(item.clone());
    }
    let tracker = Arc::new(CompletionTracker::new(items));
    let (result_tx, mut result_rx) = mpsc::channel::<anyhow::Error>(total + 1);
    let process = Arc::new(process);

    let watcher = {
        let ctx = ctx.clone();
        let queue = Arc::clone(&queue);
        let result_tx = result_tx.clone();
        tokio::spawn(async move {
            let reason = ctx.done().await;
            warn!(error = %reason, "Context finished, shutting down queue");
            let _ = result_tx.try_send(TimeoutError(reason).into());
            queue.shutdown();
        })
    };

    let worker_count = config.workers.clamp(1, total);
    info!(items = total, workers = worker_count, "Processing queue");

    let mut workers = JoinSet::new();
    for worker in 0..worker_count {
        workers.spawn(worker_loop(
            worker,
            Arc::clone(&queue),
            Arc::clone(&tracker),
            Arc::clone(&process),
            result_tx.clone(),
            config.clone(),
        ));
    }
    drop(result_tx);

    while workers.join_next().await.is_some() {}
    watcher.abort();

    // The context may finish after the last item succeeded
    if tracker.all_succeeded() {
        return Ok(());
    }

    match result_rx.try_recv() {
        Ok(e) => Err(e),
        Err(_) => Ok(()),
    }
}

async fn worker_loop<T, F, Fut>(
    worker: usize,
    queue: Arc<RetryQueue<T>>,
    tracker: Arc<CompletionTracker<T>>,
    process: Arc<F>,
    results: mpsc::Sender<anyhow::Error>,
    config: QueueConfig,
) where
    T: Clone + Eq + Hash + Display + Send + Sync + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    while let Some(item) = queue.get().await {
        let outcome = AssertUnwindSafe((*process)(item.clone()))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(anyhow!("processing {item} panicked: {}", panic_message(&*panic)))
            });

        match outcome {
            Ok(()) => {
                debug!(worker, item = %item, "Item processed");
                queue.forget(&item);
                tracker.complete(&item, true, &queue);
            }
            Err(e) => {
                let requeues = queue.num_requeues(&item);
                if is_retriable(&e) && requeues < config.max_retries && !queue.is_shutting_down() {
                    warn!(
                        worker,
                        item = %item,
                        requeues,
                        delay = ?config.retry_delay,
                        error = %e,
                        "Item failed, requeueing"
                    );
                    queue.add_after(item.clone(), config.retry_delay);
                } else {
                    warn!(worker, item = %item, requeues, error = %e, "Item failed, giving up");
                    let _ = results.try_send(e);
                    queue.forget(&item);
                    tracker.complete(&item, false, &queue);
                }
            }
        }

        queue.done(&item);
    }
    debug!(worker, "Worker exiting");
}
