//! Batch Dispatcher Module
//!
//! Runs one operation per item under a concurrency ceiling and returns the
//! outcomes in input order. Every item is isolated: an error, timeout or
//! panic lands in that item's slot and never touches its siblings.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{FailureKind, ItemFailure};

// == Batch Item Result ==
/// Outcome of one item; `index` is its position in the submitted batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItemResult<R> {
    pub index: usize,
    pub outcome: Result<R, ItemFailure>,
}

impl<R> BatchItemResult<R> {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn failure(&self) -> Option<&ItemFailure> {
        self.outcome.as_ref().err()
    }
}

// == Item Tasks ==
/// Spawned item tasks of one `run` call. Dropping it aborts every task that
/// has not finished, so abandoning a batch also abandons its queued items.
struct ItemTasks<R>(Vec<JoinHandle<Result<R, ItemFailure>>>);

impl<R> Drop for ItemTasks<R> {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

// == Batch Dispatcher ==
#[derive(Debug, Clone)]
pub struct BatchDispatcher {
    worker_limit: usize,
    item_timeout: Option<Duration>,
}

impl BatchDispatcher {
    /// Creates a dispatcher running at most `worker_limit` items at once (at least one).
    pub fn new(worker_limit: usize) -> Self {
        Self {
            worker_limit: worker_limit.max(1),
            item_timeout: None,
        }
    }

    /// Bounds each item's operation. The clock starts once the item holds a slot.
    pub fn with_item_timeout(mut self, timeout: Duration) -> Self {
        self.item_timeout = Some(timeout);
        self
    }

    pub fn worker_limit(&self) -> usize {
        self.worker_limit
    }

    // == Run ==
    /// Runs `op` over every item and returns one result per item, in input order.
    ///
    /// Items beyond the ceiling queue until a slot frees. The semaphore is
    /// per call, so concurrent batches do not share slots. Dropping the
    /// returned future aborts running items and queued ones never start.
    pub async fn run<T, R, E, F, Fut>(&self, items: Vec<T>, op: F) -> Vec<BatchItemResult<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        E: Into<ItemFailure> + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        if items.is_empty() {
            return Vec::new();
        }

        debug!(
            items = items.len(),
            worker_limit = self.worker_limit,
            "dispatching batch"
        );

        let semaphore = Arc::new(Semaphore::new(self.worker_limit));
        let op = Arc::new(op);
        let mut tasks = ItemTasks(Vec::with_capacity(items.len()));

        for item in items {
            let semaphore = Arc::clone(&semaphore);
            let op = Arc::clone(&op);
            let item_timeout = self.item_timeout;

            tasks.0.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return Err(ItemFailure::new(FailureKind::Cancelled, "worker pool closed"));
                };

                let fut = op(item);
                match item_timeout {
                    Some(limit) => match tokio::time::timeout(limit, fut).await {
                        Ok(result) => result.map_err(Into::into),
                        Err(_) => Err(ItemFailure::timeout(limit)),
                    },
                    None => fut.await.map_err(Into::into),
                }
            }));
        }

        // Awaiting in spawn order keeps results positional regardless of
        // completion order.
        let mut results = Vec::with_capacity(tasks.0.len());
        for (index, handle) in tasks.0.iter_mut().enumerate() {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_err) if join_err.is_panic() => Err(ItemFailure::new(
                    FailureKind::Panicked,
                    "item operation panicked",
                )),
                Err(join_err) => Err(ItemFailure::new(FailureKind::Cancelled, join_err.to_string())),
            };

            if let Err(failure) = &outcome {
                warn!(index, kind = ?failure.kind, error = %failure.message, "batch item failed");
            }
            results.push(BatchItemResult { index, outcome });
        }

        results
    }
}

impl Default for BatchDispatcher {
    fn default() -> Self {
        Self::new(4)
    }
}
