//! Controller runner
//!
//! Feeds the work queue from the store watch and runs a fixed pool of
//! workers. The queue keeps a plan on one worker at a time; different plans
//! reconcile in parallel.

use crate::queue::WorkQueue;
use crate::reconciler::{Action, Reconciler};
use crate::store::{ObjectStore, StoreError};
use crate::triggers::plan_keys;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;

/// Runs the plan reconciler against the store
pub struct Controller {
    reconciler: Arc<Reconciler>,
    store: Arc<dyn ObjectStore>,
    queue: Arc<WorkQueue>,
    workers: usize,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("workers", &self.workers)
            .field("queued", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl Controller {
    /// Create new controller
    #[must_use]
    pub fn new(reconciler: Arc<Reconciler>, store: Arc<dyn ObjectStore>) -> Self {
        let workers = reconciler.settings().workers.max(1);
        Self {
            reconciler,
            store,
            queue: Arc::new(WorkQueue::new()),
            workers,
        }
    }

    /// Shared queue, for callers that enqueue plans directly
    #[must_use]
    pub fn queue(&self) -> Arc<WorkQueue> {
        Arc::clone(&self.queue)
    }

    /// Run until `shutdown` resolves
    ///
    /// # Errors
    /// Fails only if the initial plan listing fails.
    pub async fn run<F>(self, shutdown: F) -> Result<(), StoreError>
    where
        F: Future<Output = ()> + Send,
    {
        let mut events = self.store.watch();
        enqueue_all(self.store.as_ref(), &self.queue).await?;

        let watcher = {
            let store = Arc::clone(&self.store);
            let queue = Arc::clone(&self.queue);
            tokio::spawn(async move {
                loop {
                    match events.recv().await {
                        Ok(event) => match plan_keys(store.as_ref(), &event).await {
                            Ok(keys) => keys.into_iter().for_each(|key| queue.add(key)),
                            Err(e) => tracing::warn!(error = %e, "failed to map watch event"),
                        },
                        Err(RecvError::Lagged(missed)) => {
                            tracing::warn!(missed, "watch lagged; requeueing all plans");
                            if let Err(e) = enqueue_all(store.as_ref(), &queue).await {
                                tracing::warn!(error = %e, "failed to list plans");
                            }
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            })
        };

        let mut workers = JoinSet::new();
        for id in 0..self.workers {
            let queue = Arc::clone(&self.queue);
            let reconciler = Arc::clone(&self.reconciler);
            workers.spawn(async move {
                while let Some(key) = queue.next().await {
                    let action = reconciler.reconcile(&key).await;
                    queue.done(&key);
                    if let Action::Requeue(delay) = action {
                        queue.add_after(key, delay);
                    }
                }
                tracing::debug!(worker = id, "worker stopped");
            });
        }
        tracing::info!(workers = self.workers, "controller started");

        shutdown.await;
        tracing::info!("controller stopping");
        self.queue.shutdown();
        watcher.abort();
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "worker panicked");
            }
        }
        Ok(())
    }
}

async fn enqueue_all(store: &dyn ObjectStore, queue: &WorkQueue) -> Result<(), StoreError> {
    for plan in store.list_plans().await? {
        queue.add(plan.meta.key());
    }
    Ok(())
}
