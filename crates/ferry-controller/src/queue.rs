//! Deduplicating work queue
//!
//! Invariants:
//! - a key waits in the queue at most once
//! - a key is handed to at most one worker at a time
//! - a key added while a worker holds it is queued again on [`WorkQueue::done`]

use ferry_api::ObjectKey;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct State {
    ready: VecDeque<ObjectKey>,
    queued: HashSet<ObjectKey>,
    active: HashSet<ObjectKey>,
    dirty: HashSet<ObjectKey>,
    shutdown: bool,
}

/// Plan key queue shared by workers
#[derive(Debug, Default)]
pub struct WorkQueue {
    state: Mutex<State>,
    notify: Notify,
}

impl WorkQueue {
    /// Create new queue
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a key
    pub fn add(&self, key: ObjectKey) {
        let mut state = self.state.lock();
        if state.shutdown {
            return;
        }
        if state.active.contains(&key) {
            state.dirty.insert(key);
            return;
        }
        if state.queued.insert(key.clone()) {
            state.ready.push_back(key);
            drop(state);
            self.notify.notify_one();
        }
    }

    /// Queue a key after a delay
    pub fn add_after(self: &Arc<Self>, key: ObjectKey, delay: Duration) {
        if delay.is_zero() {
            self.add(key);
            return;
        }
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(key);
        });
    }

    /// Wait for the next key
    ///
    /// # Returns
    /// `None` once the queue is shut down.
    pub async fn next(&self) -> Option<ObjectKey> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if state.shutdown {
                    return None;
                }
                if let Some(key) = state.ready.pop_front() {
                    state.queued.remove(&key);
                    state.active.insert(key.clone());
                    return Some(key);
                }
            }

            notified.await;
        }
    }

    /// Release a key taken with [`WorkQueue::next`]
    pub fn done(&self, key: &ObjectKey) {
        let mut state = self.state.lock();
        state.active.remove(key);
        if state.dirty.remove(key) && !state.shutdown && state.queued.insert(key.clone()) {
            state.ready.push_back(key.clone());
            drop(state);
            self.notify.notify_one();
        }
    }

    /// Stop handing out keys and wake every waiting worker
    pub fn shutdown(&self) {
        self.state.lock().shutdown = true;
        self.notify.notify_waiters();
    }

    /// Keys waiting to be handed out
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().ready.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(name: &str) -> ObjectKey {
        ObjectKey::new("ns", name)
    }

    #[tokio::test]
    async fn deduplicates_waiting_keys() {
        let queue = WorkQueue::new();
        queue.add(key("a"));
        queue.add(key("a"));
        queue.add(key("b"));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.next().await, Some(key("a")));
        assert_eq!(queue.next().await, Some(key("b")));
    }

    #[tokio::test]
    async fn active_key_requeued_on_done() {
        let queue = WorkQueue::new();
        queue.add(key("a"));
        let taken = queue.next().await.unwrap();

        queue.add(key("a"));
        assert!(queue.is_empty());

        queue.done(&taken);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.next().await, Some(key("a")));
    }

    #[tokio::test]
    async fn done_without_readd_clears() {
        let queue = WorkQueue::new();
        queue.add(key("a"));
        let taken = queue.next().await.unwrap();
        queue.done(&taken);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn shutdown_wakes_waiters() {
        let queue = Arc::new(WorkQueue::new());
        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.next().await })
        };
        tokio::task::yield_now().await;
        queue.shutdown();
        assert_eq!(waiter.await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn add_after_delays() {
        let queue = Arc::new(WorkQueue::new());
        queue.add_after(key("a"), Duration::from_millis(500));
        tokio::task::yield_now().await;
        assert!(queue.is_empty());

        tokio::time::sleep(Duration::from_millis(501)).await;
        assert_eq!(queue.len(), 1);
    }
}
