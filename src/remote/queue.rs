//! Work queue with drain detection
//!
//! A blocking multi-producer/multi-consumer FIFO where "picked up" and
//! "finished" are separate events: consumers call [`WorkQueue::task_done`]
//! after processing, and [`WorkQueue::join`] unblocks only once every
//! enqueued item has been both dequeued and acknowledged. That lets the
//! coordinator wait for true batch completion, in-flight remote calls
//! included, rather than mere queue emptiness.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

struct QueueState<T> {
    items: VecDeque<T>,
    /// Enqueued but not yet acknowledged via task_done()
    outstanding: usize,
}

/// Async FIFO with task acknowledgment
pub struct WorkQueue<T> {
    state: Mutex<QueueState<T>>,
    item_ready: Notify,
    drained: Notify,
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                outstanding: 0,
            }),
            item_ready: Notify::new(),
            drained: Notify::new(),
        }
    }

    /// Enqueue an item; it counts as outstanding until acknowledged
    pub fn put(&self, item: T) {
        {
            let mut state = self.state.lock();
            state.items.push_back(item);
            state.outstanding += 1;
        }
        self.item_ready.notify_one();
    }

    /// Dequeue the next item, waiting until one is available
    pub async fn get(&self) -> T {
        loop {
            // Register for notification before re-checking, otherwise a put
            // between the check and the await is lost.
            let notified = self.item_ready.notified();
            if let Some(item) = self.state.lock().items.pop_front() {
                return item;
            }
            notified.await;
        }
    }

    /// Acknowledge one previously dequeued item
    pub fn task_done(&self) {
        let drained = {
            let mut state = self.state.lock();
            state.outstanding = state
                .outstanding
                .checked_sub(1)
                .expect("task_done() called more times than put()");
            state.outstanding == 0
        };
        if drained {
            self.drained.notify_waiters();
        }
    }

    /// Wait until every enqueued item has been dequeued and acknowledged.
    /// Returns immediately if nothing is outstanding.
    pub async fn join(&self) {
        loop {
            let notified = self.drained.notified();
            if self.state.lock().outstanding == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Items currently waiting in the queue (excluding in-flight ones)
    pub fn pending(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Items enqueued but not yet acknowledged
    pub fn outstanding(&self) -> usize {
        self.state.lock().outstanding
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fifo_order() {
        let q = WorkQueue::new();
        q.put(1);
        q.put(2);
        q.put(3);
        assert_eq!(q.get().await, 1);
        assert_eq!(q.get().await, 2);
        assert_eq!(q.get().await, 3);
    }

    #[tokio::test]
    async fn test_join_returns_immediately_when_empty() {
        let q: WorkQueue<u32> = WorkQueue::new();
        q.join().await;
    }

    #[tokio::test]
    async fn test_join_waits_for_acknowledgment() {
        let q = Arc::new(WorkQueue::new());
        q.put(7u32);

        let item = q.get().await;
        assert_eq!(item, 7);

        // Dequeued but not acknowledged: join must still block.
        let joined = tokio::time::timeout(Duration::from_millis(50), q.join()).await;
        assert!(joined.is_err());

        q.task_done();
        tokio::time::timeout(Duration::from_secs(1), q.join())
            .await
            .expect("join should return after task_done");
    }

    #[tokio::test]
    async fn test_all_items_processed_exactly_once() {
        const M: usize = 200;
        const W: usize = 7;

        let q = Arc::new(WorkQueue::new());
        let processed = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::new();
        for _ in 0..W {
            let q = q.clone();
            let processed = processed.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    let _item: usize = q.get().await;
                    tokio::task::yield_now().await;
                    processed.fetch_add(1, Ordering::SeqCst);
                    q.task_done();
                }
            }));
        }

        for i in 0..M {
            q.put(i);
        }
        tokio::time::timeout(Duration::from_secs(10), q.join())
            .await
            .expect("queue should drain");

        assert_eq!(processed.load(Ordering::SeqCst), M);
        assert_eq!(q.pending(), 0);
        assert_eq!(q.outstanding(), 0);

        for w in workers {
            w.abort();
        }
    }

    #[tokio::test]
    async fn test_get_blocks_until_put() {
        let q: Arc<WorkQueue<u32>> = Arc::new(WorkQueue::new());

        let waiter = {
            let q = q.clone();
            tokio::spawn(async move { q.get().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        q.put(42);

        let got = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, 42);
    }
}
