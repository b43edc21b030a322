use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::worker::Worker;

/// LIFO store of idle workers.
///
/// `insert` stamps `last_used` while the caller holds the stack, so `items`
/// is ordered by `last_used_time` from oldest to newest and expired workers
/// form a prefix.
#[derive(Debug, Default)]
pub(crate) struct WorkerStack {
    items: Vec<Arc<Worker>>,
}

impl WorkerStack {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn insert(&mut self, worker: Arc<Worker>) {
        worker.set_last_used(Instant::now());
        self.items.push(worker);
    }

    /// Takes the most recently used idle worker.
    pub(crate) fn detach(&mut self) -> Option<Arc<Worker>> {
        self.items.pop()
    }

    /// Removes and returns the workers idle for at least `expiry`.
    pub(crate) fn refresh(&mut self, expiry: Duration) -> Vec<Arc<Worker>> {
        let Some(deadline) = Instant::now().checked_sub(expiry) else {
            return Vec::new();
        };
        let stale = self
            .items
            .partition_point(|worker| worker.last_used_time() <= deadline);
        self.items.drain(..stale).collect()
    }

    /// Finishes every idle worker and empties the stack.
    pub(crate) fn reset(&mut self) -> usize {
        let count = self.items.len();
        for worker in self.items.drain(..) {
            worker.finish();
        }
        count
    }
}
