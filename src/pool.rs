//! Unordered pool of batches awaiting transformation.

use crossbeam_queue::SegQueue;

use crate::batch::Batch;

/// Thread-safe multi-producer/multi-consumer container for untransformed
/// batches. No ordering guarantee: any worker may take any batch.
///
/// Capacity is advisory. [`WorkPool::put`] always succeeds; the reader role
/// enforces the backpressure limit by checking [`WorkPool::len`] before
/// producing, so the pool itself never rejects work.
#[derive(Debug, Default)]
pub struct WorkPool {
    queue: SegQueue<Batch>,
}

impl WorkPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        WorkPool {
            queue: SegQueue::new(),
        }
    }

    /// Add a batch. Never fails and never blocks.
    pub fn put(&self, batch: Batch) {
        self.queue.push(batch);
    }

    /// Non-blocking attempt to take an arbitrary batch.
    ///
    /// Returns `None` when the pool is empty. Each batch is handed to exactly
    /// one caller.
    pub fn take(&self) -> Option<Batch> {
        self.queue.pop()
    }

    /// Approximate number of pending batches.
    ///
    /// Only used for backpressure heuristics; concurrent puts and takes may
    /// make the value stale by the time the caller acts on it.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True when no batches are pending.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
