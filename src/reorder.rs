//! Reordering buffer that restores input order from out-of-order completions.

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::batch::Batch;
use crate::{PipelineError, PipelineResult};

/// Concurrent min-priority structure keyed by batch offset.
///
/// Workers push converted batches in arbitrary completion order; the writer
/// extracts them strictly by ascending offset. Backed by an ordered map under
/// a read/write lock: peeks may overlap each other, mutations are exclusive.
///
/// There is no capacity bound. A sink that drains slower than the workers
/// produce grows this buffer without limit; bounding it would deadlock the
/// writer when the next expected offset is still in flight.
#[derive(Debug, Default)]
pub struct ReorderBuffer {
    inner: RwLock<BTreeMap<u64, Batch>>,
}

impl ReorderBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        ReorderBuffer {
            inner: RwLock::new(BTreeMap::new()),
        }
    }

    /// Insert a batch, keyed by its offset.
    ///
    /// Offsets are unique by construction (a single reader assigns them), so
    /// a duplicate indicates a misbehaving caller; the duplicate is dropped
    /// silently rather than replacing the batch already buffered.
    pub fn push(&self, batch: Batch) {
        let mut map = self.inner.write().unwrap();
        map.entry(batch.offset()).or_insert(batch);
    }

    /// Offset of the minimum buffered batch, without removing it.
    ///
    /// Takes the shared lock: concurrent peeks do not block each other.
    pub fn peek_min(&self) -> Option<u64> {
        self.inner.read().unwrap().keys().next().copied()
    }

    /// Remove and return the minimum-offset batch.
    ///
    /// Fails with [`PipelineError::EmptyBuffer`] when the buffer is empty;
    /// the hot loop uses the non-failing [`ReorderBuffer::try_pop_min`]
    /// instead.
    pub fn pop_min(&self) -> PipelineResult<Batch> {
        self.try_pop_min().ok_or(PipelineError::EmptyBuffer)
    }

    /// Remove and return the minimum-offset batch, or `None` when empty.
    pub fn try_pop_min(&self) -> Option<Batch> {
        let mut map = self.inner.write().unwrap();
        let offset = *map.keys().next()?;
        map.remove(&offset)
    }

    /// Whether a batch with the given offset is buffered.
    pub fn contains(&self, offset: u64) -> bool {
        self.inner.read().unwrap().contains_key(&offset)
    }

    /// Number of buffered batches.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    /// True when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }

    /// Snapshot of buffered offsets in ascending order, for diagnostics.
    pub fn offsets(&self) -> Vec<u64> {
        self.inner.read().unwrap().keys().copied().collect()
    }
}
