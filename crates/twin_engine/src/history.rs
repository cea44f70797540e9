//! Per-component bounded history buffer.
//!
//! Backed by a heap ring buffer: pushing into a full buffer overwrites the
//! oldest record, so length never exceeds capacity.

use std::fmt;

use contracts::ComponentState;
use ringbuf::{traits::*, HeapRb};

/// Bounded FIFO of past records for one component, oldest first
pub struct HistoryBuffer {
    ring: HeapRb<ComponentState>,
    capacity: usize,
    evicted_count: u64,
}

impl fmt::Debug for HistoryBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryBuffer")
            .field("len", &self.ring.occupied_len())
            .field("capacity", &self.capacity)
            .field("evicted", &self.evicted_count)
            .finish()
    }
}

impl HistoryBuffer {
    /// Create a buffer holding at most `capacity` records (at least one)
    #[inline]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: HeapRb::new(capacity),
            capacity,
            evicted_count: 0,
        }
    }

    /// Append a record, evicting the oldest when full
    #[inline]
    pub fn push(&mut self, record: ComponentState) {
        if self.ring.push_overwrite(record).is_some() {
            self.evicted_count += 1;
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ring.occupied_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records dropped because the buffer was full
    #[inline]
    pub fn evicted_count(&self) -> u64 {
        self.evicted_count
    }

    /// Iterate oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &ComponentState> {
        self.ring.iter()
    }

    /// Copy of the contents, oldest to newest
    pub fn to_vec(&self) -> Vec<ComponentState> {
        self.ring.iter().cloned().collect()
    }
}
