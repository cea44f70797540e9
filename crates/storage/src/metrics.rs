//! Storage metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one storage backend
#[derive(Debug, Default)]
pub struct StorageMetrics {
    /// Snapshots persisted
    persisted: AtomicU64,
    /// Persist failures
    failures: AtomicU64,
    /// Bytes written
    bytes_written: AtomicU64,
    /// Old snapshot files removed
    pruned: AtomicU64,
}

impl StorageMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn persisted(&self) -> u64 {
        self.persisted.load(Ordering::Relaxed)
    }

    pub fn record_persisted(&self, bytes: usize) {
        self.persisted.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pruned(&self, files: usize) {
        self.pruned.fetch_add(files as u64, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> StorageMetricsSnapshot {
        StorageMetricsSnapshot {
            persisted: self.persisted(),
            failures: self.failures(),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of storage metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageMetricsSnapshot {
    pub persisted: u64,
    pub failures: u64,
    pub bytes_written: u64,
    pub pruned: u64,
}
