//! CycleReport - outcome of one synchronization cycle

use serde::{Deserialize, Serialize};

use crate::AggregateMetrics;

/// What one cycle of the sync loop did
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Monotonic cycle number, starting at 1
    pub cycle: u64,
    /// Records pulled and accepted by the store
    pub pulled: usize,
    /// Records pulled but rejected by validation
    pub rejected: usize,
    /// Records pushed outward
    pub pushed: usize,
    /// Connectors skipped because they were not connected
    pub skipped_connectors: Vec<String>,
    /// Connectors that failed during this cycle
    pub failed_connectors: Vec<String>,
    /// Components flagged by the anomaly pass (0 when disabled)
    pub anomalies: usize,
    /// Aggregate metrics recomputed at the end of the cycle
    pub metrics: AggregateMetrics,
    /// `None` without storage, otherwise whether the snapshot was persisted
    pub persisted: Option<bool>,
    /// Wall time spent in the cycle (ms)
    pub duration_ms: f64,
}

impl CycleReport {
    pub fn had_failures(&self) -> bool {
        !self.failed_connectors.is_empty() || self.persisted == Some(false)
    }
}
