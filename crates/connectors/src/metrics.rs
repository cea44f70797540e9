//! Per-connector traffic counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Connector metrics
#[derive(Debug, Default)]
pub struct ConnectorMetrics {
    /// Records handed to the twin by `pull_state`
    pub states_pulled: AtomicU64,

    /// Records sent by `push_state`
    pub states_pushed: AtomicU64,

    /// Commands sent
    pub commands_sent: AtomicU64,

    /// Messages dropped because a queue was full or lagged
    pub dropped: AtomicU64,

    /// Messages that failed to encode or decode
    pub codec_errors: AtomicU64,
}

impl ConnectorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pulled(&self, connector: &str) {
        self.states_pulled.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("twin_connector_messages_total", "connector" => connector.to_string(), "direction" => "pull")
            .increment(1);
    }

    pub fn record_pushed(&self, connector: &str) {
        self.states_pushed.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("twin_connector_messages_total", "connector" => connector.to_string(), "direction" => "push")
            .increment(1);
    }

    pub fn record_command(&self) {
        self.commands_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, count: u64) {
        self.dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_codec_error(&self) {
        self.codec_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> ConnectorMetricsSnapshot {
        ConnectorMetricsSnapshot {
            states_pulled: self.states_pulled.load(Ordering::Relaxed),
            states_pushed: self.states_pushed.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            codec_errors: self.codec_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ConnectorMetrics`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectorMetricsSnapshot {
    pub states_pulled: u64,
    pub states_pushed: u64,
    pub commands_sent: u64,
    pub dropped: u64,
    pub codec_errors: u64,
}
