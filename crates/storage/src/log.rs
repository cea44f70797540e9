//! LogStorage - logs a snapshot summary via tracing

use contracts::{ContractError, SnapshotStorage, TwinSnapshot};
use tracing::{info, instrument};

/// Storage that only logs; keeps the last snapshot in memory
pub struct LogStorage {
    name: String,
    last: Option<TwinSnapshot>,
}

impl LogStorage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last: None,
        }
    }

    fn log_summary(&self, snapshot: &TwinSnapshot) {
        let mean_latency = if snapshot.components.is_empty() {
            0.0
        } else {
            snapshot.components.values().map(|c| c.latency).sum::<f64>()
                / snapshot.components.len() as f64
        };
        info!(
            storage = %self.name,
            timestamp = %snapshot.timestamp,
            components = snapshot.active_components,
            mean_latency_ms = mean_latency,
            "Twin snapshot"
        );
    }
}

impl SnapshotStorage for LogStorage {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "log_storage_persist", skip(self, snapshot), fields(storage = %self.name))]
    async fn persist(&mut self, snapshot: &TwinSnapshot) -> Result<(), ContractError> {
        self.log_summary(snapshot);
        self.last = Some(snapshot.clone());
        Ok(())
    }

    async fn load_latest(&mut self) -> Result<Option<TwinSnapshot>, ContractError> {
        Ok(self.last.clone())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ComponentState, Timestamp};

    #[tokio::test]
    async fn test_log_storage_keeps_last() {
        let mut storage = LogStorage::new("my_logger");
        assert_eq!(storage.name(), "my_logger");
        assert!(storage.load_latest().await.unwrap().is_none());

        let snapshot = TwinSnapshot::from_records(
            Timestamp::from_millis(3),
            [ComponentState::new("a", Timestamp::from_millis(3)).with_latency(4.0)],
        );
        storage.persist(&snapshot).await.unwrap();
        assert_eq!(storage.load_latest().await.unwrap(), Some(snapshot));
    }
}
