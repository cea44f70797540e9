//! AnyStorage - storage backend selected by `StorageConfig`

use std::sync::Arc;

use contracts::{ContractError, SnapshotStorage, StorageConfig, StorageKind, TwinSnapshot};
use tracing::info;

use crate::error::StorageError;
use crate::file::FileStorage;
use crate::log::LogStorage;
use crate::metrics::StorageMetrics;

/// Any storage the configuration can name
pub enum AnyStorage {
    File(FileStorage),
    Log(LogStorage),
}

impl AnyStorage {
    /// Build the configured backend
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        let storage = match config.kind {
            StorageKind::File => AnyStorage::File(FileStorage::from_params("file", &config.params)?),
            StorageKind::Log => AnyStorage::Log(LogStorage::new("log")),
        };
        info!(storage = storage.name(), "Snapshot storage ready");
        Ok(storage)
    }

    /// Metrics for backends that keep them
    pub fn metrics(&self) -> Option<Arc<StorageMetrics>> {
        match self {
            AnyStorage::File(s) => Some(s.metrics()),
            AnyStorage::Log(_) => None,
        }
    }
}

impl SnapshotStorage for AnyStorage {
    fn name(&self) -> &str {
        match self {
            AnyStorage::File(s) => s.name(),
            AnyStorage::Log(s) => s.name(),
        }
    }

    async fn persist(&mut self, snapshot: &TwinSnapshot) -> Result<(), ContractError> {
        match self {
            AnyStorage::File(s) => s.persist(snapshot).await,
            AnyStorage::Log(s) => s.persist(snapshot).await,
        }
    }

    async fn load_latest(&mut self) -> Result<Option<TwinSnapshot>, ContractError> {
        match self {
            AnyStorage::File(s) => s.load_latest().await,
            AnyStorage::Log(s) => s.load_latest().await,
        }
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        match self {
            AnyStorage::File(s) => s.flush().await,
            AnyStorage::Log(s) => s.flush().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_from_config() {
        let dir = tempdir().unwrap();
        let file = AnyStorage::from_config(&StorageConfig {
            kind: StorageKind::File,
            params: HashMap::from([(
                "path".to_string(),
                dir.path().join("snaps").display().to_string(),
            )]),
        })
        .unwrap();
        assert_eq!(file.name(), "file");
        assert!(file.metrics().is_some());
        assert!(dir.path().join("snaps").is_dir());

        let log = AnyStorage::from_config(&StorageConfig {
            kind: StorageKind::Log,
            params: HashMap::new(),
        })
        .unwrap();
        assert_eq!(log.name(), "log");

        let missing = AnyStorage::from_config(&StorageConfig {
            kind: StorageKind::File,
            params: HashMap::new(),
        });
        assert!(matches!(missing, Err(StorageError::Creation { .. })));
    }
}
