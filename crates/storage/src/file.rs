//! FileStorage - timestamped snapshot files plus a `latest` copy

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::DateTime;
use contracts::{ContractError, SnapshotStorage, TwinSnapshot};
use tracing::{debug, error, instrument, warn};

use crate::error::StorageError;
use crate::metrics::StorageMetrics;

const PREFIX: &str = "snapshot-";

/// On-disk encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotFormat {
    /// JSON (human-readable, larger)
    #[default]
    Json,
    /// Bincode (binary, compact)
    Bincode,
}

impl SnapshotFormat {
    pub fn extension(self) -> &'static str {
        match self {
            SnapshotFormat::Json => "json",
            SnapshotFormat::Bincode => "bin",
        }
    }
}

/// Configuration for FileStorage
#[derive(Debug, Clone)]
pub struct FileStorageConfig {
    /// Output directory
    pub path: PathBuf,
    pub format: SnapshotFormat,
    /// Timestamped files kept; `None` keeps everything
    pub max_files: Option<usize>,
}

impl FileStorageConfig {
    /// Create config from params map (`path`, `format`, `max_files`)
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, StorageError> {
        let path = params
            .get("path")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| StorageError::creation("file", "missing 'path' parameter"))?;

        let format = match params.get("format").map(String::as_str) {
            Some("bincode") => SnapshotFormat::Bincode,
            Some("json") | None => SnapshotFormat::Json,
            Some(other) => {
                return Err(StorageError::creation("file", format!("unknown format '{}'", other)));
            }
        };

        let max_files = match params.get("max_files") {
            None => None,
            Some(raw) => Some(
                raw.parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| {
                        StorageError::creation("file", format!("invalid max_files '{}'", raw))
                    })?,
            ),
        };

        Ok(Self {
            path,
            format,
            max_files,
        })
    }
}

/// Storage that writes snapshot files to a directory
pub struct FileStorage {
    name: String,
    config: FileStorageConfig,
    seq: u64,
    metrics: Arc<StorageMetrics>,
}

impl FileStorage {
    /// Create a new FileStorage, creating the directory if needed
    pub fn new(name: impl Into<String>, config: FileStorageConfig) -> std::io::Result<Self> {
        std::fs::create_dir_all(&config.path)?;
        Ok(Self {
            name: name.into(),
            config,
            seq: 0,
            metrics: Arc::new(StorageMetrics::new()),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        let name = name.into();
        let config = FileStorageConfig::from_params(params)?;
        Self::new(name.clone(), config).map_err(|e| StorageError::creation(name, e.to_string()))
    }

    pub fn metrics(&self) -> Arc<StorageMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn latest_path(&self) -> PathBuf {
        self.config
            .path
            .join(format!("latest.{}", self.config.format.extension()))
    }

    fn snapshot_path(&self, snapshot: &TwinSnapshot) -> PathBuf {
        let stamp = DateTime::from_timestamp_nanos(snapshot.timestamp.ticks())
            .format("%Y%m%dT%H%M%S%.6f");
        self.config.path.join(format!(
            "{}{}-{:06}.{}",
            PREFIX,
            stamp,
            self.seq,
            self.config.format.extension()
        ))
    }

    fn encode(&self, snapshot: &TwinSnapshot) -> Result<Vec<u8>, ContractError> {
        match self.config.format {
            SnapshotFormat::Json => serde_json::to_vec_pretty(snapshot).map_err(|e| e.to_string()),
            SnapshotFormat::Bincode => bincode::serialize(snapshot).map_err(|e| e.to_string()),
        }
        .map_err(|e| ContractError::storage_write(&self.name, e))
    }

    fn decode(&self, data: &[u8]) -> Result<TwinSnapshot, ContractError> {
        match self.config.format {
            SnapshotFormat::Json => serde_json::from_slice(data).map_err(|e| e.to_string()),
            SnapshotFormat::Bincode => bincode::deserialize(data).map_err(|e| e.to_string()),
        }
        .map_err(|e| ContractError::storage_read(&self.name, e))
    }

    async fn write_files(&self, path: &Path, data: &[u8]) -> std::io::Result<()> {
        tokio::fs::write(path, data).await?;

        let latest = self.latest_path();
        let tmp = latest.with_extension("tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &latest).await
    }

    /// Timestamped snapshot files, oldest first
    pub async fn list_snapshots(&self) -> std::io::Result<Vec<PathBuf>> {
        let ext = self.config.format.extension();
        let mut files = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.config.path).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            let matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(PREFIX))
                && path.extension().and_then(|e| e.to_str()) == Some(ext);
            if matches {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    async fn prune(&self) -> std::io::Result<usize> {
        let Some(max_files) = self.config.max_files else {
            return Ok(0);
        };
        let files = self.list_snapshots().await?;
        let excess = files.len().saturating_sub(max_files);
        for old in &files[..excess] {
            tokio::fs::remove_file(old).await?;
        }
        Ok(excess)
    }
}

impl SnapshotStorage for FileStorage {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_storage_persist",
        skip(self, snapshot),
        fields(storage = %self.name, components = snapshot.active_components)
    )]
    async fn persist(&mut self, snapshot: &TwinSnapshot) -> Result<(), ContractError> {
        self.seq += 1;
        let data = self.encode(snapshot).inspect_err(|_| self.metrics.record_failure())?;
        let path = self.snapshot_path(snapshot);

        if let Err(e) = self.write_files(&path, &data).await {
            self.metrics.record_failure();
            error!(storage = %self.name, path = %path.display(), error = %e, "Write failed");
            return Err(ContractError::storage_write(&self.name, e.to_string()));
        }
        self.metrics.record_persisted(data.len());
        debug!(storage = %self.name, path = %path.display(), bytes = data.len(), "Snapshot written");

        match self.prune().await {
            Ok(0) => {}
            Ok(removed) => {
                self.metrics.record_pruned(removed);
                debug!(storage = %self.name, removed, "Old snapshots pruned");
            }
            Err(e) => warn!(storage = %self.name, error = %e, "Pruning failed"),
        }
        Ok(())
    }

    #[instrument(name = "file_storage_load_latest", skip(self), fields(storage = %self.name))]
    async fn load_latest(&mut self) -> Result<Option<TwinSnapshot>, ContractError> {
        match tokio::fs::read(self.latest_path()).await {
            Ok(data) => self.decode(&data).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ContractError::storage_read(&self.name, e.to_string())),
        }
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}
