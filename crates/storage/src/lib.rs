//! # Storage
//!
//! 快照持久化模块。
//!
//! 负责：
//! - 将 `TwinSnapshot` 写入磁盘（JSON / bincode，带时间戳的文件 + `latest`）
//! - 按 `max_files` 清理旧快照
//! - 读取最近一次快照用于恢复

mod any;
mod error;
mod file;
mod log;
mod metrics;

pub use any::AnyStorage;
pub use contracts::{SnapshotStorage, TwinSnapshot};
pub use error::StorageError;
pub use file::{FileStorage, FileStorageConfig, SnapshotFormat};
pub use log::LogStorage;
pub use metrics::{StorageMetrics, StorageMetricsSnapshot};
