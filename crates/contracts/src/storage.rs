//! SnapshotStorage trait - where the sync loop persists snapshots

use crate::{ContractError, TwinSnapshot};

/// Snapshot persistence
///
/// All storage implementations must implement this trait.
#[trait_variant::make(SnapshotStorage: Send)]
pub trait LocalSnapshotStorage {
    /// Storage name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Persist one snapshot
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn persist(&mut self, snapshot: &TwinSnapshot) -> Result<(), ContractError>;

    /// Most recently persisted snapshot, if any
    async fn load_latest(&mut self) -> Result<Option<TwinSnapshot>, ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;
}
