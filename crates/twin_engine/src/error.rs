//! Twin engine error types

use contracts::{ContractError, ValidationError};
use thiserror::Error;

/// Twin-engine-specific errors
#[derive(Debug, Error)]
pub enum TwinError {
    /// Engine configuration failed validation at construction
    #[error("invalid twin configuration: {0}")]
    Config(#[source] ContractError),

    /// A record violated an invariant and was not stored
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Snapshot document could not be parsed; nothing was applied
    #[error("snapshot import failed: {message}")]
    SnapshotParse {
        message: String,
        #[source]
        source: ContractError,
    },

    /// Error from a shared contract
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl TwinError {
    pub(crate) fn snapshot_parse(source: ContractError) -> Self {
        Self::SnapshotParse {
            message: source.to_string(),
            source,
        }
    }
}
