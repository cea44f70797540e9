//! Storage error types

use thiserror::Error;

/// Storage-specific errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Storage creation error
    #[error("failed to create storage '{name}': {message}")]
    Creation { name: String, message: String },

    /// Error from a shared contract
    #[error("storage error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Create a storage creation error
    pub fn creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Creation {
            name: name.into(),
            message: message.into(),
        }
    }
}
