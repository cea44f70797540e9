//! Layered error definitions
//!
//! Categorized by source: config / connector / storage / snapshot

use thiserror::Error;

use crate::ComponentId;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Connector Errors =====
    /// Connector used before a session was established
    #[error("connector '{connector}' is not connected")]
    ConnectorNotConnected { connector: String },

    /// Transport failure underneath a connector
    #[error("connector '{connector}' transport error: {message}")]
    ConnectorTransport { connector: String, message: String },

    /// Envelope could not be encoded/decoded
    #[error("connector '{connector}' codec error: {message}")]
    ConnectorCodec { connector: String, message: String },

    // ===== Storage Errors =====
    /// Snapshot write error
    #[error("storage '{storage}' write error: {message}")]
    StorageWrite { storage: String, message: String },

    /// Snapshot read error
    #[error("storage '{storage}' read error: {message}")]
    StorageRead { storage: String, message: String },

    // ===== Snapshot / State Errors =====
    /// Snapshot document is structurally malformed
    #[error("snapshot parse error: {message}")]
    SnapshotParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A state record violated an invariant
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Optimization objective outside the supported set
    #[error("unknown optimization objective '{name}'")]
    UnknownObjective { name: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create connector transport error
    pub fn connector_transport(connector: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectorTransport {
            connector: connector.into(),
            message: message.into(),
        }
    }

    /// Create connector not-connected error
    pub fn not_connected(connector: impl Into<String>) -> Self {
        Self::ConnectorNotConnected {
            connector: connector.into(),
        }
    }

    /// Create connector codec error
    pub fn connector_codec(connector: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectorCodec {
            connector: connector.into(),
            message: message.into(),
        }
    }

    /// Create storage write error
    pub fn storage_write(storage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StorageWrite {
            storage: storage.into(),
            message: message.into(),
        }
    }

    /// Create storage read error
    pub fn storage_read(storage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StorageRead {
            storage: storage.into(),
            message: message.into(),
        }
    }

    /// Create snapshot parse error
    pub fn snapshot_parse(message: impl Into<String>) -> Self {
        Self::SnapshotParse {
            message: message.into(),
            source: None,
        }
    }
}

/// Record invariant violations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// NaN or infinite value
    #[error("component '{component_id}': field '{field}' is not finite")]
    NonFinite {
        component_id: ComponentId,
        field: String,
    },

    /// Signal level outside the configured realistic range
    #[error("component '{component_id}': signal level {value} dBm outside [{min}, {max}]")]
    SignalOutOfRange {
        component_id: ComponentId,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("component '{component_id}': latency {value} ms is negative")]
    NegativeLatency { component_id: ComponentId, value: f64 },

    #[error("component '{component_id}': packet loss {value} outside [0, 1]")]
    PacketLossOutOfRange { component_id: ComponentId, value: f64 },
}

impl ValidationError {
    pub fn non_finite(component_id: &ComponentId, field: impl Into<String>) -> Self {
        Self::NonFinite {
            component_id: component_id.clone(),
            field: field.into(),
        }
    }

    /// Component the rejected record belonged to
    pub fn component_id(&self) -> &ComponentId {
        match self {
            Self::NonFinite { component_id, .. }
            | Self::SignalOutOfRange { component_id, .. }
            | Self::NegativeLatency { component_id, .. }
            | Self::PacketLossOutOfRange { component_id, .. } => component_id,
        }
    }
}
