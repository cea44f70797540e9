//! # Contracts
//!
//! Frozen interface contracts shared by every twin crate: component state
//! records, prediction/optimization result types, the connector and storage
//! capabilities, and the configuration blueprint.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - `Timestamp` is an integer tick count (nanoseconds)
//! - Records for one component are expected in non-decreasing timestamp order

mod anomaly;
mod blueprint;
mod callback;
mod component;
mod component_id;
mod connector;
mod cycle;
mod engine_config;
mod error;
mod prediction;
mod scenario;
mod snapshot;
mod storage;

pub use anomaly::*;
pub use blueprint::*;
pub use callback::{AnomalyCallback, StateChangeCallback};
pub use component::*;
pub use component_id::ComponentId;
pub use connector::{Connector, LocalConnector};
pub use cycle::CycleReport;
pub use engine_config::*;
pub use error::*;
pub use prediction::*;
pub use scenario::*;
pub use snapshot::*;
pub use storage::{LocalSnapshotStorage, SnapshotStorage};
