//! Subscriber callback types
//!
//! Callbacks are invoked synchronously, after the store lock is released, in
//! registration order. Uses `Arc` so one callback can be registered in
//! several places.

use std::sync::Arc;

use crate::{AnomalyRecord, ComponentState};

/// Invoked with the new record after each significant update
pub type StateChangeCallback = Arc<dyn Fn(&ComponentState) + Send + Sync>;

/// Invoked for each flagged component after an anomaly pass
pub type AnomalyCallback = Arc<dyn Fn(&AnomalyRecord) + Send + Sync>;
