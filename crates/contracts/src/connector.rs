//! Connector trait - how the twin exchanges state with the physical system
//!
//! Variants (request/response, publish/subscribe, in-process loopback) live
//! in the `connectors` crate; the sync loop only sees this capability.

use bytes::Bytes;

use crate::{ComponentState, ContractError};

/// State exchange capability
///
/// Futures are `Send` so a connector can be driven from the sync loop task.
#[trait_variant::make(Connector: Send)]
pub trait LocalConnector {
    /// Connector name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Establish a session with `endpoint`
    ///
    /// Idempotent: calling it while connected returns `true` without
    /// reconnecting. Returns whether the connector is connected afterwards.
    async fn connect(&mut self, endpoint: &str) -> bool;

    fn is_connected(&self) -> bool;

    /// Send the twin's current record for one component outward
    ///
    /// # Errors
    /// Not connected, or transport/codec failure.
    async fn push_state(&mut self, state: &ComponentState) -> Result<(), ContractError>;

    /// Receive the next pending record, `None` when nothing is pending
    ///
    /// # Errors
    /// Not connected, or transport/codec failure.
    async fn pull_state(&mut self) -> Result<Option<ComponentState>, ContractError>;

    /// Send an opaque command payload
    async fn send_command(&mut self, payload: Bytes) -> Result<(), ContractError>;

    /// Tear the session down; further I/O fails until `connect` is called again
    async fn disconnect(&mut self);
}
