//! # Connectors
//!
//! Transport adapters between the twin and the physical system.
//!
//! Responsibilities:
//! - `RequestResponseConnector`: UDP datagrams, JSON or bincode envelope
//! - `PubSubConnector`: topic broker on tokio broadcast channels
//! - `MemoryConnector`: in-process loopback with failure injection
//! - `TelemetrySimulator`: random-walk telemetry fed through a loopback
//! - `ConnectorFactory`: `ConnectorConfig` → `AnyConnector`
//!
//! ## Usage Example
//!
//! ```ignore
//! use connectors::ConnectorFactory;
//!
//! let factory = ConnectorFactory::default();
//! for config in &blueprint.connectors {
//!     let built = factory.build(config)?;
//!     if let Some(source) = built.source {
//!         source.spawn();
//!     }
//!     sync_loop
//!         .register_connector(RegisteredConnector::new(built.endpoint, built.direction, built.connector))
//!         .await;
//! }
//! ```
//!
//! ## Loopback Testing
//!
//! ```ignore
//! use connectors::memory_pair;
//!
//! let (connector, peer) = memory_pair("mem", 64);
//! peer.offer(state);
//! ```

mod any;
mod error;
mod memory;
mod metrics;
mod pubsub;
mod request_response;
mod simulator;
mod wire;

pub use any::{AnyConnector, BuiltConnector, ConnectorFactory, SimulatedSource};
pub use error::{ConnectorError, Result};
pub use memory::{memory_pair, MemoryConnector, MemoryPeer};
pub use metrics::{ConnectorMetrics, ConnectorMetricsSnapshot};
pub use pubsub::{
    command_topic, telemetry_topic, twin_topic, BrokerMessage, PubSubBroker, PubSubConnector,
    DEFAULT_TOPIC_CAPACITY,
};
pub use request_response::{RequestResponseConfig, RequestResponseConnector};
pub use simulator::{SimulatorConfig, SimulatorHandle, TelemetrySimulator};
pub use wire::{WireCodec, WireMessage, MAX_DATAGRAM};
