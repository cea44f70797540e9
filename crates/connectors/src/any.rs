//! AnyConnector - enum dispatch over concrete connectors and the factory
//! building them from `ConnectorConfig`.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use contracts::{ComponentState, Connector, ConnectorConfig, ConnectorKind, ContractError, SyncDirection};
use tracing::{info, instrument};

use crate::error::{ConnectorError, Result};
use crate::memory::{memory_pair, MemoryConnector, MemoryPeer};
use crate::metrics::ConnectorMetrics;
use crate::pubsub::{PubSubBroker, PubSubConnector};
use crate::request_response::{RequestResponseConfig, RequestResponseConnector};
use crate::simulator::{SimulatorConfig, SimulatorHandle, TelemetrySimulator};

/// Default loopback queue for simulated connectors
const DEFAULT_SIM_QUEUE: usize = 1024;

/// Any connector the configuration can name
pub enum AnyConnector {
    RequestResponse(RequestResponseConnector),
    PubSub(PubSubConnector),
    Memory(MemoryConnector),
}

impl AnyConnector {
    pub fn kind(&self) -> &'static str {
        match self {
            AnyConnector::RequestResponse(_) => "request_response",
            AnyConnector::PubSub(_) => "pub_sub",
            AnyConnector::Memory(_) => "memory",
        }
    }

    pub fn metrics(&self) -> Arc<ConnectorMetrics> {
        match self {
            AnyConnector::RequestResponse(c) => c.metrics(),
            AnyConnector::PubSub(c) => c.metrics(),
            AnyConnector::Memory(c) => c.metrics(),
        }
    }
}

impl From<RequestResponseConnector> for AnyConnector {
    fn from(c: RequestResponseConnector) -> Self {
        AnyConnector::RequestResponse(c)
    }
}

impl From<PubSubConnector> for AnyConnector {
    fn from(c: PubSubConnector) -> Self {
        AnyConnector::PubSub(c)
    }
}

impl From<MemoryConnector> for AnyConnector {
    fn from(c: MemoryConnector) -> Self {
        AnyConnector::Memory(c)
    }
}

impl Connector for AnyConnector {
    fn name(&self) -> &str {
        match self {
            AnyConnector::RequestResponse(c) => c.name(),
            AnyConnector::PubSub(c) => c.name(),
            AnyConnector::Memory(c) => c.name(),
        }
    }

    async fn connect(&mut self, endpoint: &str) -> bool {
        match self {
            AnyConnector::RequestResponse(c) => c.connect(endpoint).await,
            AnyConnector::PubSub(c) => c.connect(endpoint).await,
            AnyConnector::Memory(c) => c.connect(endpoint).await,
        }
    }

    fn is_connected(&self) -> bool {
        match self {
            AnyConnector::RequestResponse(c) => c.is_connected(),
            AnyConnector::PubSub(c) => c.is_connected(),
            AnyConnector::Memory(c) => c.is_connected(),
        }
    }

    async fn push_state(&mut self, state: &ComponentState) -> std::result::Result<(), ContractError> {
        match self {
            AnyConnector::RequestResponse(c) => c.push_state(state).await,
            AnyConnector::PubSub(c) => c.push_state(state).await,
            AnyConnector::Memory(c) => c.push_state(state).await,
        }
    }

    async fn pull_state(&mut self) -> std::result::Result<Option<ComponentState>, ContractError> {
        match self {
            AnyConnector::RequestResponse(c) => c.pull_state().await,
            AnyConnector::PubSub(c) => c.pull_state().await,
            AnyConnector::Memory(c) => c.pull_state().await,
        }
    }

    async fn send_command(&mut self, payload: Bytes) -> std::result::Result<(), ContractError> {
        match self {
            AnyConnector::RequestResponse(c) => c.send_command(payload).await,
            AnyConnector::PubSub(c) => c.send_command(payload).await,
            AnyConnector::Memory(c) => c.send_command(payload).await,
        }
    }

    async fn disconnect(&mut self) {
        match self {
            AnyConnector::RequestResponse(c) => c.disconnect().await,
            AnyConnector::PubSub(c) => c.disconnect().await,
            AnyConnector::Memory(c) => c.disconnect().await,
        }
    }
}

/// Simulator plus the loopback peer it feeds
pub struct SimulatedSource {
    pub simulator: TelemetrySimulator,
    pub peer: MemoryPeer,
}

impl SimulatedSource {
    /// Start feeding the connector on a tokio task
    pub fn spawn(self) -> SimulatorHandle {
        self.simulator.spawn(self.peer)
    }
}

/// A connector built from configuration
pub struct BuiltConnector {
    pub name: String,
    pub endpoint: String,
    pub direction: SyncDirection,
    pub connector: AnyConnector,
    /// Present for the `simulated` kind
    pub source: Option<SimulatedSource>,
}

/// Builds connectors; pub/sub connectors share the factory's broker
#[derive(Debug, Clone, Default)]
pub struct ConnectorFactory {
    broker: PubSubBroker,
}

impl ConnectorFactory {
    pub fn new(broker: PubSubBroker) -> Self {
        Self { broker }
    }

    pub fn broker(&self) -> &PubSubBroker {
        &self.broker
    }

    #[instrument(
        name = "connector_factory_build",
        skip(self, config),
        fields(connector = %config.name, kind = config.kind.as_str())
    )]
    pub fn build(&self, config: &ConnectorConfig) -> Result<BuiltConnector> {
        let name = config.name.as_str();
        let (connector, source): (AnyConnector, Option<SimulatedSource>) = match config.kind {
            ConnectorKind::RequestResponse => {
                let rr = RequestResponseConfig::from_params(name, &config.params)?;
                (RequestResponseConnector::new(name, rr).into(), None)
            }
            ConnectorKind::PubSub => {
                let broker = match positive(config, "capacity")? {
                    Some(capacity) => self.broker.with_topic_capacity(capacity),
                    None => self.broker.clone(),
                };
                (PubSubConnector::new(name, broker).into(), None)
            }
            ConnectorKind::Simulated => {
                let sim = simulator_config(config)?;
                let queue = positive(config, "queue")?.unwrap_or(DEFAULT_SIM_QUEUE);
                let (connector, peer) = memory_pair(name, queue);
                let source = SimulatedSource {
                    simulator: TelemetrySimulator::new(sim),
                    peer,
                };
                (connector.into(), Some(source))
            }
        };

        info!(connector = %name, kind = config.kind.as_str(), endpoint = %config.endpoint, "Connector built");
        Ok(BuiltConnector {
            name: config.name.clone(),
            endpoint: config.endpoint.clone(),
            direction: config.direction,
            connector,
            source,
        })
    }
}

fn positive(config: &ConnectorConfig, key: &str) -> Result<Option<usize>> {
    match config.params.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<usize>()
            .ok()
            .filter(|v| *v > 0)
            .map(Some)
            .ok_or_else(|| {
                ConnectorError::invalid_param(&config.name, key, format!("'{}' is not a positive integer", raw))
            }),
    }
}

fn simulator_config(config: &ConnectorConfig) -> Result<SimulatorConfig> {
    let defaults = SimulatorConfig::default();
    let components = positive(config, "components")?.unwrap_or(defaults.components);
    let spike_probability = match config.params.get("spike_probability") {
        None => defaults.spike_probability,
        Some(raw) => raw
            .parse::<f64>()
            .ok()
            .filter(|p| (0.0..=1.0).contains(p))
            .ok_or_else(|| {
                ConnectorError::invalid_param(&config.name, "spike_probability", format!("'{}' is not in [0, 1]", raw))
            })?,
    };
    let seed = match config.params.get("seed") {
        None => None,
        Some(raw) => Some(raw.parse::<u64>().map_err(|e| {
            ConnectorError::invalid_param(&config.name, "seed", e.to_string())
        })?),
    };

    Ok(SimulatorConfig {
        prefix: config.endpoint.clone(),
        components,
        batch: positive(config, "batch")?.unwrap_or(components),
        interval: positive(config, "interval_ms")?
            .map(|ms| Duration::from_millis(ms as u64))
            .unwrap_or(defaults.interval),
        spike_probability,
        seed,
    })
}
