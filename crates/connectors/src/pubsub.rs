//! PubSubConnector - in-process topic broker on tokio broadcast channels
//!
//! Topics per endpoint:
//! - `<endpoint>/telemetry`: published by producers, pulled by the twin
//! - `<endpoint>/twin`: twin records pushed outward
//! - `<endpoint>/commands`: control payloads

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use contracts::{ComponentState, Connector, ContractError};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, trace, warn};

use crate::metrics::ConnectorMetrics;

/// Default per-topic buffer
pub const DEFAULT_TOPIC_CAPACITY: usize = 1024;

/// Message carried on a topic
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerMessage {
    State(ComponentState),
    Command(Bytes),
}

pub fn telemetry_topic(endpoint: &str) -> String {
    format!("{}/telemetry", endpoint)
}

pub fn twin_topic(endpoint: &str) -> String {
    format!("{}/twin", endpoint)
}

pub fn command_topic(endpoint: &str) -> String {
    format!("{}/commands", endpoint)
}

/// Shared topic registry; clones see the same topics
#[derive(Debug, Clone)]
pub struct PubSubBroker {
    capacity: usize,
    topics: Arc<Mutex<HashMap<String, broadcast::Sender<BrokerMessage>>>>,
}

impl Default for PubSubBroker {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_CAPACITY)
    }
}

impl PubSubBroker {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Same topics; topics first created through the result get `capacity`
    pub fn with_topic_capacity(&self, capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: Arc::clone(&self.topics),
        }
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<BrokerMessage> {
        let mut topics = self
            .topics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Publish to `topic`; returns the number of subscribers reached
    pub fn publish(&self, topic: &str, message: BrokerMessage) -> usize {
        match self.sender(topic).send(message) {
            Ok(receivers) => receivers,
            Err(_) => {
                trace!(topic, "Published with no subscribers");
                0
            }
        }
    }

    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<BrokerMessage> {
        self.sender(topic).subscribe()
    }

    /// Convenience for producers feeding the telemetry topic
    pub fn publish_state(&self, endpoint: &str, state: ComponentState) -> usize {
        self.publish(&telemetry_topic(endpoint), BrokerMessage::State(state))
    }
}

struct Session {
    endpoint: String,
    telemetry: broadcast::Receiver<BrokerMessage>,
}

/// Connector subscribed to one endpoint's topics on a [`PubSubBroker`]
pub struct PubSubConnector {
    name: String,
    broker: PubSubBroker,
    session: Option<Session>,
    metrics: Arc<ConnectorMetrics>,
}

impl PubSubConnector {
    pub fn new(name: impl Into<String>, broker: PubSubBroker) -> Self {
        Self {
            name: name.into(),
            broker,
            session: None,
            metrics: Arc::new(ConnectorMetrics::new()),
        }
    }

    pub fn metrics(&self) -> Arc<ConnectorMetrics> {
        Arc::clone(&self.metrics)
    }

    fn endpoint(&self) -> Result<&str, ContractError> {
        self.session
            .as_ref()
            .map(|s| s.endpoint.as_str())
            .ok_or_else(|| ContractError::not_connected(&self.name))
    }
}

impl Connector for PubSubConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&mut self, endpoint: &str) -> bool {
        if self.session.is_some() {
            return true;
        }
        if endpoint.is_empty() {
            warn!(connector = %self.name, "Empty pub/sub endpoint");
            return false;
        }
        let telemetry = self.broker.subscribe(&telemetry_topic(endpoint));
        self.session = Some(Session {
            endpoint: endpoint.to_string(),
            telemetry,
        });
        debug!(connector = %self.name, endpoint, "Subscribed to telemetry topic");
        true
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    async fn push_state(&mut self, state: &ComponentState) -> Result<(), ContractError> {
        let topic = twin_topic(self.endpoint()?);
        self.broker
            .publish(&topic, BrokerMessage::State(state.clone()));
        self.metrics.record_pushed(&self.name);
        Ok(())
    }

    async fn pull_state(&mut self) -> Result<Option<ComponentState>, ContractError> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| ContractError::not_connected(&self.name))?;
        loop {
            match session.telemetry.try_recv() {
                Ok(BrokerMessage::State(state)) => {
                    self.metrics.record_pulled(&self.name);
                    return Ok(Some(state));
                }
                Ok(BrokerMessage::Command(_)) => continue,
                Err(TryRecvError::Lagged(missed)) => {
                    warn!(connector = %self.name, missed, "Telemetry subscriber lagged, messages lost");
                    self.metrics.record_dropped(missed);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return Ok(None),
            }
        }
    }

    async fn send_command(&mut self, payload: Bytes) -> Result<(), ContractError> {
        let topic = command_topic(self.endpoint()?);
        self.broker.publish(&topic, BrokerMessage::Command(payload));
        self.metrics.record_command();
        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(connector = %self.name, endpoint = %session.endpoint, "Unsubscribed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Timestamp;

    fn record(id: &str, ms: i64) -> ComponentState {
        ComponentState::new(id, Timestamp::from_millis(ms))
            .with_signal_level(-75.0)
            .with_latency(8.0)
    }

    #[tokio::test]
    async fn test_pull_from_telemetry_topic() {
        let broker = PubSubBroker::default();
        let mut conn = PubSubConnector::new("bus", broker.clone());
        assert!(conn.connect("cell-7").await);

        broker.publish_state("cell-7", record("a", 1));
        broker.publish_state("cell-8", record("other", 1));
        broker.publish_state("cell-7", record("b", 2));

        assert_eq!(conn.pull_state().await.unwrap().unwrap().id, "a");
        assert_eq!(conn.pull_state().await.unwrap().unwrap().id, "b");
        assert!(conn.pull_state().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_push_and_command_topics() {
        let broker = PubSubBroker::default();
        let mut twin_rx = broker.subscribe(&twin_topic("cell-7"));
        let mut cmd_rx = broker.subscribe(&command_topic("cell-7"));

        let mut conn = PubSubConnector::new("bus", broker);
        conn.connect("cell-7").await;
        conn.push_state(&record("a", 1)).await.unwrap();
        conn.send_command(Bytes::from_static(b"reboot")).await.unwrap();

        assert_eq!(twin_rx.recv().await.unwrap(), BrokerMessage::State(record("a", 1)));
        assert_eq!(
            cmd_rx.recv().await.unwrap(),
            BrokerMessage::Command(Bytes::from_static(b"reboot"))
        );
    }

    #[tokio::test]
    async fn test_lagged_subscriber_keeps_newest() {
        let broker = PubSubBroker::new(2);
        let mut conn = PubSubConnector::new("bus", broker.clone());
        conn.connect("cell").await;

        for ms in 1..=5 {
            broker.publish_state("cell", record("a", ms));
        }

        let first = conn.pull_state().await.unwrap().unwrap();
        assert_eq!(first.timestamp, Timestamp::from_millis(4));
        assert_eq!(conn.metrics().snapshot().dropped, 3);
    }

    #[tokio::test]
    async fn test_not_connected() {
        let mut conn = PubSubConnector::new("bus", PubSubBroker::default());
        assert!(conn.pull_state().await.is_err());
        assert!(conn.push_state(&record("a", 1)).await.is_err());
        assert!(!conn.connect("").await);
    }
}
