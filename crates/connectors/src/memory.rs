//! MemoryConnector - in-process loopback
//!
//! 用于无外部网络环境的测试和仿真。`memory_pair` 返回连接器及其对端：
//! 对端投递的记录由连接器拉取，连接器推送的记录由对端读取。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use bytes::Bytes;
use contracts::{ComponentState, Connector, ContractError};
use tracing::{debug, warn};

use crate::metrics::ConnectorMetrics;

#[derive(Debug, Default)]
struct Faults {
    failing: AtomicBool,
    refuse_connect: AtomicBool,
}

/// Connector half of a loopback pair
pub struct MemoryConnector {
    name: String,
    inbound: Receiver<ComponentState>,
    outbound: Sender<ComponentState>,
    commands: Sender<Bytes>,
    connected: bool,
    faults: Arc<Faults>,
    metrics: Arc<ConnectorMetrics>,
}

/// Remote half of a loopback pair
#[derive(Clone)]
pub struct MemoryPeer {
    name: String,
    inbound: Sender<ComponentState>,
    outbound: Receiver<ComponentState>,
    commands: Receiver<Bytes>,
    faults: Arc<Faults>,
    metrics: Arc<ConnectorMetrics>,
}

/// Create a connected loopback pair with `capacity` slots per direction
pub fn memory_pair(name: impl Into<String>, capacity: usize) -> (MemoryConnector, MemoryPeer) {
    let name = name.into();
    let capacity = capacity.max(1);
    let (in_tx, in_rx) = bounded(capacity);
    let (out_tx, out_rx) = bounded(capacity);
    let (cmd_tx, cmd_rx) = bounded(capacity);
    let faults = Arc::new(Faults::default());
    let metrics = Arc::new(ConnectorMetrics::new());

    let connector = MemoryConnector {
        name: name.clone(),
        inbound: in_rx,
        outbound: out_tx,
        commands: cmd_tx,
        connected: false,
        faults: Arc::clone(&faults),
        metrics: Arc::clone(&metrics),
    };
    let peer = MemoryPeer {
        name,
        inbound: in_tx,
        outbound: out_rx,
        commands: cmd_rx,
        faults,
        metrics,
    };
    (connector, peer)
}

impl MemoryConnector {
    pub fn metrics(&self) -> Arc<ConnectorMetrics> {
        Arc::clone(&self.metrics)
    }

    fn check(&self) -> Result<(), ContractError> {
        if !self.connected {
            return Err(ContractError::not_connected(&self.name));
        }
        if self.faults.failing.load(Ordering::Relaxed) {
            return Err(ContractError::connector_transport(&self.name, "injected failure"));
        }
        Ok(())
    }

    fn closed(&self) -> ContractError {
        ContractError::connector_transport(&self.name, "peer closed")
    }
}

impl Connector for MemoryConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&mut self, _endpoint: &str) -> bool {
        if self.faults.refuse_connect.load(Ordering::Relaxed) {
            warn!(connector = %self.name, "Connection refused");
            return false;
        }
        self.connected = true;
        true
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn push_state(&mut self, state: &ComponentState) -> Result<(), ContractError> {
        self.check()?;
        match self.outbound.try_send(state.clone()) {
            Ok(()) => {
                self.metrics.record_pushed(&self.name);
                Ok(())
            }
            // Drop newest
            Err(TrySendError::Full(_)) => {
                self.metrics.record_dropped(1);
                debug!(connector = %self.name, component_id = %state.id, "Peer queue full, record dropped");
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(self.closed()),
        }
    }

    async fn pull_state(&mut self) -> Result<Option<ComponentState>, ContractError> {
        self.check()?;
        match self.inbound.try_recv() {
            Ok(state) => {
                self.metrics.record_pulled(&self.name);
                Ok(Some(state))
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Closed) => Err(self.closed()),
        }
    }

    async fn send_command(&mut self, payload: Bytes) -> Result<(), ContractError> {
        self.check()?;
        self.commands
            .send(payload)
            .await
            .map_err(|_| self.closed())?;
        self.metrics.record_command();
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.connected = false;
    }
}

impl MemoryPeer {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a record for the connector; `false` when full (dropped) or closed
    pub fn offer(&self, state: ComponentState) -> bool {
        match self.inbound.try_send(state) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.metrics.record_dropped(1);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Queue a record, waiting for space
    pub async fn send(&self, state: ComponentState) -> bool {
        self.inbound.send(state).await.is_ok()
    }

    /// Records pushed by the connector so far
    pub fn drain_pushed(&self) -> Vec<ComponentState> {
        std::iter::from_fn(|| self.outbound.try_recv().ok()).collect()
    }

    pub fn drain_commands(&self) -> Vec<Bytes> {
        std::iter::from_fn(|| self.commands.try_recv().ok()).collect()
    }

    /// Records waiting to be pulled
    pub fn pending(&self) -> usize {
        self.inbound.len()
    }

    /// While set, every connector operation fails with a transport error
    pub fn set_failing(&self, failing: bool) {
        self.faults.failing.store(failing, Ordering::Relaxed);
    }

    /// While set, `connect` returns false
    pub fn set_refuse_connect(&self, refuse: bool) {
        self.faults.refuse_connect.store(refuse, Ordering::Relaxed);
    }

    /// Close both directions; the connector then fails with "peer closed"
    pub fn close(&self) {
        self.inbound.close();
        self.outbound.close();
        self.commands.close();
    }
}
