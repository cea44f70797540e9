//! RequestResponseConnector - UDP datagrams with a request/reply pull

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use contracts::{ComponentState, Connector, ContractError};
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, instrument, trace, warn};

use crate::error::ConnectorError;
use crate::metrics::ConnectorMetrics;
use crate::wire::{WireCodec, WireMessage, MAX_DATAGRAM};

/// Configuration for RequestResponseConnector
#[derive(Debug, Clone)]
pub struct RequestResponseConfig {
    /// Envelope format
    pub codec: WireCodec,
    /// How long a pull waits for its reply
    pub timeout: Duration,
    /// Local address to bind
    pub bind: SocketAddr,
}

impl Default for RequestResponseConfig {
    fn default() -> Self {
        Self {
            codec: WireCodec::Json,
            timeout: Duration::from_millis(500),
            bind: SocketAddr::from(([0, 0, 0, 0], 0)),
        }
    }
}

impl RequestResponseConfig {
    /// Create config from params map (`codec`, `timeout_ms`, `bind`)
    pub fn from_params(
        connector: &str,
        params: &HashMap<String, String>,
    ) -> Result<Self, ConnectorError> {
        let mut config = Self {
            codec: WireCodec::from_param(connector, params.get("codec").map(String::as_str))?,
            ..Default::default()
        };

        if let Some(raw) = params.get("timeout_ms") {
            let ms: u64 = raw
                .parse()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or_else(|| {
                    ConnectorError::invalid_param(connector, "timeout_ms", format!("'{}' is not a positive integer", raw))
                })?;
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(raw) = params.get("bind") {
            config.bind = raw.parse().map_err(|e| {
                ConnectorError::invalid_param(connector, "bind", format!("invalid address '{}': {}", raw, e))
            })?;
        }
        Ok(config)
    }
}

/// Connector talking to a remote peer over UDP
///
/// Push and command are fire-and-forget datagrams. Pull sends a
/// `PullRequest` and waits up to `timeout` for the matching
/// `PullResponse`; stale replies are discarded.
pub struct RequestResponseConnector {
    name: String,
    config: RequestResponseConfig,
    socket: Option<UdpSocket>,
    seq: u64,
    metrics: Arc<ConnectorMetrics>,
}

impl RequestResponseConnector {
    pub fn new(name: impl Into<String>, config: RequestResponseConfig) -> Self {
        Self {
            name: name.into(),
            config,
            socket: None,
            seq: 0,
            metrics: Arc::new(ConnectorMetrics::new()),
        }
    }

    pub fn metrics(&self) -> Arc<ConnectorMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Local address once connected
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    fn socket(&self) -> Result<&UdpSocket, ContractError> {
        self.socket
            .as_ref()
            .ok_or_else(|| ContractError::not_connected(&self.name))
    }

    fn encode(&self, msg: &WireMessage) -> Result<Vec<u8>, ContractError> {
        self.config.codec.encode(&self.name, msg).inspect_err(|_| {
            self.metrics.record_codec_error();
        })
    }

    async fn send(&self, msg: &WireMessage) -> Result<(), ContractError> {
        let socket = self.socket()?;
        let data = self.encode(msg)?;
        let sent = socket
            .send(&data)
            .await
            .map_err(|e| ContractError::connector_transport(&self.name, e.to_string()))?;
        trace!(connector = %self.name, bytes = sent, "Datagram sent");
        Ok(())
    }

    async fn open(&self, endpoint: &str) -> std::io::Result<UdpSocket> {
        let socket = UdpSocket::bind(self.config.bind).await?;
        socket.connect(endpoint).await?;
        Ok(socket)
    }
}

impl Connector for RequestResponseConnector {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "request_response_connect", skip(self), fields(connector = %self.name))]
    async fn connect(&mut self, endpoint: &str) -> bool {
        if self.socket.is_some() {
            return true;
        }
        match self.open(endpoint).await {
            Ok(socket) => {
                debug!(connector = %self.name, target = %endpoint, "RequestResponseConnector connected");
                self.socket = Some(socket);
                true
            }
            Err(e) => {
                warn!(connector = %self.name, target = %endpoint, error = %e, "Connect failed");
                false
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    async fn push_state(&mut self, state: &ComponentState) -> Result<(), ContractError> {
        self.send(&WireMessage::Push(state.clone())).await?;
        self.metrics.record_pushed(&self.name);
        Ok(())
    }

    #[instrument(name = "request_response_pull", skip(self), fields(connector = %self.name, seq))]
    async fn pull_state(&mut self) -> Result<Option<ComponentState>, ContractError> {
        self.seq += 1;
        let seq = self.seq;
        tracing::Span::current().record("seq", seq);

        self.send(&WireMessage::PullRequest { seq }).await?;

        let socket = self.socket()?;
        let deadline = Instant::now() + self.config.timeout;
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let len = match tokio::time::timeout_at(deadline, socket.recv(&mut buf)).await {
                Err(_) => {
                    return Err(ContractError::connector_transport(
                        &self.name,
                        format!("pull timed out after {} ms", self.config.timeout.as_millis()),
                    ));
                }
                Ok(Err(e)) => {
                    return Err(ContractError::connector_transport(&self.name, e.to_string()));
                }
                Ok(Ok(len)) => len,
            };

            match self.config.codec.decode(&self.name, &buf[..len]) {
                Ok(WireMessage::PullResponse { seq: reply, state }) if reply == seq => {
                    if state.is_some() {
                        self.metrics.record_pulled(&self.name);
                    }
                    return Ok(state);
                }
                Ok(other) => {
                    debug!(connector = %self.name, message = ?other, "Discarding unexpected datagram");
                }
                Err(e) => {
                    self.metrics.record_codec_error();
                    warn!(connector = %self.name, error = %e, "Undecodable datagram");
                }
            }
        }
    }

    async fn send_command(&mut self, payload: Bytes) -> Result<(), ContractError> {
        self.send(&WireMessage::Command(payload)).await?;
        self.metrics.record_command();
        Ok(())
    }

    async fn disconnect(&mut self) {
        if self.socket.take().is_some() {
            debug!(connector = %self.name, "RequestResponseConnector closed");
        }
    }
}
