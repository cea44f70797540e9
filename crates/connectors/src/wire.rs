//! Wire envelope for datagram connectors

use bytes::Bytes;
use contracts::{ComponentState, ContractError};
use serde::{Deserialize, Serialize};

use crate::error::ConnectorError;

/// UDP payload ceiling for IPv4
pub const MAX_DATAGRAM: usize = 65_507;

/// Serialization format on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireCodec {
    /// JSON (human-readable, larger)
    #[default]
    Json,
    /// Bincode (binary, compact)
    Bincode,
}

impl WireCodec {
    /// Parse the `codec` connector parameter; absent means JSON
    pub fn from_param(connector: &str, raw: Option<&str>) -> Result<Self, ConnectorError> {
        match raw {
            None | Some("json") => Ok(Self::Json),
            Some("bincode") => Ok(Self::Bincode),
            Some(other) => Err(ConnectorError::invalid_param(
                connector,
                "codec",
                format!("unknown codec '{}'", other),
            )),
        }
    }

    pub fn encode(self, connector: &str, msg: &WireMessage) -> Result<Vec<u8>, ContractError> {
        let data = match self {
            WireCodec::Json => serde_json::to_vec(msg).map_err(|e| e.to_string()),
            WireCodec::Bincode => bincode::serialize(msg).map_err(|e| e.to_string()),
        }
        .map_err(|e| ContractError::connector_codec(connector, e))?;

        if data.len() > MAX_DATAGRAM {
            return Err(ContractError::connector_codec(
                connector,
                format!("message of {} bytes exceeds datagram limit", data.len()),
            ));
        }
        Ok(data)
    }

    pub fn decode(self, connector: &str, data: &[u8]) -> Result<WireMessage, ContractError> {
        match self {
            WireCodec::Json => serde_json::from_slice(data).map_err(|e| e.to_string()),
            WireCodec::Bincode => bincode::deserialize(data).map_err(|e| e.to_string()),
        }
        .map_err(|e| ContractError::connector_codec(connector, e))
    }
}

/// Messages exchanged with a request/response peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireMessage {
    /// Twin → peer: current record
    Push(ComponentState),
    /// Twin → peer: ask for the next pending record
    PullRequest { seq: u64 },
    /// Peer → twin: answer to `PullRequest` with the same `seq`
    PullResponse {
        seq: u64,
        state: Option<ComponentState>,
    },
    /// Twin → peer: opaque control payload
    Command(Bytes),
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Timestamp;

    fn sample() -> ComponentState {
        ComponentState::new("ue-1", Timestamp::from_millis(5))
            .with_signal_level(-80.0)
            .with_latency(12.0)
            .with_custom_metric("cqi", 11.0)
    }

    #[test]
    fn test_both_codecs_carry_pull_response() {
        let msg = WireMessage::PullResponse {
            seq: 9,
            state: Some(sample()),
        };
        for codec in [WireCodec::Json, WireCodec::Bincode] {
            let data = codec.encode("t", &msg).unwrap();
            assert_eq!(codec.decode("t", &data).unwrap(), msg);
        }
    }

    #[test]
    fn test_garbage_is_codec_error() {
        let err = WireCodec::Json.decode("ran", b"{not json").unwrap_err();
        assert!(matches!(err, ContractError::ConnectorCodec { ref connector, .. } if connector == "ran"));
    }

    #[test]
    fn test_codec_param() {
        assert_eq!(WireCodec::from_param("c", None).unwrap(), WireCodec::Json);
        assert_eq!(
            WireCodec::from_param("c", Some("bincode")).unwrap(),
            WireCodec::Bincode
        );
        assert!(WireCodec::from_param("c", Some("xml")).is_err());
    }

    #[test]
    fn test_oversized_message_rejected() {
        let mut state = sample();
        for i in 0..5000 {
            state.custom_metrics.insert(format!("metric_{i:06}"), i as f64);
        }
        let err = WireCodec::Json
            .encode("t", &WireMessage::Push(state))
            .unwrap_err();
        assert!(err.to_string().contains("exceeds datagram limit"));
    }
}
