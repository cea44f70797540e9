//! TwinSnapshot - exported view of the whole twin
//!
//! JSON layout:
//! ```json
//! {
//!   "timestamp": 1700000000000000000,
//!   "active_components": 2,
//!   "components": { "7": { "id": "7", "signal_level": -90.0, ... } }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ComponentState, ContractError, Timestamp};

/// Point-in-time copy of every current record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TwinSnapshot {
    /// Export time (ticks)
    pub timestamp: Timestamp,
    #[serde(default)]
    pub active_components: usize,
    /// Records keyed by component id text
    #[serde(default)]
    pub components: BTreeMap<String, ComponentState>,
}

impl TwinSnapshot {
    pub fn from_records(timestamp: Timestamp, records: impl IntoIterator<Item = ComponentState>) -> Self {
        let components: BTreeMap<String, ComponentState> = records
            .into_iter()
            .map(|r| (r.id.to_string(), r))
            .collect();
        Self {
            timestamp,
            active_components: components.len(),
            components,
        }
    }

    /// Records with the map key as their id
    pub fn into_records(self) -> Vec<ComponentState> {
        self.components
            .into_iter()
            .map(|(key, mut record)| {
                if record.id != key.as_str() {
                    record.id = key.into();
                }
                record
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String, ContractError> {
        serde_json::to_string_pretty(self).map_err(|e| ContractError::SnapshotParse {
            message: format!("serialize failed: {}", e),
            source: Some(Box::new(e)),
        })
    }

    /// Parse a snapshot document
    ///
    /// # Errors
    /// `ContractError::SnapshotParse` when the document is malformed; no
    /// partial result is returned.
    pub fn from_json(json: &str) -> Result<Self, ContractError> {
        serde_json::from_str(json).map_err(|e| ContractError::SnapshotParse {
            message: format!("line {} column {}: {}", e.line(), e.column(), e),
            source: Some(Box::new(e)),
        })
    }
}

/// Aggregate metrics recomputed at the end of each cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub computed_at: Timestamp,
    pub active_components: usize,
    pub mean_signal_level: f64,
    pub mean_latency: f64,
    pub mean_packet_loss: f64,
    pub total_throughput: f64,
    /// Components flagged by the last anomaly pass
    pub anomalous_components: usize,
}

impl AggregateMetrics {
    pub fn from_records(computed_at: Timestamp, records: &[ComponentState], anomalous: usize) -> Self {
        let n = records.len();
        if n == 0 {
            return Self {
                computed_at,
                anomalous_components: anomalous,
                ..Default::default()
            };
        }
        let count = n as f64;
        Self {
            computed_at,
            active_components: n,
            mean_signal_level: records.iter().map(|r| r.signal_level).sum::<f64>() / count,
            mean_latency: records.iter().map(|r| r.latency).sum::<f64>() / count,
            mean_packet_loss: records.iter().map(|r| r.packet_loss).sum::<f64>() / count,
            total_throughput: records.iter().map(|r| r.throughput).sum(),
            anomalous_components: anomalous,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, signal: f64, latency: f64) -> ComponentState {
        ComponentState::new(id, Timestamp::from_millis(5))
            .with_signal_level(signal)
            .with_latency(latency)
            .with_throughput(10.0)
    }

    #[test]
    fn json_layout() {
        let snapshot = TwinSnapshot::from_records(
            Timestamp::from_ticks(42),
            vec![record("b", -80.0, 5.0), record("a", -90.0, 7.0)],
        );
        let value: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(value["timestamp"], 42);
        assert_eq!(value["active_components"], 2);
        assert_eq!(value["components"]["a"]["signal_level"], -90.0);
        assert_eq!(value["components"]["b"]["velocity"], serde_json::json!([0.0, 0.0, 0.0]));
    }

    #[test]
    fn key_wins_over_embedded_id() {
        let json = r#"{
            "timestamp": 1,
            "components": {
                "9": { "id": "other", "timestamp": 1, "signal_level": -70.0, "latency": 1.0, "packet_loss": 0.0 }
            }
        }"#;
        let records = TwinSnapshot::from_json(json).unwrap().into_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "9");
    }

    #[test]
    fn numeric_embedded_id_is_accepted() {
        let json = r#"{
            "timestamp": 1,
            "components": {
                "7": { "id": 7, "timestamp": 1, "signal_level": -70.0, "latency": 1.0, "packet_loss": 0.0 },
                "8": { "id": "8", "timestamp": 1, "signal_level": -75.0, "latency": 2.0, "packet_loss": 0.0 }
            }
        }"#;
        let records = TwinSnapshot::from_json(json).unwrap().into_records();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["7", "8"]);
    }

    #[test]
    fn malformed_document_is_rejected() {
        let err = TwinSnapshot::from_json("{ \"components\": [1, 2").unwrap_err();
        assert!(matches!(err, ContractError::SnapshotParse { .. }));
    }

    #[test]
    fn aggregate_metrics_means() {
        let metrics = AggregateMetrics::from_records(
            Timestamp::from_millis(1),
            &[record("a", -90.0, 10.0), record("b", -70.0, 20.0)],
            1,
        );
        assert_eq!(metrics.active_components, 2);
        assert!((metrics.mean_signal_level + 80.0).abs() < 1e-9);
        assert!((metrics.mean_latency - 15.0).abs() < 1e-9);
        assert!((metrics.total_throughput - 20.0).abs() < 1e-9);
        assert_eq!(metrics.anomalous_components, 1);

        let empty = AggregateMetrics::from_records(Timestamp::default(), &[], 0);
        assert_eq!(empty.active_components, 0);
        assert_eq!(empty.mean_latency, 0.0);
    }
}
