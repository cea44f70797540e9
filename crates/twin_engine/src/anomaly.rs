//! Rule-based anomaly pass over a snapshot of current records

use contracts::{Anomaly, AnomalyKind, AnomalyRecord, AnomalyThresholds, ComponentState};

/// Stateless threshold rules
#[derive(Debug, Clone, Default)]
pub struct AnomalyDetector {
    thresholds: AnomalyThresholds,
}

impl AnomalyDetector {
    pub fn new(thresholds: AnomalyThresholds) -> Self {
        Self { thresholds }
    }

    /// Findings for every flagged record; clean records are omitted
    pub fn detect(&self, states: &[ComponentState]) -> Vec<AnomalyRecord> {
        states.iter().filter_map(|s| self.inspect(s)).collect()
    }

    /// Findings for a single record
    pub fn inspect(&self, state: &ComponentState) -> Option<AnomalyRecord> {
        let t = &self.thresholds;
        let mut anomalies = Vec::new();

        if state.signal_level < t.signal_floor_dbm {
            anomalies.push(Anomaly {
                kind: AnomalyKind::LowSignal,
                observed: state.signal_level,
                limit: t.signal_floor_dbm,
            });
        }
        if state.latency > t.latency_ceiling_ms {
            anomalies.push(Anomaly {
                kind: AnomalyKind::HighLatency,
                observed: state.latency,
                limit: t.latency_ceiling_ms,
            });
        }
        if state.packet_loss > t.packet_loss_ceiling {
            anomalies.push(Anomaly {
                kind: AnomalyKind::HighPacketLoss,
                observed: state.packet_loss,
                limit: t.packet_loss_ceiling,
            });
        }

        (!anomalies.is_empty()).then(|| AnomalyRecord {
            component_id: state.id.clone(),
            detected_at: state.timestamp,
            anomalies,
        })
    }
}
