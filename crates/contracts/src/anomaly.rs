//! Anomaly findings reported by the rule-based detector

use serde::{Deserialize, Serialize};

use crate::{ComponentId, Timestamp};

/// Rule that produced a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Signal level below floor
    LowSignal,
    /// Latency above ceiling
    HighLatency,
    /// Packet loss above ceiling
    HighPacketLoss,
}

impl AnomalyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AnomalyKind::LowSignal => "low_signal",
            AnomalyKind::HighLatency => "high_latency",
            AnomalyKind::HighPacketLoss => "high_packet_loss",
        }
    }
}

/// One triggered rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    /// Observed value
    pub observed: f64,
    /// Threshold that was crossed
    pub limit: f64,
}

impl Anomaly {
    pub fn description(&self) -> String {
        match self.kind {
            AnomalyKind::LowSignal => format!(
                "Low signal level: {:.1} dBm (floor {:.1} dBm)",
                self.observed, self.limit
            ),
            AnomalyKind::HighLatency => format!(
                "High latency: {:.1} ms (ceiling {:.1} ms)",
                self.observed, self.limit
            ),
            AnomalyKind::HighPacketLoss => format!(
                "High packet loss: {:.2}% (ceiling {:.2}%)",
                self.observed * 100.0,
                self.limit * 100.0
            ),
        }
    }
}

/// All findings for one component in one detection pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub component_id: ComponentId,
    /// Timestamp of the record that was inspected
    pub detected_at: Timestamp,
    pub anomalies: Vec<Anomaly>,
}

impl AnomalyRecord {
    pub fn has(&self, kind: AnomalyKind) -> bool {
        self.anomalies.iter().any(|a| a.kind == kind)
    }

    pub fn descriptions(&self) -> Vec<String> {
        self.anomalies.iter().map(Anomaly::description).collect()
    }
}
