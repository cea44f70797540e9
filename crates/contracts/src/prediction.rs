//! Forecast results produced by the predictive engine

use serde::{Deserialize, Serialize};

use crate::{ComponentId, ComponentState, Timestamp};

/// Name of the linear extrapolation algorithm
pub const LINEAR_EXTRAPOLATION: &str = "linear_extrapolation";

/// Forecast of one component's state at a future instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub component_id: ComponentId,
    /// Algorithm that produced the forecast
    pub algorithm: String,
    /// Instant the forecast is for
    pub target_time: Timestamp,
    /// Forecast record, absent when history is insufficient
    pub predicted: Option<ComponentState>,
    /// Confidence in `[0, 1]`
    pub confidence: f64,
    /// Forecast horizon divided by the last observed sampling interval
    pub horizon_ratio: f64,
}

impl PredictionResult {
    /// Zero-confidence result without a forecast
    pub fn insufficient(component_id: ComponentId, target_time: Timestamp) -> Self {
        Self {
            component_id,
            algorithm: LINEAR_EXTRAPOLATION.to_string(),
            target_time,
            predicted: None,
            confidence: 0.0,
            horizon_ratio: 0.0,
        }
    }

    /// A forecast exists and carries some confidence
    pub fn is_actionable(&self) -> bool {
        self.predicted.is_some() && self.confidence > 0.0
    }
}

/// Network-wide forecast summed/averaged over every tracked component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatePrediction {
    pub target_time: Timestamp,
    /// Components that produced a forecast
    pub contributors: usize,
    /// Sum of forecast throughput (Mbps)
    pub total_throughput: f64,
    /// Mean forecast latency (ms)
    pub mean_latency: f64,
    /// Mean forecast signal level (dBm)
    pub mean_signal_level: f64,
    /// Mean forecast packet loss
    pub mean_packet_loss: f64,
    /// Mean confidence of the contributing forecasts
    pub mean_confidence: f64,
}

impl AggregatePrediction {
    pub fn is_empty(&self) -> bool {
        self.contributors == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_result_is_not_actionable() {
        let result = PredictionResult::insufficient("ue-1".into(), Timestamp::from_millis(10));
        assert!(result.predicted.is_none());
        assert_eq!(result.confidence, 0.0);
        assert!(!result.is_actionable());
        assert_eq!(result.algorithm, LINEAR_EXTRAPOLATION);
    }
}
