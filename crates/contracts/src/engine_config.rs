//! Twin engine configuration contracts that can be shared across crates.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::ContractError;

/// Twin engine configuration
///
/// Plain typed configuration, checked once with [`TwinEngineConfig::check`]
/// when the twin is constructed.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TwinEngineConfig {
    /// Synchronization interval in milliseconds
    #[serde(default = "default_sync_interval_ms")]
    #[validate(range(min = 1))]
    pub sync_interval_ms: u64,

    /// Whether `start()` may schedule the loop at all
    #[serde(default = "default_true")]
    pub sync_enabled: bool,

    /// Run the anomaly pass every cycle
    #[serde(default = "default_true")]
    pub anomaly_detection: bool,

    /// Signal level delta (dB) above which an update counts as significant
    #[serde(default = "default_significant_change_db")]
    #[validate(range(min = 0.0))]
    pub significant_change_db: f64,

    /// Upper bound on records drained from one connector per cycle
    #[serde(default = "default_max_pulls_per_cycle")]
    #[validate(range(min = 1))]
    pub max_pulls_per_cycle: usize,

    /// History buffer configuration
    #[serde(default)]
    #[validate(nested)]
    pub history: HistoryConfig,

    /// Predictive engine configuration
    #[serde(default)]
    #[validate(nested)]
    pub prediction: PredictionConfig,

    /// Record invariant bounds
    #[serde(default)]
    #[validate(nested)]
    pub validation: ValidationBounds,

    /// Anomaly rule thresholds
    #[serde(default)]
    #[validate(nested)]
    pub anomaly: AnomalyThresholds,

    /// Capacity planning growth rates
    #[serde(default)]
    #[validate(nested)]
    pub capacity: CapacityModelConfig,
}

impl Default for TwinEngineConfig {
    fn default() -> Self {
        Self {
            sync_interval_ms: default_sync_interval_ms(),
            sync_enabled: true,
            anomaly_detection: true,
            significant_change_db: default_significant_change_db(),
            max_pulls_per_cycle: default_max_pulls_per_cycle(),
            history: HistoryConfig::default(),
            prediction: PredictionConfig::default(),
            validation: ValidationBounds::default(),
            anomaly: AnomalyThresholds::default(),
            capacity: CapacityModelConfig::default(),
        }
    }
}

impl TwinEngineConfig {
    /// Synchronization interval as a `Duration`
    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    /// Run field-level validation rules
    ///
    /// # Errors
    /// `ContractError::ConfigValidation` listing every violated rule.
    pub fn check(&self) -> Result<(), ContractError> {
        self.validate()
            .map_err(|e| ContractError::config_validation("twin", e.to_string()))
    }
}

fn default_sync_interval_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

fn default_significant_change_db() -> f64 {
    5.0
}

fn default_max_pulls_per_cycle() -> usize {
    256
}

/// History buffer configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct HistoryConfig {
    /// Maximum records retained per component
    #[validate(range(min = 1))]
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { capacity: 100 }
    }
}

/// Predictive engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PredictionConfig {
    /// Observations kept per component (independent of the history buffer)
    #[validate(range(min = 2))]
    pub history_capacity: usize,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            history_capacity: 1000,
        }
    }
}

/// Bounds a record must satisfy to be stored
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_signal_bounds"))]
pub struct ValidationBounds {
    /// Lowest accepted signal level (dBm)
    pub min_signal_dbm: f64,
    /// Highest accepted signal level (dBm)
    pub max_signal_dbm: f64,
}

impl Default for ValidationBounds {
    fn default() -> Self {
        Self {
            min_signal_dbm: -150.0,
            max_signal_dbm: 0.0,
        }
    }
}

fn validate_signal_bounds(bounds: &ValidationBounds) -> Result<(), validator::ValidationError> {
    if bounds.min_signal_dbm < bounds.max_signal_dbm {
        Ok(())
    } else {
        let mut err = validator::ValidationError::new("signal_bounds");
        err.message = Some("min_signal_dbm must be < max_signal_dbm".into());
        Err(err)
    }
}

/// Anomaly rule thresholds
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AnomalyThresholds {
    /// Signal level floor (dBm)
    pub signal_floor_dbm: f64,
    /// Latency ceiling (ms)
    #[validate(range(min = 0.0))]
    pub latency_ceiling_ms: f64,
    /// Packet loss ceiling (fraction)
    #[validate(range(min = 0.0, max = 1.0))]
    pub packet_loss_ceiling: f64,
}

impl Default for AnomalyThresholds {
    fn default() -> Self {
        Self {
            signal_floor_dbm: -110.0,
            latency_ceiling_ms: 100.0,
            packet_loss_ceiling: 0.05,
        }
    }
}

/// Linear capacity model rates (per day)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CapacityModelConfig {
    /// Fractional growth of the component population per day
    #[validate(range(min = 0.0))]
    pub unit_growth_per_day: f64,
    /// Fractional growth of aggregate throughput per day
    #[validate(range(min = 0.0))]
    pub bandwidth_growth_per_day: f64,
    /// Storage consumed per component per day (GB)
    #[validate(range(min = 0.0))]
    pub storage_gb_per_component_day: f64,
}

impl Default for CapacityModelConfig {
    fn default() -> Self {
        Self {
            unit_growth_per_day: 0.01,
            bandwidth_growth_per_day: 0.02,
            storage_gb_per_component_day: 0.05,
        }
    }
}
