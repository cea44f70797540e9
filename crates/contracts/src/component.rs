//! ComponentState - one observed snapshot of a remote component
//!
//! Records are immutable once built: an update to the twin is always a new
//! record, never an in-place edit of a stored one.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ComponentId, ValidationBounds, ValidationError};

/// Capture time as an integer tick count (nanoseconds).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Ticks per second
    pub const TICKS_PER_SECOND: i64 = 1_000_000_000;

    #[inline]
    pub const fn from_ticks(ticks: i64) -> Self {
        Self(ticks)
    }

    #[inline]
    pub const fn ticks(self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn from_millis(ms: i64) -> Self {
        Self(ms.saturating_mul(1_000_000))
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        Self((secs * Self::TICKS_PER_SECOND as f64).round() as i64)
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / Self::TICKS_PER_SECOND as f64
    }

    /// Wall-clock now
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default())
    }

    /// Signed distance `self - earlier` in seconds
    ///
    /// Ticks come from imports and remote peers unchecked, so the
    /// difference is taken in `i128`.
    pub fn seconds_since(self, earlier: Timestamp) -> f64 {
        (self.0 as i128 - earlier.0 as i128) as f64 / Self::TICKS_PER_SECOND as f64
    }

    /// Shift by `secs`, saturating at the tick range
    pub fn offset_secs(self, secs: f64) -> Self {
        // f64 → i64 `as` 本身饱和
        let delta = (secs * Self::TICKS_PER_SECOND as f64).round() as i64;
        Self(self.0.saturating_add(delta))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}s", self.as_secs_f64())
    }
}

/// 3D vector, serialized as `[x, y, z]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<[f64; 3]> for Vector3 {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self { x, y, z }
    }
}

impl From<Vector3> for [f64; 3] {
    fn from(v: Vector3) -> Self {
        [v.x, v.y, v.z]
    }
}

/// Fixed scalar radio/quality metrics carried by every record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Received signal level (dBm)
    SignalLevel,
    /// Signal quality (dB)
    SignalQuality,
    /// Signal-to-noise ratio (dB)
    Snr,
    /// Throughput (Mbps)
    Throughput,
    /// Latency (ms)
    Latency,
    /// Packet loss fraction (0-1)
    PacketLoss,
    /// Remaining energy
    EnergyLevel,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::SignalLevel,
        Metric::SignalQuality,
        Metric::Snr,
        Metric::Throughput,
        Metric::Latency,
        Metric::PacketLoss,
        Metric::EnergyLevel,
    ];

    /// Field name as it appears in the serialized record
    pub fn name(self) -> &'static str {
        match self {
            Metric::SignalLevel => "signal_level",
            Metric::SignalQuality => "signal_quality",
            Metric::Snr => "snr",
            Metric::Throughput => "throughput",
            Metric::Latency => "latency",
            Metric::PacketLoss => "packet_loss",
            Metric::EnergyLevel => "energy_level",
        }
    }

    #[inline]
    pub fn value(self, state: &ComponentState) -> f64 {
        match self {
            Metric::SignalLevel => state.signal_level,
            Metric::SignalQuality => state.signal_quality,
            Metric::Snr => state.snr,
            Metric::Throughput => state.throughput,
            Metric::Latency => state.latency,
            Metric::PacketLoss => state.packet_loss,
            Metric::EnergyLevel => state.energy_level,
        }
    }

    #[inline]
    pub fn set(self, state: &mut ComponentState, value: f64) {
        match self {
            Metric::SignalLevel => state.signal_level = value,
            Metric::SignalQuality => state.signal_quality = value,
            Metric::Snr => state.snr = value,
            Metric::Throughput => state.throughput = value,
            Metric::Latency => state.latency = value,
            Metric::PacketLoss => state.packet_loss = value,
            Metric::EnergyLevel => state.energy_level = value,
        }
    }

    /// Physically meaningful range for derived (non-observed) values
    pub fn clamp(self, value: f64) -> f64 {
        match self {
            Metric::PacketLoss => value.clamp(0.0, 1.0),
            Metric::Throughput | Metric::Latency | Metric::EnergyLevel => value.max(0.0),
            _ => value,
        }
    }
}

/// One observed snapshot of a single remote component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentState {
    /// Component identifier
    #[serde(default)]
    pub id: ComponentId,

    /// Capture timestamp (ticks)
    pub timestamp: Timestamp,

    /// Position (m)
    #[serde(default)]
    pub position: Vector3,

    /// Velocity (m/s)
    #[serde(default)]
    pub velocity: Vector3,

    /// Signal level (dBm)
    pub signal_level: f64,

    /// Signal quality (dB)
    #[serde(default)]
    pub signal_quality: f64,

    /// Signal-to-noise ratio (dB)
    #[serde(default)]
    pub snr: f64,

    /// Throughput (Mbps)
    #[serde(default)]
    pub throughput: f64,

    /// Latency (ms)
    pub latency: f64,

    /// Packet loss fraction
    pub packet_loss: f64,

    /// Energy level
    #[serde(default)]
    pub energy_level: f64,

    /// Serving cell identifier
    #[serde(default)]
    pub serving_cell: u32,

    /// Open-ended custom metrics
    #[serde(default)]
    pub custom_metrics: BTreeMap<String, f64>,
}

impl ComponentState {
    /// Create a record with all metrics zeroed
    pub fn new(id: impl Into<ComponentId>, timestamp: Timestamp) -> Self {
        Self {
            id: id.into(),
            timestamp,
            position: Vector3::default(),
            velocity: Vector3::default(),
            signal_level: 0.0,
            signal_quality: 0.0,
            snr: 0.0,
            throughput: 0.0,
            latency: 0.0,
            packet_loss: 0.0,
            energy_level: 0.0,
            serving_cell: 0,
            custom_metrics: BTreeMap::new(),
        }
    }

    pub fn with_signal_level(mut self, dbm: f64) -> Self {
        self.signal_level = dbm;
        self
    }

    pub fn with_latency(mut self, ms: f64) -> Self {
        self.latency = ms;
        self
    }

    pub fn with_packet_loss(mut self, fraction: f64) -> Self {
        self.packet_loss = fraction;
        self
    }

    pub fn with_throughput(mut self, mbps: f64) -> Self {
        self.throughput = mbps;
        self
    }

    pub fn with_metric(mut self, metric: Metric, value: f64) -> Self {
        metric.set(&mut self, value);
        self
    }

    pub fn with_position(mut self, position: Vector3) -> Self {
        self.position = position;
        self
    }

    pub fn with_velocity(mut self, velocity: Vector3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_serving_cell(mut self, cell: u32) -> Self {
        self.serving_cell = cell;
        self
    }

    pub fn with_custom_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.custom_metrics.insert(name.into(), value);
        self
    }

    /// Check record invariants
    ///
    /// # Errors
    /// The first violated invariant: non-finite values, signal level outside
    /// `bounds`, negative latency, packet loss outside `[0, 1]`.
    pub fn validate(&self, bounds: &ValidationBounds) -> Result<(), ValidationError> {
        for metric in Metric::ALL {
            if !metric.value(self).is_finite() {
                return Err(ValidationError::non_finite(&self.id, metric.name()));
            }
        }
        if !self.position.is_finite() {
            return Err(ValidationError::non_finite(&self.id, "position"));
        }
        if !self.velocity.is_finite() {
            return Err(ValidationError::non_finite(&self.id, "velocity"));
        }
        if let Some((name, _)) = self.custom_metrics.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ValidationError::non_finite(&self.id, name.as_str()));
        }

        if self.signal_level < bounds.min_signal_dbm || self.signal_level > bounds.max_signal_dbm {
            return Err(ValidationError::SignalOutOfRange {
                component_id: self.id.clone(),
                value: self.signal_level,
                min: bounds.min_signal_dbm,
                max: bounds.max_signal_dbm,
            });
        }
        if self.latency < 0.0 {
            return Err(ValidationError::NegativeLatency {
                component_id: self.id.clone(),
                value: self.latency,
            });
        }
        if !(0.0..=1.0).contains(&self.packet_loss) {
            return Err(ValidationError::PacketLossOutOfRange {
                component_id: self.id.clone(),
                value: self.packet_loss,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ComponentState {
        ComponentState::new(7u64, Timestamp::from_secs_f64(1.5))
            .with_signal_level(-90.0)
            .with_latency(12.0)
            .with_packet_loss(0.01)
            .with_position(Vector3::new(1.0, 2.0, 3.0))
            .with_custom_metric("cqi", 11.0)
    }

    #[test]
    fn valid_record_passes() {
        assert!(sample().validate(&ValidationBounds::default()).is_ok());
    }

    #[test]
    fn signal_out_of_range_is_rejected() {
        let state = sample().with_signal_level(-200.0);
        let err = state.validate(&ValidationBounds::default()).unwrap_err();
        assert!(matches!(err, ValidationError::SignalOutOfRange { .. }));

        let state = sample().with_signal_level(10.0);
        assert!(state.validate(&ValidationBounds::default()).is_err());
    }

    #[test]
    fn negative_latency_is_rejected() {
        let err = sample()
            .with_latency(-1.0)
            .validate(&ValidationBounds::default())
            .unwrap_err();
        assert!(matches!(err, ValidationError::NegativeLatency { .. }));
    }

    #[test]
    fn packet_loss_above_one_is_rejected() {
        let err = sample()
            .with_packet_loss(1.2)
            .validate(&ValidationBounds::default())
            .unwrap_err();
        assert!(matches!(err, ValidationError::PacketLossOutOfRange { .. }));
        assert!(sample()
            .with_packet_loss(1.0)
            .validate(&ValidationBounds::default())
            .is_ok());
    }

    #[test]
    fn nan_metric_is_rejected() {
        let err = sample()
            .with_throughput(f64::NAN)
            .validate(&ValidationBounds::default())
            .unwrap_err();
        assert!(err.to_string().contains("throughput"));
    }

    #[test]
    fn serialized_layout() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["id"], "7");
        assert_eq!(json["timestamp"], 1_500_000_000i64);
        assert_eq!(json["position"], serde_json::json!([1.0, 2.0, 3.0]));
        assert_eq!(json["signal_level"], -90.0);
        assert_eq!(json["custom_metrics"]["cqi"], 11.0);
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let json = r#"{
            "id": "ue-1",
            "timestamp": 10,
            "signal_level": -70.0,
            "latency": 5.0,
            "packet_loss": 0.0,
            "vendor_extension": {"foo": 1}
        }"#;
        let state: ComponentState = serde_json::from_str(json).unwrap();
        assert_eq!(state.id, "ue-1");
        assert_eq!(state.position, Vector3::default());
    }

    #[test]
    fn timestamp_conversions() {
        let t = Timestamp::from_millis(1500);
        assert_eq!(t.ticks(), 1_500_000_000);
        assert!((t.as_secs_f64() - 1.5).abs() < 1e-12);
        assert!((t.offset_secs(0.5).seconds_since(t) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn timestamp_arithmetic_at_tick_extremes() {
        let low = Timestamp::from_ticks(i64::MIN + 1);
        let high = Timestamp::from_ticks(i64::MAX - 1);

        let span = high.seconds_since(low);
        assert!(span.is_finite());
        assert!((span - 2.0 * i64::MAX as f64 / 1e9).abs() / span < 1e-12);
        assert!((low.seconds_since(high) + span).abs() < 1e-6);

        assert_eq!(high.offset_secs(1e12).ticks(), i64::MAX);
        assert_eq!(low.offset_secs(-1e12).ticks(), i64::MIN);
        assert_eq!(high.offset_secs(f64::INFINITY).ticks(), i64::MAX);
        assert_eq!(Timestamp::from_millis(i64::MAX).ticks(), i64::MAX);
    }
}
