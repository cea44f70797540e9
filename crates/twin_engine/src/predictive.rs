//! Linear extrapolation forecaster.
//!
//! Keeps its own per-component observation history (independent of the
//! store's history buffers) and extrapolates from the last two observations.
//!
//! With `a`, `b` the last two observations and `future` the target instant:
//!
//! ```text
//! Δh    = b.t - a.t
//! Δf    = future - b.t
//! ratio = Δf / Δh
//! pos   = b.pos + b.vel * Δf
//! m     = b.m + (b.m - a.m) * ratio
//! conf  = clamp(1 - ratio, 0, 1)
//! ```

use std::collections::{HashMap, VecDeque};

use contracts::{
    AggregatePrediction, ComponentId, ComponentState, Metric, PredictionResult, Timestamp, Vector3,
    LINEAR_EXTRAPOLATION,
};
use nalgebra::Vector3 as NaVector3;
use tracing::trace;

/// Per-component forecaster
#[derive(Debug)]
pub struct PredictiveEngine {
    capacity: usize,
    histories: HashMap<ComponentId, VecDeque<ComponentState>>,
}

impl PredictiveEngine {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(2),
            histories: HashMap::new(),
        }
    }

    /// Append an observation, dropping the oldest beyond capacity
    pub fn add_observation(&mut self, record: &ComponentState) {
        let capacity = self.capacity;
        let history = self
            .histories
            .entry(record.id.clone())
            .or_insert_with(|| VecDeque::with_capacity(capacity.min(64)));
        if history.len() == capacity {
            history.pop_front();
        }
        history.push_back(record.clone());
    }

    pub fn observation_count(&self, id: &str) -> usize {
        self.histories.get(id).map_or(0, VecDeque::len)
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.histories.remove(id).is_some()
    }

    /// Forecast the state of `id` at `future`
    ///
    /// Fewer than two observations, or a non-positive observation interval,
    /// yield a zero-confidence result without a forecast.
    pub fn predict(&self, id: &ComponentId, future: Timestamp) -> PredictionResult {
        let Some((a, b)) = self.last_two(id) else {
            return PredictionResult::insufficient(id.clone(), future);
        };

        let dh = b.timestamp.seconds_since(a.timestamp);
        if dh <= 0.0 {
            trace!(component_id = %id, "non-increasing timestamps, cannot extrapolate");
            return PredictionResult::insufficient(id.clone(), future);
        }
        let df = future.seconds_since(b.timestamp);
        let ratio = df / dh;

        let mut predicted = b.clone();
        predicted.timestamp = future;
        predicted.position = extrapolate_position(b.position, b.velocity, df);

        for metric in Metric::ALL {
            let (va, vb) = (metric.value(a), metric.value(b));
            metric.set(&mut predicted, metric.clamp(vb + (vb - va) * ratio));
        }
        for (name, vb) in &b.custom_metrics {
            if let Some(va) = a.custom_metrics.get(name) {
                predicted
                    .custom_metrics
                    .insert(name.clone(), vb + (vb - va) * ratio);
            }
        }

        PredictionResult {
            component_id: id.clone(),
            algorithm: LINEAR_EXTRAPOLATION.to_string(),
            target_time: future,
            predicted: Some(predicted),
            confidence: (1.0 - ratio).clamp(0.0, 1.0),
            horizon_ratio: ratio,
        }
    }

    /// Forecast every tracked component and combine the results
    pub fn predict_aggregate(&self, future: Timestamp) -> AggregatePrediction {
        let mut aggregate = AggregatePrediction {
            target_time: future,
            ..Default::default()
        };

        for id in self.histories.keys() {
            let result = self.predict(id, future);
            let Some(state) = result.predicted else {
                continue;
            };
            aggregate.contributors += 1;
            aggregate.total_throughput += state.throughput;
            aggregate.mean_latency += state.latency;
            aggregate.mean_signal_level += state.signal_level;
            aggregate.mean_packet_loss += state.packet_loss;
            aggregate.mean_confidence += result.confidence;
        }

        if aggregate.contributors > 0 {
            let n = aggregate.contributors as f64;
            aggregate.mean_latency /= n;
            aggregate.mean_signal_level /= n;
            aggregate.mean_packet_loss /= n;
            aggregate.mean_confidence /= n;
        }
        aggregate
    }

    fn last_two(&self, id: &str) -> Option<(&ComponentState, &ComponentState)> {
        let history = self.histories.get(id)?;
        let n = history.len();
        if n < 2 {
            return None;
        }
        Some((&history[n - 2], &history[n - 1]))
    }
}

#[inline]
fn extrapolate_position(position: Vector3, velocity: Vector3, dt: f64) -> Vector3 {
    let p = NaVector3::new(position.x, position.y, position.z)
        + NaVector3::new(velocity.x, velocity.y, velocity.z) * dt;
    Vector3::new(p.x, p.y, p.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(id: &str, secs: f64, signal: f64, latency: f64) -> ComponentState {
        ComponentState::new(id, Timestamp::from_secs_f64(secs))
            .with_signal_level(signal)
            .with_latency(latency)
            .with_packet_loss(0.01)
            .with_throughput(50.0)
    }

    fn engine_with_pair() -> PredictiveEngine {
        let mut engine = PredictiveEngine::new(1000);
        engine.add_observation(&observation("7", 10.0, -90.0, 12.0));
        engine.add_observation(&observation("7", 11.0, -80.0, 15.0));
        engine
    }

    #[test]
    fn test_one_interval_ahead() {
        let engine = engine_with_pair();
        let result = engine.predict(&"7".into(), Timestamp::from_secs_f64(12.0));

        let predicted = result.predicted.expect("forecast");
        assert!((predicted.signal_level - -70.0).abs() < 1e-9);
        assert!((predicted.latency - 18.0).abs() < 1e-9);
        assert!(result.confidence.abs() < 1e-9);
        assert!((result.horizon_ratio - 1.0).abs() < 1e-9);
        assert_eq!(result.algorithm, LINEAR_EXTRAPOLATION);
    }

    #[test]
    fn test_confidence_decreases_with_horizon() {
        let engine = engine_with_pair();
        let id: ComponentId = "7".into();

        let mut previous = f64::INFINITY;
        for step in 1..10 {
            let future = Timestamp::from_secs_f64(11.0 + step as f64 * 0.1);
            let confidence = engine.predict(&id, future).confidence;
            assert!(confidence < previous);
            previous = confidence;
        }
        let beyond = engine.predict(&id, Timestamp::from_secs_f64(13.5));
        assert_eq!(beyond.confidence, 0.0);
    }

    #[test]
    fn test_insufficient_history() {
        let mut engine = PredictiveEngine::new(1000);
        let id: ComponentId = "lonely".into();
        assert!(engine.predict(&id, Timestamp::from_secs_f64(1.0)).predicted.is_none());

        engine.add_observation(&observation("lonely", 0.0, -90.0, 1.0));
        let result = engine.predict(&id, Timestamp::from_secs_f64(1.0));
        assert!(result.predicted.is_none());
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_equal_timestamps_are_insufficient() {
        let mut engine = PredictiveEngine::new(1000);
        engine.add_observation(&observation("x", 1.0, -90.0, 1.0));
        engine.add_observation(&observation("x", 1.0, -85.0, 1.0));
        let result = engine.predict(&"x".into(), Timestamp::from_secs_f64(2.0));
        assert!(result.predicted.is_none());
    }

    #[test]
    fn test_position_follows_velocity_and_metrics_clamp() {
        let mut engine = PredictiveEngine::new(1000);
        engine.add_observation(
            &observation("car", 0.0, -90.0, 10.0)
                .with_packet_loss(0.5)
                .with_custom_metric("cqi", 10.0),
        );
        engine.add_observation(
            &observation("car", 1.0, -90.0, 2.0)
                .with_packet_loss(0.9)
                .with_position(Vector3::new(10.0, 0.0, 0.0))
                .with_velocity(Vector3::new(2.0, -1.0, 0.0))
                .with_custom_metric("cqi", 12.0),
        );

        let predicted = engine
            .predict(&"car".into(), Timestamp::from_secs_f64(3.0))
            .predicted
            .unwrap();
        assert_eq!(predicted.position, Vector3::new(14.0, -2.0, 0.0));
        assert_eq!(predicted.latency, 0.0);
        assert_eq!(predicted.packet_loss, 1.0);
        assert!((predicted.custom_metrics["cqi"] - 16.0).abs() < 1e-9);
        assert_eq!(predicted.timestamp, Timestamp::from_secs_f64(3.0));
    }

    #[test]
    fn test_history_is_bounded() {
        let mut engine = PredictiveEngine::new(3);
        for i in 0..10 {
            engine.add_observation(&observation("b", i as f64, -90.0, 1.0));
        }
        assert_eq!(engine.observation_count("b"), 3);
    }

    #[test]
    fn test_aggregate_skips_components_without_forecast() {
        let mut engine = engine_with_pair();
        engine.add_observation(&observation("8", 11.0, -100.0, 30.0));

        let aggregate = engine.predict_aggregate(Timestamp::from_secs_f64(11.5));
        assert_eq!(aggregate.contributors, 1);
        assert!((aggregate.mean_signal_level - -75.0).abs() < 1e-9);
        assert!((aggregate.mean_latency - 16.5).abs() < 1e-9);
        assert!((aggregate.total_throughput - 50.0).abs() < 1e-9);
        assert!((aggregate.mean_confidence - 0.5).abs() < 1e-9);
    }
}
