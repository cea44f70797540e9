//! Optimization engine: what-if scenarios, configuration presets, resource
//! allocation and capacity planning.
//!
//! Every strategy is a pure function of its inputs; nothing here touches the
//! store.

use std::collections::BTreeMap;

use contracts::{
    CapacityEstimate, CapacityModelConfig, ComponentId, ComponentState, Metric,
    OptimizationObjective, ResourceAllocation, WhatIfScenario,
};
use tracing::{debug, instrument};

/// Parameters the what-if simulation understands
pub const THROUGHPUT_FACTOR: &str = "throughput_factor";
pub const LATENCY_OFFSET: &str = "latency_offset";
pub const SIGNAL_OFFSET: &str = "signal_offset";
pub const PACKET_LOSS_FACTOR: &str = "packet_loss_factor";
pub const ENERGY_FACTOR: &str = "energy_factor";
pub const SNR_OFFSET: &str = "snr_offset";

#[derive(Debug, Clone, Copy)]
enum Adjustment {
    Scale(Metric),
    Offset(Metric),
}

fn adjustment(name: &str) -> Option<Adjustment> {
    match name {
        THROUGHPUT_FACTOR => Some(Adjustment::Scale(Metric::Throughput)),
        LATENCY_OFFSET => Some(Adjustment::Offset(Metric::Latency)),
        SIGNAL_OFFSET => Some(Adjustment::Offset(Metric::SignalLevel)),
        PACKET_LOSS_FACTOR => Some(Adjustment::Scale(Metric::PacketLoss)),
        ENERGY_FACTOR => Some(Adjustment::Scale(Metric::EnergyLevel)),
        SNR_OFFSET => Some(Adjustment::Offset(Metric::Snr)),
        _ => None,
    }
}

/// Radio configuration parameter names
pub const TX_POWER_DBM: &str = "tx_power_dbm";
pub const BANDWIDTH_MHZ: &str = "bandwidth_mhz";
pub const SCHEDULING_INTERVAL_MS: &str = "scheduling_interval_ms";
pub const MCS_INDEX: &str = "mcs_index";
pub const HARQ_RETRANSMISSIONS: &str = "harq_retransmissions";

/// Stateless strategies over borrowed state
#[derive(Debug, Clone, Default)]
pub struct OptimizationEngine {
    capacity_model: CapacityModelConfig,
}

impl OptimizationEngine {
    pub fn new(capacity_model: CapacityModelConfig) -> Self {
        Self { capacity_model }
    }

    /// Apply the scenario parameters to every outcome record
    ///
    /// Parameters are applied in key order; unknown names are ignored.
    /// Results are clamped to physical ranges.
    #[instrument(
        level = "debug",
        name = "optimization_what_if",
        skip(self, scenario),
        fields(scenario = %scenario.id, records = scenario.outcomes.len())
    )]
    pub fn run_what_if(&self, scenario: &WhatIfScenario) -> Vec<ComponentState> {
        let adjustments: Vec<(Adjustment, f64)> = scenario
            .parameters
            .iter()
            .filter_map(|(name, value)| match adjustment(name) {
                Some(adj) => Some((adj, *value)),
                None => {
                    debug!(parameter = %name, "Ignoring unknown what-if parameter");
                    None
                }
            })
            .collect();

        scenario
            .outcomes
            .iter()
            .map(|baseline| {
                let mut outcome = baseline.clone();
                for (adj, value) in &adjustments {
                    let (metric, adjusted) = match *adj {
                        Adjustment::Scale(m) => (m, m.value(&outcome) * value),
                        Adjustment::Offset(m) => (m, m.value(&outcome) + value),
                    };
                    metric.set(&mut outcome, metric.clamp(adjusted));
                }
                outcome
            })
            .collect()
    }

    /// Parameter preset for `objective`, clamped to any upper bound in
    /// `constraints` with the same key
    pub fn optimize_configuration(
        &self,
        objective: OptimizationObjective,
        constraints: &BTreeMap<String, f64>,
    ) -> BTreeMap<String, f64> {
        preset(objective)
            .into_iter()
            .map(|(name, value)| {
                let value = match constraints.get(name) {
                    Some(bound) => value.min(*bound),
                    None => value,
                };
                (name.to_string(), value)
            })
            .collect()
    }

    /// Compute and memory split evenly; bandwidth proportional to
    /// throughput (even split when total throughput is zero)
    pub fn optimize_resource_allocation(
        &self,
        states: &[ComponentState],
    ) -> BTreeMap<ComponentId, ResourceAllocation> {
        if states.is_empty() {
            return BTreeMap::new();
        }
        let even = 1.0 / states.len() as f64;
        let total_throughput: f64 = states.iter().map(|s| s.throughput.max(0.0)).sum();

        states
            .iter()
            .map(|s| {
                let bandwidth_share = if total_throughput > 0.0 {
                    s.throughput.max(0.0) / total_throughput
                } else {
                    even
                };
                (
                    s.id.clone(),
                    ResourceAllocation {
                        compute_share: even,
                        memory_share: even,
                        bandwidth_share,
                    },
                )
            })
            .collect()
    }

    /// Linear projection over `horizon_days`
    pub fn analyze_capacity_requirements(
        &self,
        horizon_days: f64,
        states: &[ComponentState],
    ) -> CapacityEstimate {
        let horizon = horizon_days.max(0.0);
        let units = states.len();
        let bandwidth: f64 = states.iter().map(|s| s.throughput).sum();
        let model = &self.capacity_model;

        let additional_units = units as f64 * model.unit_growth_per_day * horizon;
        CapacityEstimate {
            horizon_days: horizon,
            current_units: units,
            additional_units,
            current_bandwidth_mbps: bandwidth,
            bandwidth_growth_mbps: bandwidth * model.bandwidth_growth_per_day * horizon,
            storage_growth_gb: (units as f64 + additional_units / 2.0)
                * model.storage_gb_per_component_day
                * horizon,
        }
    }
}

fn preset(objective: OptimizationObjective) -> [(&'static str, f64); 5] {
    match objective {
        OptimizationObjective::MaximizeThroughput => [
            (TX_POWER_DBM, 23.0),
            (BANDWIDTH_MHZ, 100.0),
            (SCHEDULING_INTERVAL_MS, 1.0),
            (MCS_INDEX, 27.0),
            (HARQ_RETRANSMISSIONS, 1.0),
        ],
        OptimizationObjective::MinimizeLatency => [
            (TX_POWER_DBM, 20.0),
            (BANDWIDTH_MHZ, 40.0),
            (SCHEDULING_INTERVAL_MS, 0.125),
            (MCS_INDEX, 16.0),
            (HARQ_RETRANSMISSIONS, 0.0),
        ],
        OptimizationObjective::MinimizeEnergy => [
            (TX_POWER_DBM, 10.0),
            (BANDWIDTH_MHZ, 20.0),
            (SCHEDULING_INTERVAL_MS, 10.0),
            (MCS_INDEX, 9.0),
            (HARQ_RETRANSMISSIONS, 1.0),
        ],
        OptimizationObjective::MaximizeReliability => [
            (TX_POWER_DBM, 23.0),
            (BANDWIDTH_MHZ, 40.0),
            (SCHEDULING_INTERVAL_MS, 2.0),
            (MCS_INDEX, 5.0),
            (HARQ_RETRANSMISSIONS, 4.0),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Timestamp;

    fn state(id: &str, throughput: f64, latency: f64, loss: f64) -> ComponentState {
        ComponentState::new(id, Timestamp::from_millis(1))
            .with_signal_level(-90.0)
            .with_throughput(throughput)
            .with_latency(latency)
            .with_packet_loss(loss)
    }

    #[test]
    fn test_what_if_applies_parameters() {
        let engine = OptimizationEngine::default();
        let scenario = WhatIfScenario::new("boost")
            .with_parameter(THROUGHPUT_FACTOR, 1.5)
            .with_parameter(LATENCY_OFFSET, -20.0)
            .with_parameter(PACKET_LOSS_FACTOR, 30.0)
            .with_parameter(SIGNAL_OFFSET, 3.0)
            .with_parameter("antenna_tilt", 4.0)
            .with_outcomes(vec![state("a", 100.0, 12.0, 0.05)]);

        let results = engine.run_what_if(&scenario);
        assert_eq!(results.len(), 1);
        let r = &results[0];
        assert!((r.throughput - 150.0).abs() < 1e-9);
        assert_eq!(r.latency, 0.0);
        assert_eq!(r.packet_loss, 1.0);
        assert!((r.signal_level - -87.0).abs() < 1e-9);
    }

    #[test]
    fn test_what_if_is_pure() {
        let engine = OptimizationEngine::default();
        let baseline = vec![state("a", 10.0, 5.0, 0.0), state("b", 20.0, 6.0, 0.01)];
        let scenario = WhatIfScenario::new("s")
            .with_parameter(ENERGY_FACTOR, 0.5)
            .with_outcomes(baseline.clone());

        let first = engine.run_what_if(&scenario);
        let second = engine.run_what_if(&scenario);
        assert_eq!(first, second);
        assert_eq!(scenario.outcomes, baseline);
    }

    #[test]
    fn test_configuration_respects_constraints() {
        let engine = OptimizationEngine::default();
        let constraints = BTreeMap::from([
            (TX_POWER_DBM.to_string(), 15.0),
            ("unrelated".to_string(), 0.0),
        ]);

        let config =
            engine.optimize_configuration(OptimizationObjective::MaximizeThroughput, &constraints);
        assert_eq!(config[TX_POWER_DBM], 15.0);
        assert_eq!(config[BANDWIDTH_MHZ], 100.0);
        assert!(!config.contains_key("unrelated"));
        assert_eq!(config.len(), 5);

        let unconstrained =
            engine.optimize_configuration(OptimizationObjective::MinimizeEnergy, &BTreeMap::new());
        assert_eq!(unconstrained[TX_POWER_DBM], 10.0);
    }

    #[test]
    fn test_resource_shares_sum_to_one() {
        let engine = OptimizationEngine::default();
        let states = vec![
            state("a", 10.0, 1.0, 0.0),
            state("b", 30.0, 1.0, 0.0),
            state("c", 60.0, 1.0, 0.0),
        ];
        let allocation = engine.optimize_resource_allocation(&states);

        let sum = |f: fn(&ResourceAllocation) -> f64| allocation.values().map(f).sum::<f64>();
        assert!((sum(|a| a.compute_share) - 1.0).abs() < 1e-9);
        assert!((sum(|a| a.memory_share) - 1.0).abs() < 1e-9);
        assert!((sum(|a| a.bandwidth_share) - 1.0).abs() < 1e-9);
        assert!((allocation[&ComponentId::from("c")].bandwidth_share - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_resource_allocation_zero_throughput() {
        let engine = OptimizationEngine::default();
        let states = vec![state("a", 0.0, 1.0, 0.0), state("b", 0.0, 1.0, 0.0)];
        let allocation = engine.optimize_resource_allocation(&states);
        assert!(allocation.values().all(|a| (a.bandwidth_share - 0.5).abs() < 1e-9));
        assert!(engine.optimize_resource_allocation(&[]).is_empty());
    }

    #[test]
    fn test_capacity_is_linear_in_horizon() {
        let engine = OptimizationEngine::new(CapacityModelConfig {
            unit_growth_per_day: 0.1,
            bandwidth_growth_per_day: 0.05,
            storage_gb_per_component_day: 1.0,
        });
        let states = vec![state("a", 100.0, 1.0, 0.0), state("b", 100.0, 1.0, 0.0)];

        let month = engine.analyze_capacity_requirements(30.0, &states);
        assert_eq!(month.current_units, 2);
        assert!((month.additional_units - 6.0).abs() < 1e-9);
        assert!((month.bandwidth_growth_mbps - 300.0).abs() < 1e-9);
        assert!((month.storage_growth_gb - 150.0).abs() < 1e-9);

        let none = engine.analyze_capacity_requirements(0.0, &states);
        assert_eq!(none.additional_units, 0.0);
        assert_eq!(none.bandwidth_growth_mbps, 0.0);
    }
}
