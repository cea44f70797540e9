//! What-if scenarios and optimization result types

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ComponentState, ContractError};

/// Hypothetical parameter changes applied to a set of baseline records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WhatIfScenario {
    pub id: String,
    /// Named numeric parameters, applied in key order
    #[serde(default)]
    pub parameters: BTreeMap<String, f64>,
    /// Baseline records the parameters act on
    #[serde(default)]
    pub outcomes: Vec<ComponentState>,
}

impl WhatIfScenario {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: f64) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    pub fn with_outcomes(mut self, outcomes: Vec<ComponentState>) -> Self {
        self.outcomes = outcomes;
        self
    }
}

/// Supported optimization objectives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationObjective {
    MaximizeThroughput,
    MinimizeLatency,
    MinimizeEnergy,
    MaximizeReliability,
}

impl OptimizationObjective {
    pub const ALL: [OptimizationObjective; 4] = [
        OptimizationObjective::MaximizeThroughput,
        OptimizationObjective::MinimizeLatency,
        OptimizationObjective::MinimizeEnergy,
        OptimizationObjective::MaximizeReliability,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OptimizationObjective::MaximizeThroughput => "maximize_throughput",
            OptimizationObjective::MinimizeLatency => "minimize_latency",
            OptimizationObjective::MinimizeEnergy => "minimize_energy",
            OptimizationObjective::MaximizeReliability => "maximize_reliability",
        }
    }
}

impl fmt::Display for OptimizationObjective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizationObjective {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|o| o.as_str() == s)
            .ok_or_else(|| ContractError::UnknownObjective { name: s.to_string() })
    }
}

/// Resource shares assigned to one component, each in `[0, 1]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceAllocation {
    pub compute_share: f64,
    pub memory_share: f64,
    pub bandwidth_share: f64,
}

/// Linear capacity projection over a planning horizon
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapacityEstimate {
    pub horizon_days: f64,
    pub current_units: usize,
    /// Additional components expected by the end of the horizon
    pub additional_units: f64,
    /// Current aggregate throughput (Mbps)
    pub current_bandwidth_mbps: f64,
    /// Throughput growth over the horizon (Mbps)
    pub bandwidth_growth_mbps: f64,
    /// Storage needed over the horizon (GB)
    pub storage_growth_gb: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objective_parses_known_names() {
        for objective in OptimizationObjective::ALL {
            let parsed: OptimizationObjective = objective.as_str().parse().unwrap();
            assert_eq!(parsed, objective);
        }
    }

    #[test]
    fn unknown_objective_fails() {
        let err = "maximize_happiness".parse::<OptimizationObjective>().unwrap_err();
        assert!(matches!(err, ContractError::UnknownObjective { ref name } if name == "maximize_happiness"));
    }

    #[test]
    fn scenario_builder_orders_parameters() {
        let scenario = WhatIfScenario::new("s1")
            .with_parameter("throughput_factor", 1.2)
            .with_parameter("latency_offset", 3.0);
        let keys: Vec<_> = scenario.parameters.keys().cloned().collect();
        assert_eq!(keys, vec!["latency_offset", "throughput_factor"]);
    }
}
