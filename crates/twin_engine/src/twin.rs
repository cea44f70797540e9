//! DigitalTwin - the twin service and its query / what-if surface.
//!
//! Owns the store and the engines. Subscribers are invoked synchronously
//! after the store lock has been released.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use contracts::{
    AggregateMetrics, AggregatePrediction, AnomalyCallback, AnomalyRecord, CapacityEstimate,
    ComponentId, ComponentState, OptimizationObjective, PredictionResult, ResourceAllocation,
    StateChangeCallback, Timestamp, TwinEngineConfig, TwinSnapshot, ValidationError,
    WhatIfScenario,
};
use observability::metrics::{record_prediction_confidence, record_update};
use tracing::{debug, info, instrument, warn};

use crate::anomaly::AnomalyDetector;
use crate::optimization::OptimizationEngine;
use crate::store::{TwinStore, UpdateOutcome};
use crate::TwinError;

/// Result of a snapshot import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Records applied to the store
    pub applied: usize,
    /// Records identical to the current state
    pub unchanged: usize,
    /// Records rejected by validation
    pub skipped: Vec<ComponentId>,
}

/// Digital twin service
pub struct DigitalTwin {
    config: TwinEngineConfig,
    store: TwinStore,
    optimizer: OptimizationEngine,
    detector: AnomalyDetector,
    anomaly_detection: AtomicBool,
    anomalies: Mutex<BTreeMap<ComponentId, AnomalyRecord>>,
    latest_metrics: Mutex<Option<AggregateMetrics>>,
    state_callbacks: RwLock<Vec<StateChangeCallback>>,
    anomaly_callbacks: RwLock<Vec<AnomalyCallback>>,
}

impl std::fmt::Debug for DigitalTwin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigitalTwin")
            .field("components", &self.store.len())
            .field("anomaly_detection", &self.anomaly_detection_enabled())
            .finish()
    }
}

impl DigitalTwin {
    /// Build a twin from a validated configuration
    ///
    /// # Errors
    /// `TwinError::Config` when a configuration rule is violated.
    pub fn new(config: TwinEngineConfig) -> Result<Self, TwinError> {
        config.check().map_err(TwinError::Config)?;

        info!(
            sync_interval_ms = config.sync_interval_ms,
            history_capacity = config.history.capacity,
            significant_change_db = config.significant_change_db,
            "Digital twin created"
        );

        Ok(Self {
            store: TwinStore::new(&config),
            optimizer: OptimizationEngine::new(config.capacity.clone()),
            detector: AnomalyDetector::new(config.anomaly.clone()),
            anomaly_detection: AtomicBool::new(config.anomaly_detection),
            anomalies: Mutex::new(BTreeMap::new()),
            latest_metrics: Mutex::new(None),
            state_callbacks: RwLock::new(Vec::new()),
            anomaly_callbacks: RwLock::new(Vec::new()),
            config,
        })
    }

    pub fn config(&self) -> &TwinEngineConfig {
        &self.config
    }

    // ===== State =====

    /// Apply a record; state-change subscribers run for significant updates
    ///
    /// # Errors
    /// The violated invariant; nothing is stored.
    pub fn update_state(&self, record: ComponentState) -> Result<UpdateOutcome, ValidationError> {
        let notify = self.has_state_subscribers().then(|| record.clone());

        let outcome = match self.store.update(record) {
            Ok(outcome) => outcome,
            Err(e) => {
                record_update("rejected");
                warn!(component_id = %e.component_id(), error = %e, "Rejected state update");
                return Err(e);
            }
        };
        record_update(outcome.as_str());

        if let (true, Some(record)) = (outcome.is_significant(), notify) {
            let callbacks = read_lock(&self.state_callbacks).clone();
            for callback in &callbacks {
                callback(&record);
            }
        }
        Ok(outcome)
    }

    pub fn get_state(&self, id: &str) -> Option<ComponentState> {
        self.store.get(id)
    }

    pub fn get_all_states(&self) -> Vec<ComponentState> {
        self.store.get_all()
    }

    pub fn get_history(&self, id: &str) -> Vec<ComponentState> {
        self.store.history(id)
    }

    pub fn component_count(&self) -> usize {
        self.store.len()
    }

    pub fn component_ids(&self) -> Vec<ComponentId> {
        self.store.ids()
    }

    /// Retire a component and its findings
    pub fn remove_component(&self, id: &str) -> Option<ComponentState> {
        lock(&self.anomalies).remove(id);
        self.store.remove(id)
    }

    // ===== Subscribers =====

    pub fn on_state_change(&self, callback: StateChangeCallback) {
        write_lock(&self.state_callbacks).push(callback);
    }

    pub fn on_anomaly(&self, callback: AnomalyCallback) {
        write_lock(&self.anomaly_callbacks).push(callback);
    }

    fn has_state_subscribers(&self) -> bool {
        !read_lock(&self.state_callbacks).is_empty()
    }

    // ===== Prediction =====

    pub fn predict(&self, id: &str, future: Timestamp) -> PredictionResult {
        let result = self.store.predict(&ComponentId::from(id), future);
        if result.predicted.is_some() {
            record_prediction_confidence(result.confidence);
        }
        result
    }

    /// Forecast `horizon_secs` past the component's latest record
    pub fn predict_ahead(&self, id: &str, horizon_secs: f64) -> PredictionResult {
        match self.store.get(id) {
            Some(current) => self.predict(id, current.timestamp.offset_secs(horizon_secs)),
            None => PredictionResult::insufficient(id.into(), Timestamp::now()),
        }
    }

    pub fn predict_aggregate(&self, future: Timestamp) -> AggregatePrediction {
        self.store.predict_aggregate(future)
    }

    // ===== Optimization =====

    pub fn run_what_if(&self, scenario: &WhatIfScenario) -> Vec<ComponentState> {
        self.optimizer.run_what_if(scenario)
    }

    /// Run a what-if against a copy of the live state
    pub fn simulate(
        &self,
        id: impl Into<String>,
        parameters: BTreeMap<String, f64>,
    ) -> Vec<ComponentState> {
        let scenario = WhatIfScenario {
            id: id.into(),
            parameters,
            outcomes: self.store.get_all(),
        };
        self.optimizer.run_what_if(&scenario)
    }

    pub fn optimize_configuration(
        &self,
        objective: OptimizationObjective,
        constraints: &BTreeMap<String, f64>,
    ) -> BTreeMap<String, f64> {
        self.optimizer.optimize_configuration(objective, constraints)
    }

    pub fn optimize_resource_allocation(&self) -> BTreeMap<ComponentId, ResourceAllocation> {
        self.optimizer
            .optimize_resource_allocation(&self.store.get_all())
    }

    pub fn analyze_capacity_requirements(&self, horizon_days: f64) -> CapacityEstimate {
        self.optimizer
            .analyze_capacity_requirements(horizon_days, &self.store.get_all())
    }

    // ===== Anomalies =====

    pub fn set_anomaly_detection(&self, enabled: bool) {
        self.anomaly_detection.store(enabled, Ordering::Relaxed);
    }

    pub fn anomaly_detection_enabled(&self) -> bool {
        self.anomaly_detection.load(Ordering::Relaxed)
    }

    /// Run the anomaly pass and replace the stored findings
    ///
    /// Anomaly subscribers run once per flagged component.
    #[instrument(level = "debug", name = "twin_detect_anomalies", skip(self))]
    pub fn detect_anomalies(&self) -> Vec<AnomalyRecord> {
        let findings = self.detector.detect(&self.store.get_all());

        *lock(&self.anomalies) = findings
            .iter()
            .map(|r| (r.component_id.clone(), r.clone()))
            .collect();

        if !findings.is_empty() {
            debug!(flagged = findings.len(), "Anomalies detected");
            let callbacks = read_lock(&self.anomaly_callbacks).clone();
            for record in &findings {
                for callback in &callbacks {
                    callback(record);
                }
            }
        }
        findings
    }

    /// Findings of the last pass, sorted by id
    pub fn anomalies(&self) -> Vec<AnomalyRecord> {
        lock(&self.anomalies).values().cloned().collect()
    }

    // ===== Metrics =====

    /// Recompute aggregate metrics from current state
    pub fn refresh_metrics(&self) -> AggregateMetrics {
        let anomalous = lock(&self.anomalies).len();
        let metrics =
            AggregateMetrics::from_records(Timestamp::now(), &self.store.get_all(), anomalous);
        *lock(&self.latest_metrics) = Some(metrics.clone());
        metrics
    }

    pub fn latest_metrics(&self) -> Option<AggregateMetrics> {
        lock(&self.latest_metrics).clone()
    }

    // ===== Snapshot export / import =====

    pub fn export_snapshot(&self) -> TwinSnapshot {
        TwinSnapshot::from_records(Timestamp::now(), self.store.get_all())
    }

    pub fn export_json(&self) -> Result<String, TwinError> {
        Ok(self.export_snapshot().to_json()?)
    }

    /// Parse and apply a snapshot document
    ///
    /// # Errors
    /// `TwinError::SnapshotParse` when the document is malformed; no record
    /// is applied in that case.
    pub fn import_json(&self, json: &str) -> Result<ImportReport, TwinError> {
        let snapshot = TwinSnapshot::from_json(json).map_err(TwinError::snapshot_parse)?;
        Ok(self.import_snapshot(snapshot))
    }

    /// Apply every record of `snapshot`; invalid records are skipped
    #[instrument(
        name = "twin_import_snapshot",
        skip(self, snapshot),
        fields(components = snapshot.components.len())
    )]
    pub fn import_snapshot(&self, snapshot: TwinSnapshot) -> ImportReport {
        let mut report = ImportReport::default();
        for record in snapshot.into_records() {
            let id = record.id.clone();
            match self.update_state(record) {
                Ok(UpdateOutcome::Unchanged) => report.unchanged += 1,
                Ok(_) => report.applied += 1,
                Err(_) => report.skipped.push(id),
            }
        }
        info!(
            applied = report.applied,
            unchanged = report.unchanged,
            skipped = report.skipped.len(),
            "Snapshot imported"
        );
        report
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
