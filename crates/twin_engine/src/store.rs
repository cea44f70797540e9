//! TwinStore - authoritative map of component id to current record.
//!
//! One `RwLock` guards the current records, their history buffers and the
//! predictor's observation history, so an accepted update lands in all three
//! atomically. Single-key reads share read mode.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use contracts::{
    AggregatePrediction, ComponentId, ComponentState, PredictionResult, Timestamp,
    TwinEngineConfig, ValidationBounds, ValidationError,
};
use tracing::{debug, instrument};

use crate::history::HistoryBuffer;
use crate::predictive::PredictiveEngine;

/// Result of an accepted update
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpdateOutcome {
    /// First record for this component
    Inserted,
    /// Current record replaced
    Updated {
        /// Signal level moved by more than the configured threshold
        significant: bool,
        /// `new - old` signal level (dB)
        signal_delta_db: f64,
    },
    /// Identical to the current record, nothing changed
    Unchanged,
}

impl UpdateOutcome {
    pub fn is_significant(self) -> bool {
        match self {
            UpdateOutcome::Inserted => true,
            UpdateOutcome::Updated { significant, .. } => significant,
            UpdateOutcome::Unchanged => false,
        }
    }

    /// Label used for the `twin_updates_total` metric
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateOutcome::Inserted => "inserted",
            UpdateOutcome::Updated { .. } => "updated",
            UpdateOutcome::Unchanged => "unchanged",
        }
    }
}

#[derive(Debug)]
struct Entry {
    current: ComponentState,
    history: HistoryBuffer,
}

#[derive(Debug)]
struct StoreState {
    entries: HashMap<ComponentId, Entry>,
    predictor: PredictiveEngine,
}

/// In-memory mirror of every tracked component
#[derive(Debug)]
pub struct TwinStore {
    state: RwLock<StoreState>,
    bounds: ValidationBounds,
    history_capacity: usize,
    significant_change_db: f64,
}

impl TwinStore {
    pub fn new(config: &TwinEngineConfig) -> Self {
        Self {
            state: RwLock::new(StoreState {
                entries: HashMap::new(),
                predictor: PredictiveEngine::new(config.prediction.history_capacity),
            }),
            bounds: config.validation.clone(),
            history_capacity: config.history.capacity,
            significant_change_db: config.significant_change_db,
        }
    }

    /// Validate and apply a record
    ///
    /// # Errors
    /// The violated invariant; the store is left untouched.
    #[instrument(
        level = "trace",
        name = "twin_store_update",
        skip(self, record),
        fields(component_id = %record.id, timestamp = %record.timestamp)
    )]
    pub fn update(&self, record: ComponentState) -> Result<UpdateOutcome, ValidationError> {
        record.validate(&self.bounds)?;

        let mut state = self.write();
        let StoreState { entries, predictor } = &mut *state;

        let outcome = match entries.get_mut(&record.id) {
            Some(entry) if entry.current == record => return Ok(UpdateOutcome::Unchanged),
            Some(entry) => {
                let delta = record.signal_level - entry.current.signal_level;
                predictor.add_observation(&record);
                entry.history.push(record.clone());
                entry.current = record;
                UpdateOutcome::Updated {
                    significant: delta.abs() > self.significant_change_db,
                    signal_delta_db: delta,
                }
            }
            None => {
                predictor.add_observation(&record);
                let mut history = HistoryBuffer::new(self.history_capacity);
                history.push(record.clone());
                debug!(component_id = %record.id, "Component added to twin");
                entries.insert(
                    record.id.clone(),
                    Entry {
                        current: record,
                        history,
                    },
                );
                UpdateOutcome::Inserted
            }
        };
        Ok(outcome)
    }

    pub fn get(&self, id: &str) -> Option<ComponentState> {
        self.read().entries.get(id).map(|e| e.current.clone())
    }

    /// Copy of every current record, sorted by id
    pub fn get_all(&self) -> Vec<ComponentState> {
        let mut all: Vec<_> = self
            .read()
            .entries
            .values()
            .map(|e| e.current.clone())
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// History of `id`, oldest first; empty for unknown ids
    pub fn history(&self, id: &str) -> Vec<ComponentState> {
        self.read()
            .entries
            .get(id)
            .map(|e| e.history.to_vec())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().entries.is_empty()
    }

    /// Tracked ids, sorted
    pub fn ids(&self) -> Vec<ComponentId> {
        let mut ids: Vec<_> = self.read().entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Retire a component: current record, history and predictor history
    pub fn remove(&self, id: &str) -> Option<ComponentState> {
        let mut state = self.write();
        state.predictor.remove(id);
        state.entries.remove(id).map(|e| e.current)
    }

    pub fn predict(&self, id: &ComponentId, future: Timestamp) -> PredictionResult {
        self.read().predictor.predict(id, future)
    }

    pub fn predict_aggregate(&self, future: Timestamp) -> AggregatePrediction {
        self.read().predictor.predict_aggregate(future)
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
