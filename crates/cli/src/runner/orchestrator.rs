//! Twin runner - builds the twin, connectors and storage from a blueprint
//! and drives the sync loop until a limit or shutdown signal.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use connectors::{ConnectorFactory, ConnectorMetrics, SimulatorHandle};
use contracts::{AnomalyRecord, ComponentState, Connector, SnapshotStorage, TwinBlueprint};
use observability::CycleMetricsAggregator;
use storage::AnyStorage;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use twin_engine::{DigitalTwin, RegisteredConnector, SyncLoop};

use super::stats::{ConnectorStats, RunStats, StopReason};
use crate::error::CliError;

type TwinLoop = SyncLoop<connectors::AnyConnector, AnyStorage>;

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// The twin blueprint configuration
    pub blueprint: TwinBlueprint,

    /// Maximum number of cycles (None = unlimited)
    pub max_cycles: Option<u64>,

    /// Run timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Overrides `twin.sync_interval_ms`
    pub interval: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Snapshot applied before the first cycle
    pub import: Option<PathBuf>,

    /// Snapshot written after shutdown
    pub export: Option<PathBuf>,
}

/// Counters fed by twin callbacks
#[derive(Default)]
struct CallbackCounters {
    significant: AtomicU64,
    anomalies: AtomicU64,
}

/// Main run orchestrator
pub struct TwinRunner {
    config: RunnerConfig,
}

impl TwinRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Run until a limit is reached or `shutdown` resolves
    ///
    /// Shutdown is graceful in every case: the loop is stopped, connectors
    /// disconnected, storage flushed and the export written.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<RunStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        // Initialize Metrics (optional)
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let twin = Arc::new(
            DigitalTwin::new(blueprint.twin.clone()).map_err(|e| CliError::setup(e.to_string()))?,
        );
        let counters = Arc::new(CallbackCounters::default());
        register_callbacks(&twin, &counters);

        // Storage (optional)
        let mut storage = blueprint
            .storage
            .as_ref()
            .map(AnyStorage::from_config)
            .transpose()
            .map_err(|e| CliError::setup(e.to_string()))?;
        let storage_info = storage
            .as_ref()
            .map(|s| (s.name().to_string(), s.metrics()));

        // Seed the twin
        match &self.config.import {
            Some(path) => import_snapshot(&twin, path).await?,
            None => {
                if let Some(storage) = storage.as_mut() {
                    restore_latest(&twin, storage).await;
                }
            }
        }

        let sync: TwinLoop = SyncLoop::build(Arc::clone(&twin), storage);
        if let Some(interval) = self.config.interval {
            info!(interval_ms = interval.as_millis() as u64, "Overriding sync interval from CLI");
            sync.set_interval(interval);
        }

        // Connectors
        let (simulators, connector_metrics) = register_connectors(&sync, blueprint).await?;
        let connected = sync.connect_all().await;
        if connected < blueprint.connectors.len() {
            warn!(
                connected,
                configured = blueprint.connectors.len(),
                "Some connectors are not connected and will be skipped"
            );
        }

        // Drive
        let mut aggregator = CycleMetricsAggregator::new();
        let stop_reason = self.drive(&sync, &mut aggregator, shutdown).await;

        // Shutdown
        info!(reason = stop_reason.as_str(), "Shutting down twin...");
        let mut simulated_records = 0;
        for simulator in simulators {
            simulated_records += simulator.stop().await;
        }
        sync.shutdown().await;

        if let Some(path) = &self.config.export {
            export_snapshot(&twin, path).await?;
        }

        let stats = RunStats {
            duration: start_time.elapsed(),
            stop_reason,
            connected,
            connectors: connector_metrics
                .into_iter()
                .map(|(name, kind, metrics)| ConnectorStats {
                    name,
                    kind,
                    metrics: metrics.snapshot(),
                })
                .collect(),
            storage: storage_info.map(|(name, metrics)| (name, metrics.map(|m| m.snapshot()))),
            simulated_records,
            significant_changes: counters.significant.load(Ordering::Relaxed),
            anomalies_reported: counters.anomalies.load(Ordering::Relaxed),
            components: twin.component_count(),
            final_metrics: twin.latest_metrics(),
            cycles: aggregator,
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            cycles = stats.cycles.total_cycles,
            components = stats.components,
            "Twin shutdown complete"
        );
        Ok(stats)
    }

    /// Consume cycle reports until a stop condition
    async fn drive(
        &self,
        sync: &TwinLoop,
        aggregator: &mut CycleMetricsAggregator,
        shutdown: impl Future<Output = ()>,
    ) -> StopReason {
        let mut reports = sync.subscribe();

        if !sync.start() {
            warn!("Sync disabled, running a single cycle");
            let report = sync.run_cycle().await;
            aggregator.update(&report);
            return StopReason::SyncDisabled;
        }

        info!(
            max_cycles = ?self.config.max_cycles,
            interval_ms = sync.interval().as_millis() as u64,
            "Twin running"
        );

        let timeout = async {
            match self.config.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(timeout);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                received = reports.recv() => match received {
                    Ok(report) => {
                        debug!(
                            cycle = report.cycle,
                            pulled = report.pulled,
                            rejected = report.rejected,
                            pushed = report.pushed,
                            anomalies = report.anomalies,
                            components = report.metrics.active_components,
                            duration_ms = format!("{:.2}", report.duration_ms),
                            "Cycle completed"
                        );
                        aggregator.update(&report);

                        if self.config.max_cycles.is_some_and(|max| report.cycle >= max) {
                            info!(cycles = report.cycle, "Reached max cycles limit");
                            return StopReason::MaxCycles;
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "Cycle reports lagged, statistics incomplete");
                    }
                    Err(RecvError::Closed) => return StopReason::Signal,
                },
                _ = &mut timeout => {
                    warn!(timeout_secs = self.config.timeout.map(|t| t.as_secs()), "Run timed out");
                    return StopReason::Timeout;
                }
                _ = &mut shutdown => {
                    warn!("Received shutdown signal, stopping twin...");
                    return StopReason::Signal;
                }
            }
        }
    }
}

fn register_callbacks(twin: &DigitalTwin, counters: &Arc<CallbackCounters>) {
    let c = Arc::clone(counters);
    twin.on_state_change(Arc::new(move |state: &ComponentState| {
        c.significant.fetch_add(1, Ordering::Relaxed);
        debug!(component_id = %state.id, "Significant state change");
    }));

    let c = Arc::clone(counters);
    twin.on_anomaly(Arc::new(move |record: &AnomalyRecord| {
        c.anomalies.fetch_add(1, Ordering::Relaxed);
        let kinds: Vec<_> = record.anomalies.iter().map(|a| format!("{:?}", a.kind)).collect();
        warn!(component_id = %record.component_id, anomalies = ?kinds, "Anomaly detected");
    }));
}

type ConnectorHandles = (
    Vec<SimulatorHandle>,
    Vec<(String, &'static str, Arc<ConnectorMetrics>)>,
);

async fn register_connectors(sync: &TwinLoop, blueprint: &TwinBlueprint) -> Result<ConnectorHandles> {
    let factory = ConnectorFactory::default();
    let mut simulators = Vec::new();
    let mut metrics = Vec::new();

    for config in &blueprint.connectors {
        let built = factory
            .build(config)
            .with_context(|| format!("Failed to build connector '{}'", config.name))?;
        metrics.push((
            built.connector.name().to_string(),
            built.connector.kind(),
            built.connector.metrics(),
        ));
        if let Some(source) = built.source {
            simulators.push(source.spawn());
        }
        sync.register_connector(RegisteredConnector::new(
            built.endpoint,
            built.direction,
            built.connector,
        ))
        .await;
    }

    info!(
        connectors = metrics.len(),
        simulated = simulators.len(),
        "Connectors configured"
    );
    Ok((simulators, metrics))
}

async fn import_snapshot(twin: &DigitalTwin, path: &Path) -> Result<(), CliError> {
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CliError::snapshot(path, e.to_string()))?;
    let report = twin
        .import_json(&json)
        .map_err(|e| CliError::snapshot(path, e.to_string()))?;
    info!(
        path = %path.display(),
        applied = report.applied,
        skipped = report.skipped.len(),
        "Twin seeded from snapshot file"
    );
    Ok(())
}

/// Resume from the storage's latest snapshot; failures only warn
async fn restore_latest(twin: &DigitalTwin, storage: &mut AnyStorage) {
    match storage.load_latest().await {
        Ok(Some(snapshot)) => {
            let report = twin.import_snapshot(snapshot);
            info!(
                storage = storage.name(),
                applied = report.applied,
                skipped = report.skipped.len(),
                "Twin restored from latest snapshot"
            );
        }
        Ok(None) => debug!(storage = storage.name(), "No previous snapshot"),
        Err(e) => warn!(storage = storage.name(), error = %e, "Could not restore latest snapshot"),
    }
}

async fn export_snapshot(twin: &DigitalTwin, path: &Path) -> Result<(), CliError> {
    let json = twin
        .export_json()
        .map_err(|e| CliError::snapshot(path, e.to_string()))?;
    tokio::fs::write(path, json).await?;
    info!(path = %path.display(), components = twin.component_count(), "Twin snapshot exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_loader::{ConfigFormat, ConfigLoader};
    use tempfile::tempdir;

    fn blueprint(extra: &str) -> TwinBlueprint {
        let toml = format!(
            r#"
[twin]
sync_interval_ms = 10

[[connectors]]
name = "lab"
kind = "simulated"
endpoint = "lab"
params = {{ components = "4", interval_ms = "5", seed = "11", spike_probability = "0" }}
{extra}
"#
        );
        ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap()
    }

    fn config(blueprint: TwinBlueprint) -> RunnerConfig {
        RunnerConfig {
            blueprint,
            max_cycles: Some(3),
            timeout: Some(Duration::from_secs(10)),
            interval: None,
            metrics_port: None,
            import: None,
            export: None,
        }
    }

    #[tokio::test]
    async fn test_runs_to_max_cycles_and_exports() {
        let dir = tempdir().unwrap();
        let export = dir.path().join("twin.json");
        let mut config = config(blueprint(""));
        config.export = Some(export.clone());

        let stats = TwinRunner::new(config)
            .run(std::future::pending())
            .await
            .unwrap();

        assert_eq!(stats.stop_reason, StopReason::MaxCycles);
        assert!(stats.cycles.total_cycles >= 3);
        assert_eq!(stats.connected, 1);
        assert_eq!(stats.connectors[0].kind, "memory");
        assert!(stats.components > 0);

        let fresh = DigitalTwin::new(Default::default()).unwrap();
        import_snapshot(&fresh, &export).await.unwrap();
        assert_eq!(fresh.component_count(), stats.components);
    }

    #[tokio::test]
    async fn test_shutdown_signal_stops_run() {
        let mut config = config(blueprint(""));
        config.max_cycles = None;

        let stats = TwinRunner::new(config).run(async {}).await.unwrap();
        assert_eq!(stats.stop_reason, StopReason::Signal);
    }

    #[tokio::test]
    async fn test_sync_disabled_runs_single_cycle() {
        let mut blueprint = blueprint("");
        blueprint.twin.sync_enabled = false;

        let stats = TwinRunner::new(config(blueprint))
            .run(std::future::pending())
            .await
            .unwrap();
        assert_eq!(stats.stop_reason, StopReason::SyncDisabled);
        assert_eq!(stats.cycles.total_cycles, 1);
    }

    #[tokio::test]
    async fn test_file_storage_restores_next_run() {
        let dir = tempdir().unwrap();
        let storage = format!(
            "\n[storage]\nkind = \"file\"\nparams = {{ path = \"{}\", max_files = \"2\" }}\n",
            dir.path().display()
        );

        let first = TwinRunner::new(config(blueprint(&storage)))
            .run(std::future::pending())
            .await
            .unwrap();
        let (name, metrics) = first.storage.unwrap();
        assert_eq!(name, "file");
        assert!(metrics.unwrap().persisted >= 3);

        let mut blueprint = blueprint(&storage);
        blueprint.connectors.clear();
        blueprint.twin.sync_enabled = false;
        let second = TwinRunner::new(config(blueprint))
            .run(std::future::pending())
            .await
            .unwrap();
        assert_eq!(second.components, first.components);
    }

    #[tokio::test]
    async fn test_bad_import_fails_run() {
        let dir = tempdir().unwrap();
        let import = dir.path().join("broken.json");
        std::fs::write(&import, "{ not json").unwrap();

        let mut config = config(blueprint(""));
        config.import = Some(import);
        let err = TwinRunner::new(config)
            .run(std::future::pending())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }
}
