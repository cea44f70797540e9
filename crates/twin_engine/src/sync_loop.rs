//! SyncLoop - periodic driver of the twin
//!
//! One cycle: exchange state with every connected connector, run the anomaly
//! pass, recompute aggregate metrics, persist a snapshot. The driver task
//! waits one interval before each cycle; `stop()` only cancels the wait, so
//! a cycle that has started always completes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use contracts::{
    Connector, ContractError, CycleReport, SnapshotStorage, SyncDirection, TwinSnapshot,
};
use observability::metrics::{
    record_connector_failure, record_cycle_metrics, record_snapshot_persist,
};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::DigitalTwin;

/// Cycle reports buffered per subscriber
const REPORT_BUFFER: usize = 64;

/// A connector plus how the loop should use it
pub struct RegisteredConnector<C> {
    pub name: String,
    /// Address handed to `connect`
    pub endpoint: String,
    pub direction: SyncDirection,
    pub connector: C,
}

impl<C: Connector> RegisteredConnector<C> {
    pub fn new(endpoint: impl Into<String>, direction: SyncDirection, connector: C) -> Self {
        Self {
            name: connector.name().to_string(),
            endpoint: endpoint.into(),
            direction,
            connector,
        }
    }
}

/// Storage placeholder for loops that persist nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStorage;

impl SnapshotStorage for NullStorage {
    fn name(&self) -> &str {
        "null"
    }

    async fn persist(&mut self, _snapshot: &TwinSnapshot) -> Result<(), ContractError> {
        Ok(())
    }

    async fn load_latest(&mut self) -> Result<Option<TwinSnapshot>, ContractError> {
        Ok(None)
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}

struct LoopParts<C, S> {
    connectors: Vec<RegisteredConnector<C>>,
    storage: Option<S>,
}

struct Shared<C, S> {
    twin: Arc<DigitalTwin>,
    parts: tokio::sync::Mutex<LoopParts<C, S>>,
    interval_ms: AtomicU64,
    max_pulls: usize,
    cycles: AtomicU64,
    reports: broadcast::Sender<CycleReport>,
}

struct Driver {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Periodic synchronization driver
///
/// States: stopped / running. Restartable, no terminal state.
pub struct SyncLoop<C, S = NullStorage> {
    shared: Arc<Shared<C, S>>,
    driver: Mutex<Option<Driver>>,
}

impl<C> SyncLoop<C, NullStorage>
where
    C: Connector + Send + 'static,
{
    /// Loop without snapshot persistence
    pub fn new(twin: Arc<DigitalTwin>) -> Self {
        Self::build(twin, None)
    }
}

impl<C, S> SyncLoop<C, S>
where
    C: Connector + Send + 'static,
    S: SnapshotStorage + Send + 'static,
{
    /// Loop persisting a snapshot through `storage` every cycle
    pub fn with_storage(twin: Arc<DigitalTwin>, storage: S) -> Self {
        Self::build(twin, Some(storage))
    }

    /// Loop whose persistence is decided at run time
    pub fn build(twin: Arc<DigitalTwin>, storage: Option<S>) -> Self {
        let config = twin.config();
        let interval_ms = config.sync_interval_ms.max(1);
        let max_pulls = config.max_pulls_per_cycle.max(1);
        Self {
            shared: Arc::new(Shared {
                twin,
                parts: tokio::sync::Mutex::new(LoopParts {
                    connectors: Vec::new(),
                    storage,
                }),
                interval_ms: AtomicU64::new(interval_ms),
                max_pulls,
                cycles: AtomicU64::new(0),
                reports: broadcast::channel(REPORT_BUFFER).0,
            }),
            driver: Mutex::new(None),
        }
    }

    pub fn twin(&self) -> &Arc<DigitalTwin> {
        &self.shared.twin
    }

    /// Receive the report of every cycle completed from now on
    pub fn subscribe(&self) -> broadcast::Receiver<CycleReport> {
        self.shared.reports.subscribe()
    }

    /// Add a connector; takes effect from the next cycle
    pub async fn register_connector(&self, connector: RegisteredConnector<C>) {
        debug!(connector = %connector.name, direction = ?connector.direction, "Connector registered");
        self.shared.parts.lock().await.connectors.push(connector);
    }

    pub async fn connector_names(&self) -> Vec<String> {
        self.shared
            .parts
            .lock()
            .await
            .connectors
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    /// Connect every registered connector to its endpoint
    ///
    /// Returns how many are connected afterwards.
    #[instrument(name = "sync_loop_connect_all", skip(self))]
    pub async fn connect_all(&self) -> usize {
        let mut parts = self.shared.parts.lock().await;
        let mut connected = 0;
        for entry in parts.connectors.iter_mut() {
            if entry.connector.connect(&entry.endpoint).await {
                connected += 1;
            } else {
                warn!(connector = %entry.name, endpoint = %entry.endpoint, "Connector failed to connect");
            }
        }
        info!(connected, total = parts.connectors.len(), "Connectors connected");
        connected
    }

    /// Current interval between cycles
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.shared.interval_ms.load(Ordering::Relaxed))
    }

    /// Change the interval; applies from the next wait
    pub fn set_interval(&self, interval: Duration) {
        let ms = (interval.as_millis() as u64).max(1);
        self.shared.interval_ms.store(ms, Ordering::Relaxed);
        debug!(interval_ms = ms, "Sync interval changed");
    }

    /// Cycles completed or in progress since construction
    pub fn cycles(&self) -> u64 {
        self.shared.cycles.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.driver()
            .as_ref()
            .is_some_and(|d| !d.handle.is_finished())
    }

    /// Schedule the periodic driver
    ///
    /// Must be called from within a tokio runtime. Idempotent while
    /// running. Returns whether the loop is running afterwards; `false`
    /// when synchronization is disabled in the configuration.
    pub fn start(&self) -> bool {
        let mut driver = self.driver();
        if driver.as_ref().is_some_and(|d| !d.handle.is_finished()) {
            return true;
        }
        if !self.shared.twin.config().sync_enabled {
            warn!("Synchronization disabled by configuration, loop not started");
            return false;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(drive(Arc::clone(&self.shared), stop_rx));
        *driver = Some(Driver { stop_tx, handle });

        info!(interval_ms = self.interval().as_millis() as u64, "Sync loop started");
        true
    }

    /// Prevent further cycles; an in-flight cycle still completes
    ///
    /// Returns as soon as the stop signal is sent, without waiting for that
    /// cycle. Use [`SyncLoop::stop_and_wait`] when the store must be quiescent
    /// afterwards (e.g. before a final snapshot).
    ///
    /// Returns whether the loop was running.
    pub fn stop(&self) -> bool {
        match self.driver().take() {
            Some(driver) => {
                let _ = driver.stop_tx.send(true);
                info!("Sync loop stop requested");
                true
            }
            None => false,
        }
    }

    /// Stop and wait for the driver task (and any in-flight cycle) to end
    pub async fn stop_and_wait(&self) {
        let Some(driver) = self.driver().take() else {
            return;
        };
        let _ = driver.stop_tx.send(true);
        if let Err(e) = driver.handle.await {
            error!(error = ?e, "Sync loop task panicked");
        }
        info!(cycles = self.cycles(), "Sync loop stopped");
    }

    /// Stop, disconnect every connector and flush storage
    #[instrument(name = "sync_loop_shutdown", skip(self))]
    pub async fn shutdown(&self) {
        self.stop_and_wait().await;
        let mut parts = self.shared.parts.lock().await;
        for entry in parts.connectors.iter_mut() {
            entry.connector.disconnect().await;
        }
        if let Some(storage) = parts.storage.as_mut() {
            if let Err(e) = storage.flush().await {
                error!(storage = storage.name(), error = %e, "Flush failed on shutdown");
            }
        }
        debug!("Sync loop shutdown complete");
    }

    /// Run one cycle now, independent of the driver
    pub async fn run_cycle(&self) -> CycleReport {
        self.shared.run_cycle().await
    }

    fn driver(&self) -> MutexGuard<'_, Option<Driver>> {
        self.driver
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<C, S> Drop for SyncLoop<C, S> {
    fn drop(&mut self) {
        if let Ok(mut driver) = self.driver.lock() {
            if let Some(driver) = driver.take() {
                let _ = driver.stop_tx.send(true);
            }
        }
    }
}

/// Driver task: wait one interval, run a cycle, repeat until stopped
#[instrument(name = "sync_loop_driver", skip_all)]
async fn drive<C, S>(shared: Arc<Shared<C, S>>, mut stop_rx: watch::Receiver<bool>)
where
    C: Connector + Send + 'static,
    S: SnapshotStorage + Send + 'static,
{
    loop {
        let interval = Duration::from_millis(shared.interval_ms.load(Ordering::Relaxed));
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = stop_rx.changed() => break,
        }
        if *stop_rx.borrow() {
            break;
        }
        shared.run_cycle().await;
    }
    debug!("Sync loop driver exited");
}

impl<C, S> Shared<C, S>
where
    C: Connector + Send + 'static,
    S: SnapshotStorage + Send + 'static,
{
    #[instrument(name = "sync_cycle", skip(self), fields(cycle))]
    async fn run_cycle(&self) -> CycleReport {
        let started = Instant::now();
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::Span::current().record("cycle", cycle);

        let mut report = CycleReport {
            cycle,
            ..Default::default()
        };

        let mut parts = self.parts.lock().await;
        let LoopParts {
            connectors,
            storage,
        } = &mut *parts;

        // 1. connectors
        for entry in connectors.iter_mut() {
            self.exchange(entry, &mut report).await;
        }

        // 2. anomaly pass
        if self.twin.anomaly_detection_enabled() {
            report.anomalies = self.twin.detect_anomalies().len();
        }

        // 3. aggregate metrics
        report.metrics = self.twin.refresh_metrics();

        // 4. snapshot
        if let Some(storage) = storage.as_mut() {
            let snapshot = self.twin.export_snapshot();
            let persisted = match storage.persist(&snapshot).await {
                Ok(()) => true,
                Err(e) => {
                    error!(storage = storage.name(), error = %e, "Snapshot persistence failed");
                    false
                }
            };
            record_snapshot_persist(storage.name(), persisted);
            report.persisted = Some(persisted);
        }
        drop(parts);

        report.duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        record_cycle_metrics(&report);
        let _ = self.reports.send(report.clone());
        debug!(
            pulled = report.pulled,
            rejected = report.rejected,
            pushed = report.pushed,
            anomalies = report.anomalies,
            duration_ms = report.duration_ms,
            "Cycle complete"
        );
        report
    }

    /// Pull and/or push through one connector; failures end its turn
    async fn exchange(&self, entry: &mut RegisteredConnector<C>, report: &mut CycleReport) {
        if !entry.connector.is_connected() {
            warn!(connector = %entry.name, "Connector not connected, skipped");
            report.skipped_connectors.push(entry.name.clone());
            return;
        }

        if entry.direction.pulls() {
            for _ in 0..self.max_pulls {
                match entry.connector.pull_state().await {
                    Ok(Some(record)) => match self.twin.update_state(record) {
                        Ok(_) => report.pulled += 1,
                        Err(_) => report.rejected += 1,
                    },
                    Ok(None) => break,
                    Err(e) => {
                        connector_failed(entry, &e, report);
                        return;
                    }
                }
            }
        }

        if entry.direction.pushes() {
            for record in self.twin.get_all_states() {
                if let Err(e) = entry.connector.push_state(&record).await {
                    connector_failed(entry, &e, report);
                    return;
                }
                report.pushed += 1;
            }
        }
    }
}

fn connector_failed<C>(entry: &RegisteredConnector<C>, error: &ContractError, report: &mut CycleReport) {
    warn!(connector = %entry.name, error = %error, "Connector failed, skipped for this cycle");
    record_connector_failure(&entry.name);
    report.failed_connectors.push(entry.name.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::{ComponentState, Timestamp, TwinEngineConfig};
    use std::collections::VecDeque;
    use tokio::time::sleep;

    /// Mock connector for testing
    struct MockConnector {
        name: String,
        connected: bool,
        inbox: VecDeque<ComponentState>,
        pushed: Arc<Mutex<Vec<ComponentState>>>,
        fail_pull: bool,
    }

    impl MockConnector {
        fn new(name: &str, inbox: Vec<ComponentState>) -> Self {
            Self {
                name: name.to_string(),
                connected: false,
                inbox: inbox.into(),
                pushed: Arc::new(Mutex::new(Vec::new())),
                fail_pull: false,
            }
        }
    }

    impl Connector for MockConnector {
        fn name(&self) -> &str {
            &self.name
        }

        async fn connect(&mut self, _endpoint: &str) -> bool {
            self.connected = true;
            true
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        async fn push_state(&mut self, state: &ComponentState) -> Result<(), ContractError> {
            self.pushed.lock().unwrap().push(state.clone());
            Ok(())
        }

        async fn pull_state(&mut self) -> Result<Option<ComponentState>, ContractError> {
            if self.fail_pull {
                return Err(ContractError::connector_transport(&self.name, "mock failure"));
            }
            Ok(self.inbox.pop_front())
        }

        async fn send_command(&mut self, _payload: Bytes) -> Result<(), ContractError> {
            Ok(())
        }

        async fn disconnect(&mut self) {
            self.connected = false;
        }
    }

    /// Mock storage for testing
    #[derive(Default)]
    struct MockStorage {
        persisted: Arc<Mutex<Vec<TwinSnapshot>>>,
        should_fail: bool,
    }

    impl SnapshotStorage for MockStorage {
        fn name(&self) -> &str {
            "mock"
        }

        async fn persist(&mut self, snapshot: &TwinSnapshot) -> Result<(), ContractError> {
            if self.should_fail {
                return Err(ContractError::storage_write("mock", "disk full"));
            }
            self.persisted.lock().unwrap().push(snapshot.clone());
            Ok(())
        }

        async fn load_latest(&mut self) -> Result<Option<TwinSnapshot>, ContractError> {
            Ok(self.persisted.lock().unwrap().last().cloned())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn twin_with_interval(ms: u64) -> Arc<DigitalTwin> {
        Arc::new(
            DigitalTwin::new(TwinEngineConfig {
                sync_interval_ms: ms,
                ..Default::default()
            })
            .unwrap(),
        )
    }

    fn record(id: &str, ms: i64, latency: f64) -> ComponentState {
        ComponentState::new(id, Timestamp::from_millis(ms))
            .with_signal_level(-85.0)
            .with_latency(latency)
            .with_packet_loss(0.0)
    }

    #[tokio::test]
    async fn test_cycle_pulls_into_store() {
        let sync = SyncLoop::new(twin_with_interval(1000));
        sync.register_connector(RegisteredConnector::new(
            "mem",
            SyncDirection::Pull,
            MockConnector::new("mem", vec![record("a", 1, 5.0), record("b", 1, 5.0)]),
        ))
        .await;
        assert_eq!(sync.connect_all().await, 1);

        let report = sync.run_cycle().await;
        assert_eq!(report.cycle, 1);
        assert_eq!(report.pulled, 2);
        assert_eq!(sync.twin().component_count(), 2);
        assert_eq!(report.metrics.active_components, 2);
        assert_eq!(report.persisted, None);
    }

    #[tokio::test]
    async fn test_rejected_records_are_counted() {
        let sync = SyncLoop::new(twin_with_interval(1000));
        sync.register_connector(RegisteredConnector::new(
            "mem",
            SyncDirection::Pull,
            MockConnector::new("mem", vec![record("a", 1, -1.0), record("b", 1, 5.0)]),
        ))
        .await;
        sync.connect_all().await;

        let report = sync.run_cycle().await;
        assert_eq!(report.pulled, 1);
        assert_eq!(report.rejected, 1);
        assert!(sync.twin().get_state("a").is_none());
    }

    #[tokio::test]
    async fn test_disconnected_and_failing_connectors_are_skipped() {
        let sync = SyncLoop::new(twin_with_interval(1000));

        let mut failing = MockConnector::new("failing", vec![]);
        failing.fail_pull = true;
        sync.register_connector(RegisteredConnector::new("x", SyncDirection::Pull, failing))
            .await;
        sync.register_connector(RegisteredConnector::new(
            "ok",
            SyncDirection::Pull,
            MockConnector::new("ok", vec![record("a", 1, 5.0)]),
        ))
        .await;
        sync.connect_all().await;
        sync.register_connector(RegisteredConnector::new(
            "late",
            SyncDirection::Pull,
            MockConnector::new("late", vec![record("z", 1, 5.0)]),
        ))
        .await;

        let report = sync.run_cycle().await;
        assert_eq!(report.failed_connectors, vec!["failing".to_string()]);
        assert_eq!(report.skipped_connectors, vec!["late".to_string()]);
        assert_eq!(report.pulled, 1);
        assert!(sync.twin().get_state("z").is_none());
    }

    #[tokio::test]
    async fn test_push_direction_sends_every_record() {
        let twin = twin_with_interval(1000);
        twin.update_state(record("a", 1, 5.0)).unwrap();
        twin.update_state(record("b", 1, 5.0)).unwrap();

        let connector = MockConnector::new("out", vec![]);
        let pushed = Arc::clone(&connector.pushed);
        let sync = SyncLoop::new(twin);
        sync.register_connector(RegisteredConnector::new("out", SyncDirection::Push, connector))
            .await;
        sync.connect_all().await;

        let report = sync.run_cycle().await;
        assert_eq!(report.pushed, 2);
        assert_eq!(pushed.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_anomalies_replaced_each_cycle() {
        let sync = SyncLoop::new(twin_with_interval(1000));
        sync.register_connector(RegisteredConnector::new(
            "mem",
            SyncDirection::Pull,
            MockConnector::new("mem", vec![record("ue", 1, 150.0)]),
        ))
        .await;
        sync.connect_all().await;

        assert_eq!(sync.run_cycle().await.anomalies, 1);
        sync.twin().update_state(record("ue", 2, 10.0)).unwrap();
        assert_eq!(sync.run_cycle().await.anomalies, 0);
        assert!(sync.twin().anomalies().is_empty());

        sync.twin().update_state(record("ue", 3, 150.0)).unwrap();
        sync.twin().set_anomaly_detection(false);
        assert_eq!(sync.run_cycle().await.anomalies, 0);
    }

    #[tokio::test]
    async fn test_storage_failure_is_not_fatal() {
        let storage = MockStorage {
            should_fail: true,
            ..Default::default()
        };
        let sync: SyncLoop<MockConnector, MockStorage> =
            SyncLoop::with_storage(twin_with_interval(1000), storage);

        let report = sync.run_cycle().await;
        assert_eq!(report.persisted, Some(false));
        assert!(report.had_failures());
        assert_eq!(sync.run_cycle().await.cycle, 2);
    }

    #[tokio::test]
    async fn test_storage_receives_snapshots() {
        let storage = MockStorage::default();
        let persisted = Arc::clone(&storage.persisted);
        let twin = twin_with_interval(1000);
        twin.update_state(record("a", 1, 5.0)).unwrap();

        let sync: SyncLoop<MockConnector, MockStorage> = SyncLoop::with_storage(twin, storage);
        let report = sync.run_cycle().await;

        assert_eq!(report.persisted, Some(true));
        let persisted = persisted.lock().unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].active_components, 1);
    }

    #[tokio::test]
    async fn test_start_stop_restart() {
        let sync: SyncLoop<MockConnector> = SyncLoop::new(twin_with_interval(20));
        assert!(!sync.is_running());
        assert!(sync.start());
        assert!(sync.start());
        assert!(sync.is_running());

        sleep(Duration::from_millis(130)).await;
        sync.stop_and_wait().await;
        assert!(!sync.is_running());
        let cycles = sync.cycles();
        assert!(cycles >= 2, "only {cycles} cycles ran");

        sleep(Duration::from_millis(80)).await;
        assert_eq!(sync.cycles(), cycles);

        assert!(sync.start());
        sleep(Duration::from_millis(80)).await;
        assert!(sync.stop());
        assert!(!sync.stop());
        assert!(sync.cycles() > cycles);
    }

    #[tokio::test]
    async fn test_subscribers_receive_reports() {
        let sync: SyncLoop<MockConnector> = SyncLoop::new(twin_with_interval(10));
        let mut reports = sync.subscribe();

        sync.run_cycle().await;
        assert_eq!(reports.recv().await.unwrap().cycle, 1);

        sync.start();
        let next = tokio::time::timeout(Duration::from_secs(2), reports.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.cycle, 2);
        sync.stop_and_wait().await;
    }

    #[tokio::test]
    async fn test_first_cycle_waits_one_interval() {
        let sync: SyncLoop<MockConnector> = SyncLoop::new(twin_with_interval(200));
        sync.start();
        sleep(Duration::from_millis(50)).await;
        assert_eq!(sync.cycles(), 0);
        sync.stop_and_wait().await;
        assert_eq!(sync.cycles(), 0);
    }

    #[tokio::test]
    async fn test_interval_change_at_runtime() {
        let sync: SyncLoop<MockConnector> = SyncLoop::new(twin_with_interval(10_000));
        sync.set_interval(Duration::from_millis(10));
        assert_eq!(sync.interval(), Duration::from_millis(10));

        sync.start();
        sleep(Duration::from_millis(100)).await;
        sync.stop_and_wait().await;
        assert!(sync.cycles() >= 2);
    }

    #[tokio::test]
    async fn test_disabled_sync_does_not_start() {
        let twin = Arc::new(
            DigitalTwin::new(TwinEngineConfig {
                sync_enabled: false,
                ..Default::default()
            })
            .unwrap(),
        );
        let sync: SyncLoop<MockConnector> = SyncLoop::new(twin);
        assert!(!sync.start());
        assert!(!sync.is_running());
        // a manual cycle still works
        assert_eq!(sync.run_cycle().await.cycle, 1);
    }
}
