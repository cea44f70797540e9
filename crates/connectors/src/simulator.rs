//! Telemetry simulator
//!
//! 生成模拟的网络组件遥测数据（随机游走），通过 `MemoryPeer` 投递给
//! `MemoryConnector`。用于无真实网络设备时的演示与测试。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{ComponentState, Timestamp, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::memory::MemoryPeer;

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Prefix of generated component ids (`<prefix>-ue-<n>`)
    pub prefix: String,
    /// Number of simulated components
    pub components: usize,
    /// Records emitted per tick (round-robin over components)
    pub batch: usize,
    /// Tick period
    pub interval: Duration,
    /// Probability that a record carries a latency spike
    pub spike_probability: f64,
    /// Fixed seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            prefix: "sim".to_string(),
            components: 4,
            batch: 4,
            interval: Duration::from_millis(200),
            spike_probability: 0.02,
            seed: None,
        }
    }
}

#[derive(Debug, Clone)]
struct Walker {
    id: String,
    position: Vector3,
    velocity: Vector3,
    signal_level: f64,
    latency: f64,
    throughput: f64,
    energy_level: f64,
    serving_cell: u32,
}

/// Random-walk telemetry generator
pub struct TelemetrySimulator {
    config: SimulatorConfig,
    rng: StdRng,
    walkers: Vec<Walker>,
    cursor: usize,
}

impl TelemetrySimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let walkers = (0..config.components.max(1))
            .map(|i| Walker {
                id: format!("{}-ue-{}", config.prefix, i),
                position: Vector3::new(
                    rng.random_range(-500.0..500.0),
                    rng.random_range(-500.0..500.0),
                    1.5,
                ),
                velocity: Vector3::new(rng.random_range(-15.0..15.0), rng.random_range(-15.0..15.0), 0.0),
                signal_level: rng.random_range(-100.0..-70.0),
                latency: rng.random_range(5.0..30.0),
                throughput: rng.random_range(10.0..200.0),
                energy_level: 100.0,
                serving_cell: (i % 3) as u32 + 1,
            })
            .collect();
        Self {
            config,
            rng,
            walkers,
            cursor: 0,
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Advance the walk and produce the next batch stamped `now`
    pub fn next_batch(&mut self, now: Timestamp) -> Vec<ComponentState> {
        let dt = self.config.interval.as_secs_f64();
        let count = self.config.batch.max(1);
        let mut batch = Vec::with_capacity(count);

        for _ in 0..count {
            let idx = self.cursor % self.walkers.len();
            self.cursor = self.cursor.wrapping_add(1);
            let spike = self.rng.random_bool(self.config.spike_probability.clamp(0.0, 1.0));
            let rng = &mut self.rng;
            let w = &mut self.walkers[idx];

            w.position = Vector3::new(
                w.position.x + w.velocity.x * dt,
                w.position.y + w.velocity.y * dt,
                w.position.z,
            );
            w.signal_level = (w.signal_level + rng.random_range(-2.0..2.0)).clamp(-125.0, -50.0);
            w.latency = (w.latency + rng.random_range(-3.0..3.0)).clamp(1.0, 80.0);
            w.throughput = (w.throughput * rng.random_range(0.9..1.1)).clamp(1.0, 1000.0);
            w.energy_level = (w.energy_level - rng.random_range(0.0..0.05)).max(0.0);

            let latency = if spike { w.latency + 150.0 } else { w.latency };
            let packet_loss = if spike {
                rng.random_range(0.05..0.2)
            } else {
                rng.random_range(0.0..0.01)
            };
            let snr = w.signal_level + 110.0;

            batch.push(
                ComponentState::new(w.id.as_str(), now)
                    .with_position(w.position)
                    .with_velocity(w.velocity)
                    .with_signal_level(w.signal_level)
                    .with_latency(latency)
                    .with_packet_loss(packet_loss)
                    .with_throughput(w.throughput)
                    .with_metric(contracts::Metric::Snr, snr)
                    .with_metric(contracts::Metric::SignalQuality, snr / 3.0 - 20.0)
                    .with_metric(contracts::Metric::EnergyLevel, w.energy_level)
                    .with_serving_cell(w.serving_cell),
            );
        }
        batch
    }

    /// Emit one batch into `peer`; returns records accepted
    pub fn emit(&mut self, peer: &MemoryPeer) -> usize {
        self.next_batch(Timestamp::now())
            .into_iter()
            .map(|state| peer.offer(state))
            .filter(|accepted| *accepted)
            .count()
    }

    /// Run on a tokio task until the handle is stopped
    pub fn spawn(mut self, peer: MemoryPeer) -> SimulatorHandle {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = tokio::spawn(async move {
            debug!(
                peer = %peer.name(),
                components = self.walkers.len(),
                interval_ms = self.config.interval.as_millis() as u64,
                "telemetry simulator started"
            );
            let mut emitted: u64 = 0;
            while flag.load(Ordering::Relaxed) {
                let accepted = self.emit(&peer);
                emitted += accepted as u64;
                trace!(peer = %peer.name(), accepted, "simulator tick");
                tokio::time::sleep(self.config.interval).await;
            }
            debug!(peer = %peer.name(), emitted, "telemetry simulator stopped");
            emitted
        });
        SimulatorHandle { running, handle }
    }
}

/// Handle to a running simulator task
pub struct SimulatorHandle {
    running: Arc<AtomicBool>,
    handle: JoinHandle<u64>,
}

impl SimulatorHandle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed) && !self.handle.is_finished()
    }

    /// Stop and return the number of records emitted
    pub async fn stop(self) -> u64 {
        self.running.store(false, Ordering::Relaxed);
        self.handle.await.unwrap_or_default()
    }
}
