//! Run statistics and summary output.

use std::time::Duration;

use connectors::ConnectorMetricsSnapshot;
use contracts::AggregateMetrics;
use observability::CycleMetricsAggregator;
use storage::StorageMetricsSnapshot;

/// Why the run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    /// `--max-cycles` reached
    MaxCycles,
    /// `--timeout` elapsed
    Timeout,
    /// Ctrl+C or SIGTERM
    #[default]
    Signal,
    /// Sync disabled in configuration; a single manual cycle ran
    SyncDisabled,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::MaxCycles => "max cycles reached",
            StopReason::Timeout => "timeout",
            StopReason::Signal => "shutdown signal",
            StopReason::SyncDisabled => "sync disabled",
        }
    }
}

/// Per-connector counters at the end of the run
#[derive(Debug, Clone)]
pub struct ConnectorStats {
    pub name: String,
    pub kind: &'static str,
    pub metrics: ConnectorMetricsSnapshot,
}

/// Statistics from a twin run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Wall time from setup to shutdown
    pub duration: Duration,

    pub stop_reason: StopReason,

    /// Connectors connected at start
    pub connected: usize,

    pub connectors: Vec<ConnectorStats>,

    /// `(storage name, counters)`; counters only for backends that keep them
    pub storage: Option<(String, Option<StorageMetricsSnapshot>)>,

    /// Records emitted by simulated sources
    pub simulated_records: u64,

    /// Updates that crossed the significant-change threshold
    pub significant_changes: u64,

    /// Anomaly callbacks fired
    pub anomalies_reported: u64,

    /// Components in the twin at shutdown
    pub components: usize,

    pub final_metrics: Option<AggregateMetrics>,

    /// Cycle report aggregator
    pub cycles: CycleMetricsAggregator,
}

impl RunStats {
    /// Completed cycles per second
    pub fn cycle_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.cycles.total_cycles as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                     Twin Run Statistics                      ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Stopped by: {}", self.stop_reason.as_str());
        println!("   ├─ Cycles: {} ({:.2}/s)", self.cycles.total_cycles, self.cycle_rate());
        println!("   ├─ Connectors connected: {}/{}", self.connected, self.connectors.len());
        println!("   ├─ Components: {}", self.components);
        println!("   ├─ Significant changes: {}", self.significant_changes);
        println!("   └─ Anomalies reported: {}", self.anomalies_reported);

        println!("\n📈 Cycles");
        for line in self.cycles.summary().to_string().lines().skip(1) {
            println!("   {}", line);
        }

        if !self.connectors.is_empty() {
            println!("\n🔌 Connectors ({})", self.connectors.len());
            for (i, c) in self.connectors.iter().enumerate() {
                let prefix = if i == self.connectors.len() - 1 { "└─" } else { "├─" };
                println!(
                    "   {} {} ({}): pulled {}, pushed {}, commands {}, dropped {}, codec errors {}",
                    prefix,
                    c.name,
                    c.kind,
                    c.metrics.states_pulled,
                    c.metrics.states_pushed,
                    c.metrics.commands_sent,
                    c.metrics.dropped,
                    c.metrics.codec_errors
                );
            }
            if self.simulated_records > 0 {
                println!("   Simulated records emitted: {}", self.simulated_records);
            }
        }

        if let Some((name, metrics)) = &self.storage {
            println!("\n💾 Storage ({})", name);
            match metrics {
                Some(m) => {
                    println!("   ├─ Snapshots persisted: {}", m.persisted);
                    println!("   ├─ Failures: {}", m.failures);
                    println!("   ├─ Bytes written: {}", m.bytes_written);
                    println!("   └─ Files pruned: {}", m.pruned);
                }
                None => println!("   └─ Snapshots logged only"),
            }
        }

        if let Some(m) = &self.final_metrics {
            println!("\n📡 Final Aggregate");
            println!("   ├─ Active components: {}", m.active_components);
            println!("   ├─ Mean signal level: {:.2} dBm", m.mean_signal_level);
            println!("   ├─ Mean latency: {:.2} ms", m.mean_latency);
            println!("   ├─ Mean packet loss: {:.4}", m.mean_packet_loss);
            println!("   ├─ Total throughput: {:.2} Mbps", m.total_throughput);
            println!("   └─ Anomalous components: {}", m.anomalous_components);
        }

        println!();
    }
}
