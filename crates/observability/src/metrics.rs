//! Twin 指标收集模块
//!
//! 基于 CycleReport / 更新结果收集和统计同步循环的运行指标。

use std::collections::HashMap;

use contracts::CycleReport;
use metrics::{counter, gauge, histogram};

/// 从 CycleReport 记录指标
///
/// 每个同步周期结束时调用此函数来记录指标。
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_cycle_metrics;
///
/// let report = sync_loop.run_cycle().await;
/// record_cycle_metrics(&report);
/// ```
pub fn record_cycle_metrics(report: &CycleReport) {
    // 周期计数器
    counter!("twin_cycles_total").increment(1);
    histogram!("twin_cycle_duration_ms").record(report.duration_ms);

    // 聚合状态
    let m = &report.metrics;
    gauge!("twin_active_components").set(m.active_components as f64);
    gauge!("twin_mean_latency_ms").set(m.mean_latency);
    gauge!("twin_mean_signal_level_dbm").set(m.mean_signal_level);
    gauge!("twin_total_throughput_mbps").set(m.total_throughput);

    // 异常
    gauge!("twin_anomalies_current").set(report.anomalies as f64);

    // 连接器流量
    if report.pulled > 0 {
        counter!("twin_records_pulled_total").increment(report.pulled as u64);
    }
    if report.rejected > 0 {
        counter!("twin_records_rejected_total").increment(report.rejected as u64);
    }
    if report.pushed > 0 {
        counter!("twin_records_pushed_total").increment(report.pushed as u64);
    }
    for name in &report.skipped_connectors {
        counter!("twin_connector_skipped_total", "connector" => name.clone()).increment(1);
    }
}

/// 记录一次 store 更新结果 (inserted / updated / unchanged / rejected)
pub fn record_update(result: &'static str) {
    counter!("twin_updates_total", "result" => result).increment(1);
}

/// 记录连接器失败
pub fn record_connector_failure(connector: &str) {
    counter!(
        "twin_connector_failures_total",
        "connector" => connector.to_string()
    )
    .increment(1);
}

/// 记录预测置信度
pub fn record_prediction_confidence(confidence: f64) {
    histogram!("twin_prediction_confidence").record(confidence);
}

/// 记录快照持久化
pub fn record_snapshot_persist(storage: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "twin_snapshot_persist_total",
        "storage" => storage.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 同步周期指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct CycleMetricsAggregator {
    /// 总周期数
    pub total_cycles: u64,

    /// 拉取并接受的记录数
    pub total_pulled: u64,

    /// 拒绝的记录数
    pub total_rejected: u64,

    /// 推送的记录数
    pub total_pushed: u64,

    /// 有异常的周期数
    pub cycles_with_anomalies: u64,

    /// 持久化失败次数
    pub persist_failures: u64,

    /// 周期耗时统计 (ms)
    pub duration_stats: RunningStats,

    /// 活跃组件数统计
    pub component_stats: RunningStats,

    /// 平均延迟统计 (ms)
    pub latency_stats: RunningStats,

    /// 各连接器失败次数
    pub connector_failures: HashMap<String, u64>,
}

impl CycleMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, report: &CycleReport) {
        self.total_cycles += 1;
        self.total_pulled += report.pulled as u64;
        self.total_rejected += report.rejected as u64;
        self.total_pushed += report.pushed as u64;

        if report.anomalies > 0 {
            self.cycles_with_anomalies += 1;
        }
        if report.persisted == Some(false) {
            self.persist_failures += 1;
        }
        for name in &report.failed_connectors {
            *self.connector_failures.entry(name.clone()).or_insert(0) += 1;
        }

        self.duration_stats.push(report.duration_ms);
        self.component_stats
            .push(report.metrics.active_components as f64);
        if report.metrics.active_components > 0 {
            self.latency_stats.push(report.metrics.mean_latency);
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_cycles: self.total_cycles,
            total_pulled: self.total_pulled,
            total_rejected: self.total_rejected,
            total_pushed: self.total_pushed,
            cycles_with_anomalies: self.cycles_with_anomalies,
            persist_failures: self.persist_failures,
            rejection_rate: if self.total_pulled + self.total_rejected > 0 {
                self.total_rejected as f64 / (self.total_pulled + self.total_rejected) as f64
                    * 100.0
            } else {
                0.0
            },
            cycle_duration_ms: StatsSummary::from(&self.duration_stats),
            active_components: StatsSummary::from(&self.component_stats),
            mean_latency_ms: StatsSummary::from(&self.latency_stats),
            connector_failures: self.connector_failures.clone(),
        }
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_cycles: u64,
    pub total_pulled: u64,
    pub total_rejected: u64,
    pub total_pushed: u64,
    pub cycles_with_anomalies: u64,
    pub persist_failures: u64,
    pub rejection_rate: f64,
    pub cycle_duration_ms: StatsSummary,
    pub active_components: StatsSummary,
    pub mean_latency_ms: StatsSummary,
    pub connector_failures: HashMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Twin Sync Metrics Summary ===")?;
        writeln!(f, "Total cycles: {}", self.total_cycles)?;
        writeln!(f, "Records pulled: {}", self.total_pulled)?;
        writeln!(
            f,
            "Records rejected: {} ({:.2}%)",
            self.total_rejected, self.rejection_rate
        )?;
        writeln!(f, "Records pushed: {}", self.total_pushed)?;
        writeln!(f, "Cycles with anomalies: {}", self.cycles_with_anomalies)?;
        writeln!(f, "Snapshot persist failures: {}", self.persist_failures)?;
        writeln!(f, "Cycle duration (ms): {}", self.cycle_duration_ms)?;
        writeln!(f, "Active components: {}", self.active_components)?;
        writeln!(f, "Mean latency (ms): {}", self.mean_latency_ms)?;

        if !self.connector_failures.is_empty() {
            writeln!(f, "Connector failures:")?;
            let mut names: Vec<_> = self.connector_failures.iter().collect();
            names.sort();
            for (connector, count) in names {
                writeln!(f, "  {}: {}", connector, count)?;
            }
        }

        Ok(())
    }
}

/// Frozen view of a [`RunningStats`]
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        let (min, max) = stats.range.unwrap_or_default();
        Self {
            count: stats.count,
            min,
            max,
            mean: stats.mean,
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.count {
            0 => f.write_str("N/A"),
            n => write!(
                f,
                "mean={:.3} std={:.3} [{:.3}, {:.3}] (n={n})",
                self.mean, self.std_dev, self.min, self.max
            ),
        }
    }
}

/// 在线均值/方差 (Welford)，不保留样本
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    /// 与均值之差的平方和
    sq_dev: f64,
    range: Option<(f64, f64)>,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let before = value - self.mean;
        self.mean += before / self.count as f64;
        self.sq_dev += before * (value - self.mean);
        self.range = Some(match self.range {
            None => (value, value),
            Some((lo, hi)) => (lo.min(value), hi.max(value)),
        });
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// 0 when empty
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance (n - 1); 0 below two samples
    pub fn variance(&self) -> f64 {
        match self.count {
            0 | 1 => 0.0,
            n => self.sq_dev / (n - 1) as f64,
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> Option<f64> {
        self.range.map(|(lo, _)| lo)
    }

    pub fn max(&self) -> Option<f64> {
        self.range.map(|(_, hi)| hi)
    }
}
