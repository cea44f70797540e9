//! # Observability
//!
//! Twin 引擎的日志与指标出口。
//!
//! - `init_with_config`: 安装 tracing subscriber，可选同时开启 Prometheus
//! - `init_metrics_only`: 只开启 Prometheus (日志已由宿主安装时)
//! - [`metrics`]: 周期/更新/连接器/存储的指标记录与运行期统计
//!
//! ```ignore
//! observability::init_with_config(ObservabilityConfig {
//!     log_format: LogFormat::Compact,
//!     ..Default::default()
//! })?;
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use crate::metrics::{
    record_connector_failure, record_cycle_metrics, record_prediction_confidence,
    record_snapshot_persist, record_update, CycleMetricsAggregator, MetricsSummary, RunningStats,
    StatsSummary,
};

/// Output shape of log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event, with span context
    #[default]
    Json,
    /// Multi-line, for terminals
    Pretty,
    Compact,
}

/// Settings for [`init_with_config`]
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Prometheus listener port; `None` leaves the exporter off
    pub metrics_port: Option<u16>,
    /// Filter directive used when `RUST_LOG` is unset or invalid
    pub default_log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            metrics_port: None,
            default_log_level: "info".to_string(),
        }
    }
}

impl ObservabilityConfig {
    /// `RUST_LOG` wins over `default_log_level`
    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_log_level))
    }
}

/// 安装全局 subscriber；`metrics_port` 有值时一并开启 Prometheus
///
/// Fails when a global subscriber is already installed.
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    install_subscriber(&config)?;

    if let Some(port) = config.metrics_port {
        init_metrics_only(port)?;
    }

    tracing::info!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        "Logging ready"
    );
    Ok(())
}

fn install_subscriber(config: &ObservabilityConfig) -> Result<()> {
    let base = tracing_subscriber::registry().with(config.env_filter());
    let installed = match config.log_format {
        LogFormat::Json => base
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_thread_names(true),
            )
            .try_init(),
        LogFormat::Pretty => base.with(fmt::layer().pretty()).try_init(),
        LogFormat::Compact => base.with(fmt::layer().compact().with_target(false)).try_init(),
    };
    installed.context("a global tracing subscriber is already installed")
}

/// 在 `0.0.0.0:port` 上开启 `/metrics`，并登记各指标的 HELP 文本
pub fn init_metrics_only(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .with_context(|| format!("cannot start Prometheus exporter on port {port}"))?;
    describe_twin_metrics();

    tracing::info!(port, "Prometheus exporter listening");
    Ok(())
}

fn describe_twin_metrics() {
    use ::metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

    describe_counter!("twin_updates_total", "State updates applied to the twin, by result");
    describe_counter!("twin_cycles_total", "Completed synchronization cycles");
    describe_counter!(
        "twin_connector_failures_total",
        "Connector failures, by connector"
    );
    describe_counter!(
        "twin_snapshot_persist_total",
        "Snapshot persistence attempts, by storage and status"
    );
    describe_gauge!("twin_active_components", "Components currently mirrored");
    describe_gauge!(
        "twin_mean_latency_ms",
        Unit::Milliseconds,
        "Mean latency across mirrored components"
    );
    describe_gauge!("twin_anomalies_current", "Components flagged by the last anomaly pass");
    describe_histogram!(
        "twin_cycle_duration_ms",
        Unit::Milliseconds,
        "Wall time of one synchronization cycle"
    );
    describe_histogram!("twin_prediction_confidence", "Confidence of issued predictions");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_keep_exporter_off() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.metrics_port.is_none());
        assert_eq!(config.default_log_level, "info");
    }

    #[test]
    fn test_second_install_fails() {
        let config = ObservabilityConfig {
            log_format: LogFormat::Compact,
            ..Default::default()
        };
        // subscriber 是进程级全局状态，同一测试二进制里别的测试可能已先装好，
        // 所以第一次的结果不作断言；到第二次时全局必然已被占用
        let _ = install_subscriber(&config);
        let second = install_subscriber(&config);
        assert!(second.is_err());
        assert!(second
            .unwrap_err()
            .to_string()
            .contains("already installed"));
    }
}
