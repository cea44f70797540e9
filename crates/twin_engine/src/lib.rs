//! # Twin Engine
//!
//! 数字孪生核心：状态存储、预测、优化与周期同步。
//!
//! 负责：
//! - 校验并保存每个组件的当前状态与有界历史
//! - 线性外推预测（单组件与聚合）
//! - What-if 仿真、配置预设、资源分配、容量规划
//! - 基于阈值的异常检测
//! - 周期性地通过连接器拉取/推送状态并持久化快照
//!
//! ## 使用示例
//!
//! ```ignore
//! use std::sync::Arc;
//! use twin_engine::{DigitalTwin, SyncLoop, RegisteredConnector};
//!
//! let twin = Arc::new(DigitalTwin::new(config)?);
//! let sync = SyncLoop::new(Arc::clone(&twin));
//! sync.register_connector(RegisteredConnector::new(endpoint, direction, connector)).await;
//! sync.connect_all().await;
//! sync.start();
//! ```

mod anomaly;
mod error;
mod history;
mod optimization;
mod predictive;
mod store;
mod sync_loop;
mod twin;

pub use anomaly::AnomalyDetector;
pub use error::TwinError;
pub use history::HistoryBuffer;
pub use optimization::{
    OptimizationEngine, BANDWIDTH_MHZ, ENERGY_FACTOR, HARQ_RETRANSMISSIONS, LATENCY_OFFSET,
    MCS_INDEX, PACKET_LOSS_FACTOR, SCHEDULING_INTERVAL_MS, SIGNAL_OFFSET, SNR_OFFSET,
    THROUGHPUT_FACTOR, TX_POWER_DBM,
};
pub use predictive::PredictiveEngine;
pub use store::{TwinStore, UpdateOutcome};
pub use sync_loop::{NullStorage, RegisteredConnector, SyncLoop};
pub use twin::{DigitalTwin, ImportReport};
