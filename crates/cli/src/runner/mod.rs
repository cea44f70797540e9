//! Twin run orchestration.

mod orchestrator;
mod stats;

pub use orchestrator::{RunnerConfig, TwinRunner};
pub use stats::{RunStats, StopReason};
