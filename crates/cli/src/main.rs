//! # twin-sync
//!
//! 数字孪生同步命令行：
//! - `run`: 连接器 + 同步循环 + 快照持久化，直到周期上限/超时/信号
//! - `validate`: 校验配置并给出提示
//! - `info`: 展示配置内容

mod cli;
mod commands;
mod error;
mod runner;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Prometheus 由 `run` 按 --metrics-port 单独开启
    observability::init_with_config(ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: None,
        default_log_level: cli.default_log_level().to_string(),
    })?;
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "twin-sync starting");

    dispatch(&cli.command)
        .await
        .inspect_err(|e| tracing::error!(error = %e, "Command failed"))
}

async fn dispatch(command: &Commands) -> Result<()> {
    match command {
        Commands::Run(args) => commands::run_twin(args).await,
        Commands::Validate(args) => commands::run_validate(args),
        Commands::Info(args) => commands::run_info(args),
    }
}
