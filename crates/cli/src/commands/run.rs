//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use contracts::TwinBlueprint;

use crate::cli::RunArgs;
use crate::error::ensure_config_exists;
use crate::runner::{RunnerConfig, TwinRunner};

/// Execute the `run` command
pub async fn run_twin(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    ensure_config_exists(&args.config)?;

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.interval_ms == Some(0) {
        anyhow::bail!("--interval-ms must be at least 1");
    }

    info!(
        interval_ms = blueprint.twin.sync_interval_ms,
        sync_enabled = blueprint.twin.sync_enabled,
        connectors = blueprint.connectors.len(),
        storage = ?blueprint.storage.as_ref().map(|s| s.kind),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let runner = TwinRunner::new(RunnerConfig {
        blueprint,
        max_cycles: (args.max_cycles > 0).then_some(args.max_cycles),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        interval: args.interval_ms.map(Duration::from_millis),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
        import: args.import.clone(),
        export: args.export.clone(),
    });

    info!("Starting twin...");
    let stats = runner
        .run(shutdown_signal())
        .await
        .context("Twin run failed")?;

    info!(
        cycles = stats.cycles.total_cycles,
        components = stats.components,
        duration_secs = stats.duration.as_secs_f64(),
        "Twin run completed"
    );
    stats.print_summary();

    info!("Twin Sync finished");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &TwinBlueprint) {
    let twin = &blueprint.twin;
    println!("\n=== Configuration Summary ===\n");
    println!("Twin:");
    println!(
        "  Sync: every {} ms ({})",
        twin.sync_interval_ms,
        if twin.sync_enabled { "enabled" } else { "disabled" }
    );
    println!("  Anomaly detection: {}", twin.anomaly_detection);
    println!("  Significant change: {} dB", twin.significant_change_db);
    println!("  History capacity: {}", twin.history.capacity);

    println!("\nConnectors ({}):", blueprint.connectors.len());
    for connector in &blueprint.connectors {
        println!(
            "  - {} ({}, {:?}) -> {}",
            connector.name,
            connector.kind.as_str(),
            connector.direction,
            connector.endpoint
        );
    }

    match &blueprint.storage {
        Some(storage) => println!("\nStorage: {:?}", storage.kind),
        None => println!("\nStorage: none"),
    }

    println!();
}
