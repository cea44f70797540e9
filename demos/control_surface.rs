//! Control Surface Demo
//!
//! Feeds a twin from simulated telemetry, then walks through prediction,
//! what-if simulation, configuration optimization, resource allocation and
//! capacity analysis on the synchronized state.
//!
//! Run with: cargo run -p twin_demos --bin control_surface [config.toml]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use config_loader::ConfigLoader;
use connectors::{ConnectorFactory, SimulatorHandle};
use contracts::{
    ConnectorConfig, ConnectorKind, OptimizationObjective, SyncDirection, Timestamp, TwinBlueprint,
};
use observability::{LogFormat, ObservabilityConfig};
use twin_engine::{DigitalTwin, RegisteredConnector, SyncLoop, LATENCY_OFFSET, THROUGHPUT_FACTOR};

const CYCLES: u64 = 8;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    observability::init_with_config(ObservabilityConfig {
        log_format: LogFormat::Compact,
        ..Default::default()
    })?;

    tracing::info!("Starting Control Surface Demo");

    // ==== Stage 1: Use default config or load from file ====
    let blueprint = if let Some(path) = std::env::args().nth(1) {
        tracing::info!(path = %path, "Loading blueprint config");
        ConfigLoader::load_from_path(std::path::Path::new(&path))?
    } else {
        demo_blueprint()
    };

    // ==== Stage 2: Twin and connectors ====
    let twin = Arc::new(DigitalTwin::new(blueprint.twin.clone())?);
    let sync = SyncLoop::new(Arc::clone(&twin));
    sync.set_interval(Duration::from_millis(100));

    let factory = ConnectorFactory::default();
    let mut feeds: Vec<SimulatorHandle> = Vec::new();
    for config in &blueprint.connectors {
        let built = factory.build(config)?;
        if let Some(source) = built.source {
            feeds.push(source.spawn());
        }
        sync.register_connector(RegisteredConnector::new(
            built.endpoint,
            built.direction,
            built.connector,
        ))
        .await;
    }
    sync.connect_all().await;

    // ==== Stage 3: Synchronize ====
    let mut reports = sync.subscribe();
    if !sync.start() {
        sync.run_cycle().await;
    } else {
        while let Ok(report) = reports.recv().await {
            tracing::info!(
                cycle = report.cycle,
                pulled = report.pulled,
                components = report.metrics.active_components,
                anomalies = report.anomalies,
                "Cycle"
            );
            if report.cycle >= CYCLES {
                break;
            }
        }
    }
    sync.shutdown().await;
    for feed in feeds {
        feed.stop().await;
    }

    let ids = twin.component_ids();
    println!("\n=== Twin: {} components ===", ids.len());

    // ==== Stage 4: Prediction ====
    println!("\n--- Predictions (1 s ahead) ---");
    for id in &ids {
        let result = twin.predict_ahead(id, 1.0);
        match &result.predicted {
            Some(state) => println!(
                "  {:<12} signal {:>7.2} dBm  latency {:>6.2} ms  confidence {:.2}",
                id.to_string(),
                state.signal_level,
                state.latency,
                result.confidence
            ),
            None => println!("  {:<12} insufficient history", id.to_string()),
        }
    }
    let aggregate = twin.predict_aggregate(Timestamp::now().offset_secs(1.0));
    println!(
        "  aggregate: {} contributors, throughput {:.1} Mbps, mean latency {:.2} ms",
        aggregate.contributors, aggregate.total_throughput, aggregate.mean_latency
    );

    // ==== Stage 5: What-if ====
    println!("\n--- What-if: +20% throughput, -2 ms latency ---");
    let parameters = BTreeMap::from([
        (THROUGHPUT_FACTOR.to_string(), 1.2),
        (LATENCY_OFFSET.to_string(), -2.0),
    ]);
    for outcome in twin.simulate("boost", parameters) {
        println!(
            "  {:<12} throughput {:>7.2} Mbps  latency {:>6.2} ms",
            outcome.id.to_string(),
            outcome.throughput,
            outcome.latency
        );
    }

    // ==== Stage 6: Optimization ====
    println!("\n--- Configuration per objective ---");
    let constraints = BTreeMap::new();
    for objective in OptimizationObjective::ALL {
        let config = twin.optimize_configuration(objective, &constraints);
        println!("  {}: {:?}", objective, config);
    }

    println!("\n--- Resource allocation ---");
    for (id, share) in twin.optimize_resource_allocation() {
        println!(
            "  {:<12} compute {:.3}  memory {:.3}  bandwidth {:.3}",
            id.to_string(),
            share.compute_share,
            share.memory_share,
            share.bandwidth_share
        );
    }

    let capacity = twin.analyze_capacity_requirements(30.0);
    println!("\n--- Capacity over {} days ---", capacity.horizon_days);
    println!("  current units: {}", capacity.current_units);
    println!("  additional units: {:.2}", capacity.additional_units);
    println!(
        "  bandwidth: {:.1} Mbps now, +{:.1} Mbps",
        capacity.current_bandwidth_mbps, capacity.bandwidth_growth_mbps
    );
    println!("  storage growth: {:.2} GB", capacity.storage_growth_gb);

    tracing::info!("Demo completed");
    Ok(())
}

/// Single simulated source when no config file is given
fn demo_blueprint() -> TwinBlueprint {
    TwinBlueprint {
        connectors: vec![ConnectorConfig {
            name: "demo".to_string(),
            kind: ConnectorKind::Simulated,
            endpoint: "demo".to_string(),
            direction: SyncDirection::Pull,
            params: [
                ("components", "6"),
                ("interval_ms", "50"),
                ("seed", "2024"),
                ("spike_probability", "0.05"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        }],
        ..TwinBlueprint::empty()
    }
}
