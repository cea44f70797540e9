//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::TwinBlueprint;

use crate::cli::InfoArgs;
use crate::error::ensure_config_exists;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    twin: TwinInfo,
    connectors: Vec<ConnectorInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    storage: Option<StorageInfo>,
}

#[derive(Serialize)]
struct TwinInfo {
    sync_interval_ms: u64,
    sync_enabled: bool,
    anomaly_detection: bool,
    significant_change_db: f64,
    max_pulls_per_cycle: usize,
    history_capacity: usize,
    signal_range_dbm: [f64; 2],
    latency_ceiling_ms: f64,
    packet_loss_ceiling: f64,
}

#[derive(Serialize)]
struct ConnectorInfo {
    name: String,
    kind: &'static str,
    endpoint: String,
    direction: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct StorageInfo {
    kind: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    ensure_config_exists(&args.config)?;

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn build_config_info(blueprint: &TwinBlueprint, args: &InfoArgs) -> ConfigInfo {
    let twin = &blueprint.twin;

    let connectors = blueprint
        .connectors
        .iter()
        .map(|c| ConnectorInfo {
            name: c.name.clone(),
            kind: c.kind.as_str(),
            endpoint: c.endpoint.clone(),
            direction: format!("{:?}", c.direction),
            params: if args.connectors {
                c.params.clone().into_iter().collect()
            } else {
                BTreeMap::new()
            },
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        twin: TwinInfo {
            sync_interval_ms: twin.sync_interval_ms,
            sync_enabled: twin.sync_enabled,
            anomaly_detection: twin.anomaly_detection,
            significant_change_db: twin.significant_change_db,
            max_pulls_per_cycle: twin.max_pulls_per_cycle,
            history_capacity: twin.history.capacity,
            signal_range_dbm: [twin.validation.min_signal_dbm, twin.validation.max_signal_dbm],
            latency_ceiling_ms: twin.anomaly.latency_ceiling_ms,
            packet_loss_ceiling: twin.anomaly.packet_loss_ceiling,
        },
        connectors,
        storage: blueprint.storage.as_ref().map(|s| StorageInfo {
            kind: format!("{:?}", s.kind),
            params: s.params.clone().into_iter().collect(),
        }),
    }
}

fn print_config_info(blueprint: &TwinBlueprint, args: &InfoArgs) {
    let twin = &blueprint.twin;

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  Twin Sync Configuration                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("🛰  Twin");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!(
        "   ├─ Sync: every {} ms ({}), up to {} pulls per connector",
        twin.sync_interval_ms,
        if twin.sync_enabled { "enabled" } else { "disabled" },
        twin.max_pulls_per_cycle
    );
    println!("   ├─ Significant change: {} dB", twin.significant_change_db);
    println!("   ├─ History capacity: {}", twin.history.capacity);
    println!(
        "   ├─ Accepted signal range: [{}, {}] dBm",
        twin.validation.min_signal_dbm, twin.validation.max_signal_dbm
    );
    if twin.anomaly_detection {
        println!(
            "   └─ Anomaly thresholds: signal < {} dBm, latency > {} ms, loss > {}",
            twin.anomaly.signal_floor_dbm,
            twin.anomaly.latency_ceiling_ms,
            twin.anomaly.packet_loss_ceiling
        );
    } else {
        println!("   └─ Anomaly detection: disabled");
    }

    println!("\n🔌 Connectors ({})", blueprint.connectors.len());
    for (i, connector) in blueprint.connectors.iter().enumerate() {
        let is_last = i == blueprint.connectors.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!(
            "   {} {} ({}, {:?}) -> {}",
            prefix,
            connector.name,
            connector.kind.as_str(),
            connector.direction,
            connector.endpoint
        );

        if args.connectors && !connector.params.is_empty() {
            let params: BTreeMap<_, _> = connector.params.iter().collect();
            for (j, (key, value)) in params.iter().enumerate() {
                let param_prefix = if j == params.len() - 1 { "└─" } else { "├─" };
                println!("   {}  {} {} = {}", child_prefix, param_prefix, key, value);
            }
        }
    }

    match &blueprint.storage {
        Some(storage) => {
            println!("\n💾 Storage ({:?})", storage.kind);
            let params: BTreeMap<_, _> = storage.params.iter().collect();
            for (i, (key, value)) in params.iter().enumerate() {
                let prefix = if i == params.len() - 1 { "└─" } else { "├─" };
                println!("   {} {} = {}", prefix, key, value);
            }
        }
        None => println!("\n💾 Storage: none"),
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use contracts::{ConnectorConfig, ConnectorKind, SyncDirection};

    fn blueprint() -> TwinBlueprint {
        TwinBlueprint {
            connectors: vec![ConnectorConfig {
                name: "ran".into(),
                kind: ConnectorKind::RequestResponse,
                endpoint: "127.0.0.1:9000".into(),
                direction: SyncDirection::Both,
                params: HashMap::from([("codec".into(), "bincode".into())]),
            }],
            ..TwinBlueprint::empty()
        }
    }

    #[test]
    fn test_params_only_with_flag() {
        let mut args = InfoArgs {
            config: "twin.toml".into(),
            json: true,
            connectors: false,
        };
        let info = build_config_info(&blueprint(), &args);
        assert!(info.connectors[0].params.is_empty());
        assert!(info.storage.is_none());

        args.connectors = true;
        let info = build_config_info(&blueprint(), &args);
        assert_eq!(info.connectors[0].params["codec"], "bincode");
        assert_eq!(info.connectors[0].kind, "request_response");
    }

    #[test]
    fn test_json_shape() {
        let args = InfoArgs {
            config: "twin.toml".into(),
            json: true,
            connectors: false,
        };
        let json = serde_json::to_value(build_config_info(&blueprint(), &args)).unwrap();
        assert_eq!(json["twin"]["sync_interval_ms"], 1000);
        assert_eq!(json["connectors"][0]["direction"], "Both");
        assert!(json.get("storage").is_none());
    }
}
