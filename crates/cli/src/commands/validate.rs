//! `validate` command: load a blueprint, report errors and soft warnings.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{ConnectorKind, TwinBlueprint};

use crate::cli::ValidateArgs;
use crate::error::ensure_config_exists;

/// Outcome of one validation, also the `--json` document
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    sync_interval_ms: u64,
    sync_enabled: bool,
    connector_count: usize,
    simulated_count: usize,
    storage: Option<String>,
}

impl ValidationResult {
    fn rejected(config_path: String, error: impl ToString) -> Self {
        Self {
            valid: false,
            config_path,
            error: Some(error.to_string()),
            warnings: None,
            summary: None,
        }
    }

    fn accepted(config_path: String, blueprint: &TwinBlueprint) -> Self {
        let warnings = collect_warnings(blueprint);
        Self {
            valid: true,
            config_path,
            error: None,
            warnings: (!warnings.is_empty()).then_some(warnings),
            summary: Some(ConfigSummary::of(blueprint)),
        }
    }

    fn print(&self) {
        if !self.valid {
            println!("✗ {} is not a usable twin configuration", self.config_path);
            if let Some(error) = &self.error {
                println!("\n  {error}");
            }
            return;
        }

        println!("✓ {} is a valid twin configuration", self.config_path);
        if let Some(s) = &self.summary {
            let sync = if s.sync_enabled { "on" } else { "off" };
            println!("\n  Version:    {}", s.version);
            println!("  Sync:       {} ms, {}", s.sync_interval_ms, sync);
            println!("  Connectors: {} ({} simulated)", s.connector_count, s.simulated_count);
            println!("  Storage:    {}", s.storage.as_deref().unwrap_or("none"));
        }
        for (i, warning) in self.warnings.iter().flatten().enumerate() {
            if i == 0 {
                println!("\n⚠ Warnings:");
            }
            println!("  - {warning}");
        }
    }
}

impl ConfigSummary {
    fn of(blueprint: &TwinBlueprint) -> Self {
        Self {
            version: format!("{:?}", blueprint.version),
            sync_interval_ms: blueprint.twin.sync_interval_ms,
            sync_enabled: blueprint.twin.sync_enabled,
            connector_count: blueprint.connectors.len(),
            simulated_count: blueprint.connectors_of_kind(ConnectorKind::Simulated).count(),
            storage: blueprint.storage.as_ref().map(|s| format!("{:?}", s.kind)),
        }
    }
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);
    if args.json {
        let doc = serde_json::to_string_pretty(&result).context("cannot render validation result")?;
        println!("{doc}");
    } else {
        result.print();
    }

    anyhow::ensure!(result.valid, "configuration rejected");
    Ok(())
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();
    if let Err(e) = ensure_config_exists(&args.config) {
        return ValidationResult::rejected(config_path, e);
    }
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => ValidationResult::accepted(config_path, &blueprint),
        Err(e) => ValidationResult::rejected(config_path, e),
    }
}

/// Settings that load fine but probably do not do what the operator wants
fn collect_warnings(blueprint: &TwinBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.connectors.is_empty() {
        warnings.push("No connectors configured; the twin only changes through imports".to_string());
    } else if !blueprint.connectors.iter().any(|c| c.direction.pulls()) {
        warnings.push("No connector pulls state; the twin will not follow the physical system".to_string());
    }
    if !blueprint.twin.sync_enabled {
        warnings.push("twin.sync_enabled is false; `run` performs a single cycle".to_string());
    }
    if blueprint.storage.is_none() {
        warnings.push("No storage configured; snapshots are not persisted".to_string());
    }

    let bounds = &blueprint.twin.validation;
    let floor = blueprint.twin.anomaly.signal_floor_dbm;
    if !(bounds.min_signal_dbm..=bounds.max_signal_dbm).contains(&floor) {
        warnings.push(format!(
            "anomaly.signal_floor_dbm ({floor}) is outside the accepted signal range [{}, {}]",
            bounds.min_signal_dbm, bounds.max_signal_dbm
        ));
    }

    warnings
}
