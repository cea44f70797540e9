//! `twin-sync` 命令行参数 (clap derive)

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Twin Sync - digital twin state synchronization engine
#[derive(Parser, Debug)]
#[command(
    name = "twin-sync",
    author,
    version,
    about = "Digital twin state synchronization, prediction and optimization",
    long_about = "Keeps a digital twin of a wireless network in sync with its physical\n\
                  counterpart.\n\n\
                  Builds connectors from configuration, runs the periodic sync loop,\n\
                  detects anomalies and persists snapshots of the twin state."
)]
pub struct Cli {
    /// -v debug, -vv trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "TWIN_SYNC_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Shape of log lines
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "TWIN_SYNC_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log level used when RUST_LOG is not set
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the synchronization loop
    Run(RunArgs),

    /// Load and check a configuration, then exit
    Validate(ValidateArgs),

    /// Describe the twin, connectors and storage a configuration sets up
    Info(InfoArgs),
}

/// `run`
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Twin configuration (.toml or .json)
    #[arg(short, long, default_value = "twin.toml", env = "TWIN_SYNC_CONFIG")]
    pub config: PathBuf,

    /// Stop after this many sync cycles (0 = unlimited)
    #[arg(long, default_value = "0", env = "TWIN_SYNC_MAX_CYCLES")]
    pub max_cycles: u64,

    /// Run timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "TWIN_SYNC_TIMEOUT")]
    pub timeout: u64,

    /// Override the sync interval from configuration (milliseconds)
    #[arg(long, env = "TWIN_SYNC_INTERVAL_MS")]
    pub interval_ms: Option<u64>,

    /// Prometheus metrics port (0 = disabled)
    #[arg(long, default_value = "0", env = "TWIN_SYNC_METRICS_PORT")]
    pub metrics_port: u16,

    /// Seed the twin from a JSON snapshot before the first cycle
    #[arg(long)]
    pub import: Option<PathBuf>,

    /// Write the final twin state as a JSON snapshot
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,
}

/// `validate`
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Configuration to check
    #[arg(short, long, default_value = "twin.toml")]
    pub config: PathBuf,

    /// Print the result as a JSON document
    #[arg(long)]
    pub json: bool,
}

/// `info`
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Twin configuration (.toml or .json)
    #[arg(short, long, default_value = "twin.toml")]
    pub config: PathBuf,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,

    /// Show connector parameters
    #[arg(long)]
    pub connectors: bool,
}

/// `--log-format` values
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// Multi-line, for terminals
    #[default]
    Pretty,
    /// One short line per event
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_defaults() {
        let cli = Cli::parse_from(["twin-sync", "run"]);
        let Commands::Run(ref args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config, PathBuf::from("twin.toml"));
        assert_eq!(args.max_cycles, 0);
        assert!(args.import.is_none());
        assert_eq!(cli.default_log_level(), "info");
    }

    #[test]
    fn test_verbosity_levels() {
        let cli = Cli::parse_from(["twin-sync", "-vv", "validate"]);
        assert_eq!(cli.default_log_level(), "trace");
        let cli = Cli::parse_from(["twin-sync", "-q", "info", "--connectors"]);
        assert_eq!(cli.default_log_level(), "warn");
        assert!(Cli::try_parse_from(["twin-sync", "-q", "-v", "info"]).is_err());
    }

    #[test]
    fn test_run_flags() {
        let cli = Cli::parse_from([
            "twin-sync",
            "--log-format",
            "json",
            "run",
            "-c",
            "lab.json",
            "--max-cycles",
            "5",
            "--export",
            "out.json",
            "--dry-run",
        ]);
        assert!(matches!(cli.log_format, LogFormat::Json));
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.max_cycles, 5);
        assert_eq!(args.export, Some(PathBuf::from("out.json")));
        assert!(args.dry_run);
    }
}
