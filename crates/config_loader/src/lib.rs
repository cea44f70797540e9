//! # Config Loader
//!
//! 孪生配置加载：TOML (主要) / JSON → 语义校验 → `TwinBlueprint`。
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("twin.toml")).unwrap();
//! for connector in &blueprint.connectors {
//!     println!("{} -> {}", connector.name, connector.endpoint);
//! }
//! ```

mod parser;
mod validator;

pub use contracts::TwinBlueprint;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Stateless entry point for blueprint loading
pub struct ConfigLoader;

impl ConfigLoader {
    /// Read, parse and validate a blueprint file
    ///
    /// The format follows the extension (`.toml` / `.json`, any case).
    ///
    /// # Errors
    /// `ConfigParse` for an unknown extension or malformed content, `Io` when
    /// the file cannot be read, `ConfigValidation` for the first semantic
    /// violation.
    pub fn load_from_path(path: &Path) -> Result<TwinBlueprint, ContractError> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// Parse and validate blueprint text in a known format
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<TwinBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Render a blueprint as TOML
    pub fn to_toml(blueprint: &TwinBlueprint) -> Result<String, ContractError> {
        parser::render(blueprint, ConfigFormat::Toml)
    }

    /// Render a blueprint as pretty JSON
    pub fn to_json(blueprint: &TwinBlueprint) -> Result<String, ContractError> {
        parser::render(blueprint, ConfigFormat::Json)
    }
}
