//! 配置解析模块
//!
//! 文本 ⇄ `TwinBlueprint`，只做反序列化；语义校验在 `validator`。

use std::path::Path;

use contracts::{ContractError, TwinBlueprint};

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Blueprint file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (primary)
    Toml,
    Json,
}

impl ConfigFormat {
    /// Case-insensitive extension lookup
    pub fn from_extension(ext: &str) -> Option<Self> {
        if ext.eq_ignore_ascii_case("toml") {
            Some(Self::Toml)
        } else if ext.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else {
            None
        }
    }

    /// Format implied by a file name
    pub fn from_path(path: &Path) -> Result<Self, ContractError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| {
                ContractError::config_parse(format!(
                    "{}: no file extension to infer the config format from",
                    path.display()
                ))
            })?;
        Self::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            ConfigFormat::Toml => "TOML",
            ConfigFormat::Json => "JSON",
        }
    }
}

/// Deserialize a blueprint; missing sections take their defaults
pub fn parse(content: &str, format: ConfigFormat) -> Result<TwinBlueprint, ContractError> {
    let parsed: Result<TwinBlueprint, BoxedError> = match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(Into::into),
        ConfigFormat::Json => serde_json::from_str(content).map_err(Into::into),
    };
    parsed.map_err(|source| ContractError::ConfigParse {
        message: format!("{} parse error: {source}", format.name()),
        source: Some(source),
    })
}

/// Serialize a blueprint in `format`
pub fn render(blueprint: &TwinBlueprint, format: ConfigFormat) -> Result<String, ContractError> {
    let rendered: Result<String, BoxedError> = match format {
        ConfigFormat::Toml => toml::to_string_pretty(blueprint).map_err(Into::into),
        ConfigFormat::Json => serde_json::to_string_pretty(blueprint).map_err(Into::into),
    };
    rendered.map_err(|e| ContractError::config_parse(format!("{} serialize error: {e}", format.name())))
}
