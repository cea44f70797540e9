//! 配置校验模块
//!
//! 校验规则：
//! - twin 引擎参数满足字段级规则 (interval > 0, 阈值范围, 信号上下限顺序)
//! - connector 名称非空且唯一
//! - endpoint 非空；request_response 的 endpoint 必须是 socket 地址
//! - connector / storage 参数可解析

use std::collections::HashSet;
use std::net::SocketAddr;

use contracts::{ConnectorConfig, ConnectorKind, ContractError, StorageKind, TwinBlueprint};

const CODECS: [&str; 2] = ["json", "bincode"];

/// 校验 TwinBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &TwinBlueprint) -> Result<(), ContractError> {
    blueprint.twin.check()?;
    validate_connector_names(blueprint)?;
    for (idx, connector) in blueprint.connectors.iter().enumerate() {
        validate_connector(idx, connector)?;
    }
    validate_storage(blueprint)?;
    Ok(())
}

/// 校验 connector 名称唯一性
fn validate_connector_names(blueprint: &TwinBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, connector) in blueprint.connectors.iter().enumerate() {
        if connector.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("connectors[{}].name", idx),
                "connector name cannot be empty",
            ));
        }
        if !seen.insert(connector.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("connectors[name={}]", connector.name),
                "duplicate connector name",
            ));
        }
    }
    Ok(())
}

/// 校验单个 connector
fn validate_connector(idx: usize, connector: &ConnectorConfig) -> Result<(), ContractError> {
    if connector.endpoint.trim().is_empty() {
        return Err(ContractError::config_validation(
            format!("connectors[{}].endpoint", idx),
            "endpoint cannot be empty",
        ));
    }

    match connector.kind {
        ConnectorKind::RequestResponse => {
            if connector.endpoint.parse::<SocketAddr>().is_err() {
                return Err(ContractError::config_validation(
                    format!("connectors[{}].endpoint", idx),
                    format!("'{}' is not a socket address", connector.endpoint),
                ));
            }
            if let Some(codec) = connector.params.get("codec") {
                if !CODECS.contains(&codec.as_str()) {
                    return Err(ContractError::config_validation(
                        format!("connectors[{}].params.codec", idx),
                        format!("unsupported codec '{}', expected json or bincode", codec),
                    ));
                }
            }
            positive_param(idx, connector, "timeout_ms")?;
            if let Some(bind) = connector.params.get("bind") {
                if bind.parse::<SocketAddr>().is_err() {
                    return Err(ContractError::config_validation(
                        format!("connectors[{}].params.bind", idx),
                        format!("'{}' is not a socket address", bind),
                    ));
                }
            }
        }
        ConnectorKind::PubSub => {
            positive_param(idx, connector, "capacity")?;
        }
        ConnectorKind::Simulated => {
            positive_param(idx, connector, "components")?;
            positive_param(idx, connector, "batch")?;
        }
    }
    Ok(())
}

/// Optional integer parameter that must be > 0 when present
fn positive_param(idx: usize, connector: &ConnectorConfig, key: &str) -> Result<(), ContractError> {
    match connector.params.get(key) {
        None => Ok(()),
        Some(raw) => match raw.parse::<u64>() {
            Ok(v) if v > 0 => Ok(()),
            _ => Err(ContractError::config_validation(
                format!("connectors[{}].params.{}", idx, key),
                format!("{} must be a positive integer, got '{}'", key, raw),
            )),
        },
    }
}

/// 校验 storage 配置
fn validate_storage(blueprint: &TwinBlueprint) -> Result<(), ContractError> {
    let Some(storage) = &blueprint.storage else {
        return Ok(());
    };

    if storage.kind == StorageKind::File {
        match storage.params.get("path") {
            Some(path) if !path.is_empty() => {}
            _ => {
                return Err(ContractError::config_validation(
                    "storage.params.path",
                    "file storage requires a non-empty path",
                ))
            }
        }
        if let Some(format) = storage.params.get("format") {
            if !CODECS.contains(&format.as_str()) {
                return Err(ContractError::config_validation(
                    "storage.params.format",
                    format!("unsupported format '{}', expected json or bincode", format),
                ));
            }
        }
        if let Some(raw) = storage.params.get("max_files") {
            if !matches!(raw.parse::<usize>(), Ok(n) if n > 0) {
                return Err(ContractError::config_validation(
                    "storage.params.max_files",
                    format!("max_files must be a positive integer, got '{}'", raw),
                ));
            }
        }
    }
    Ok(())
}
