//! TwinBlueprint - Config Loader 输出
//!
//! 描述完整的 twin 配置：引擎参数、连接器列表、快照存储。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::TwinEngineConfig;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的 twin 配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwinBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 引擎设置
    #[serde(default)]
    pub twin: TwinEngineConfig,

    /// 连接器定义列表
    #[serde(default)]
    pub connectors: Vec<ConnectorConfig>,

    /// 快照存储 (可选)
    #[serde(default)]
    pub storage: Option<StorageConfig>,
}

/// 连接器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// 唯一名称
    pub name: String,

    /// 连接器类型
    pub kind: ConnectorKind,

    /// 远端地址 (UDP socket address / topic 前缀 / 模拟器名)
    pub endpoint: String,

    /// 同步方向
    #[serde(default)]
    pub direction: SyncDirection,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl ConnectorConfig {
    /// Typed lookup of a parameter, `None` when absent or unparseable
    pub fn param<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.params.get(key).and_then(|v| v.parse().ok())
    }
}

/// 连接器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorKind {
    /// 请求/应答 (UDP)
    RequestResponse,
    /// 发布/订阅
    PubSub,
    /// 进程内遥测模拟器
    Simulated,
}

impl ConnectorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectorKind::RequestResponse => "request_response",
            ConnectorKind::PubSub => "pub_sub",
            ConnectorKind::Simulated => "simulated",
        }
    }
}

/// 同步方向
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// 从物理系统拉取
    #[default]
    Pull,
    /// 向物理系统推送
    Push,
    /// 双向
    Both,
}

impl SyncDirection {
    #[inline]
    pub fn pulls(self) -> bool {
        matches!(self, SyncDirection::Pull | SyncDirection::Both)
    }

    #[inline]
    pub fn pushes(self) -> bool {
        matches!(self, SyncDirection::Push | SyncDirection::Both)
    }
}

/// 快照存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 存储类型
    pub kind: StorageKind,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// 存储类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// 文件输出
    File,
    /// 日志输出
    Log,
}

impl TwinBlueprint {
    /// Blueprint with default engine settings and nothing attached
    pub fn empty() -> Self {
        Self {
            version: ConfigVersion::V1,
            twin: TwinEngineConfig::default(),
            connectors: Vec::new(),
            storage: None,
        }
    }

    pub fn connector(&self, name: &str) -> Option<&ConnectorConfig> {
        self.connectors.iter().find(|c| c.name == name)
    }

    /// Connectors grouped by kind, in declaration order
    pub fn connectors_of_kind(&self, kind: ConnectorKind) -> impl Iterator<Item = &ConnectorConfig> {
        self.connectors.iter().filter(move |c| c.kind == kind)
    }
}
