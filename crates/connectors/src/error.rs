//! Connector 错误类型

use contracts::ContractError;
use thiserror::Error;

/// Errors raised while building connectors from configuration
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// 参数缺失或无法解析
    #[error("connector '{connector}': invalid parameter '{param}': {message}")]
    InvalidParam {
        connector: String,
        param: String,
        message: String,
    },

    /// Error from a shared contract
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl ConnectorError {
    pub fn invalid_param(
        connector: impl Into<String>,
        param: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidParam {
            connector: connector.into(),
            param: param.into(),
            message: message.into(),
        }
    }
}

impl From<ConnectorError> for ContractError {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::InvalidParam {
                connector,
                param,
                message,
            } => ContractError::config_validation(
                format!("connectors[name={}].params.{}", connector, param),
                message,
            ),
            ConnectorError::Contract(e) => e,
        }
    }
}

/// Connector Result 类型别名
pub type Result<T> = std::result::Result<T, ConnectorError>;
