//! 协议错误类型定义

use fg_engine::EngineError;
use fg_north::NorthError;
use fg_south::SouthError;

/// 协议通信错误
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// 连接错误
    #[error("connection error: {0}")]
    Connection(String),

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Modbus 错误
    #[error("modbus error: {0}")]
    Modbus(String),

    /// MQTT 错误
    #[error("mqtt error: {0}")]
    Mqtt(String),

    /// 配置解析错误
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// 数据解析错误
    #[error("data parse error: {0}")]
    DataParse(String),

    /// 超时错误
    #[error("timeout: {0}")]
    Timeout(String),
}

impl From<ProtocolError> for SouthError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Connection(message) | ProtocolError::Mqtt(message) => {
                SouthError::Connection(message)
            }
            ProtocolError::ConfigParse(message) => SouthError::Config(message),
            ProtocolError::Io(err) => SouthError::Io(err.to_string()),
            other => SouthError::Read(other.to_string()),
        }
    }
}

impl From<ProtocolError> for NorthError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::ConfigParse(message) => NorthError::Config(message),
            ProtocolError::DataParse(message) => NorthError::Application {
                status: None,
                message,
                retryable: false,
            },
            other => NorthError::Transport(other.to_string()),
        }
    }
}

impl From<ProtocolError> for EngineError {
    fn from(err: ProtocolError) -> Self {
        EngineError::Config(err.to_string())
    }
}
