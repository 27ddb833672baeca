use fg_config::ConfigError;
use fg_north::NorthError;
use fg_south::SouthError;
use fg_storage::StorageError;

/// 引擎错误：连接器装配与生命周期。
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(String),
    #[error("unknown connector type: {0}")]
    UnknownType(String),
    #[error("connector already running: {0}")]
    Duplicate(String),
    #[error("connector not found: {0}")]
    NotFound(String),
    #[error("south error: {0}")]
    South(String),
    #[error("north error: {0}")]
    North(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<SouthError> for EngineError {
    fn from(err: SouthError) -> Self {
        if err.is_config() {
            Self::Config(err.to_string())
        } else {
            Self::South(err.to_string())
        }
    }
}

impl From<NorthError> for EngineError {
    fn from(err: NorthError) -> Self {
        match err {
            NorthError::Config(message) => Self::Config(message),
            other => Self::North(other.to_string()),
        }
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}
