use fg_config::ConfigError;
use fg_storage::StorageError;

/// 南向采集错误。
#[derive(Debug, thiserror::Error)]
pub enum SouthError {
    #[error("scan mode not found: {0}")]
    ScanModeNotFound(String),
    #[error("invalid cron for scan mode {scan_mode}: {reason}")]
    InvalidCron { scan_mode: String, reason: String },
    #[error("connection error: {0}")]
    Connection(String),
    #[error("read error: {0}")]
    Read(String),
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("scheduler error: {0}")]
    Scheduler(String),
}

impl SouthError {
    /// 配置类错误：连接器不能启动。
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            SouthError::ScanModeNotFound(_) | SouthError::InvalidCron { .. } | SouthError::Config(_)
        )
    }
}

impl From<StorageError> for SouthError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<std::io::Error> for SouthError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<ConfigError> for SouthError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
