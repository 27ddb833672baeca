use fg_config::ConfigError;
use fg_storage::StorageError;

/// 北向发送错误。
#[derive(Debug, thiserror::Error)]
pub enum NorthError {
    /// 未收到响应（连接失败、断开等）。
    #[error("transport error: {0}")]
    Transport(String),
    /// 收到响应但被拒绝。
    #[error("application error (status {status:?}): {message}")]
    Application {
        status: Option<u16>,
        message: String,
        retryable: bool,
    },
    #[error("send timed out after {0} ms")]
    Timeout(u64),
    #[error("io error: {0}")]
    Io(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("config error: {0}")]
    Config(String),
}

impl NorthError {
    /// 按状态码构造应用层错误，可重试状态见 [`crate::retryable_status`]。
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self::Application {
            status: Some(status),
            message: message.into(),
            retryable: crate::connector::retryable_status(status),
        }
    }

    /// 传输层失败（含超时），不受 retry_count 限制。
    pub fn is_transport(&self) -> bool {
        matches!(self, NorthError::Transport(_) | NorthError::Timeout(_))
    }

    /// 默认重试分类。
    pub fn default_retryable(&self) -> bool {
        match self {
            NorthError::Transport(_) | NorthError::Timeout(_) => true,
            NorthError::Application { retryable, .. } => *retryable,
            NorthError::Io(_) | NorthError::Storage(_) | NorthError::Config(_) => false,
        }
    }
}

impl From<StorageError> for NorthError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<std::io::Error> for NorthError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<ConfigError> for NorthError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<serde_json::Error> for NorthError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
