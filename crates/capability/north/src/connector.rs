//! 北向协议适配接口。

use crate::error::NorthError;
use async_trait::async_trait;
use domain::CacheContent;

/// 北向协议适配器。
///
/// `handle_content` 按内容类型分派：合并后的时序值，或单个缓存文件。
#[async_trait]
pub trait NorthConnector: Send + Sync {
    async fn connect(&self) -> Result<(), NorthError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), NorthError> {
        Ok(())
    }

    async fn handle_content(&self, content: &CacheContent) -> Result<(), NorthError>;

    /// 失败是否可重试；适配器可按协议覆盖。
    fn should_retry(&self, err: &NorthError) -> bool {
        err.default_retryable()
    }
}

/// HTTP 类目的端的默认可重试状态码。
pub fn retryable_status(status: u16) -> bool {
    matches!(status, 400 | 500 | 502 | 503 | 504)
}
