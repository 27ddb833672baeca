//! 网关核心领域模型：南向采集与北向转发共享的数据结构。

pub mod data;
pub mod scan;

pub use data::{CacheContent, CacheEntry, ContentType, TimeValue, TimeValueData};
pub use scan::{
    HISTORY_SCAN_MODE, HistoryCheckpoint, Interval, ScanMode, SUBSCRIPTION_SCAN_MODE, SouthItem,
};

/// 获取当前 Unix 时间戳（毫秒）。
pub fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
