use serde::{Deserialize, Serialize};

/// 订阅模式使用的保留扫描模式 ID（不创建定时触发器）。
pub const SUBSCRIPTION_SCAN_MODE: &str = "subscription";

/// 有界历史任务使用的保留扫描模式 ID。
pub const HISTORY_SCAN_MODE: &str = "history";

/// 扫描模式：命名的 cron 调度，可被多个采集项共享。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanMode {
    pub id: String,
    pub name: String,
    pub cron: String,
}

/// 南向采集项（点位、主题或查询）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SouthItem {
    pub id: String,
    pub name: String,
    pub scan_mode_id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 协议相关配置，由协议适配器自行解析。
    #[serde(default)]
    pub settings: serde_json::Value,
}

fn default_enabled() -> bool {
    true
}

/// 时间区间 `[start_ms, end_ms]`（毫秒时间戳）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl Interval {
    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        Self { start_ms, end_ms }
    }

    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }
}

/// 历史查询断点：某扫描模式下某采集项（或 `all`）已完成的最大时间。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryCheckpoint {
    pub scan_mode_id: String,
    pub item_id: String,
    pub max_instant_ms: i64,
    pub interval_index: u32,
}
