//! 持久化记录

use domain::CacheEntry;

/// 缓存条目的持久化状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// 等待发送（包括正在发送中的条目）。
    Pending,
    /// 永久失败，等待人工处理。
    Errored,
}

impl EntryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryState::Pending => "pending",
            EntryState::Errored => "errored",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(EntryState::Pending),
            "errored" => Some(EntryState::Errored),
            _ => None,
        }
    }
}

/// 带状态的缓存条目。
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub entry: CacheEntry,
    pub state: EntryState,
}
