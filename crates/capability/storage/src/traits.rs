//! 存储接口 Trait 定义
//!
//! - CacheStore：北向缓存条目
//! - CheckpointStore：南向历史断点

use crate::error::StorageError;
use crate::models::{EntryState, StoredEntry};
use async_trait::async_trait;
use domain::{CacheEntry, HistoryCheckpoint};

/// 北向缓存条目存储接口
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// 写入新条目（状态为 pending）。
    async fn insert_entry(&self, entry: &CacheEntry) -> Result<(), StorageError>;

    /// 按 seq 升序列出全部条目。
    async fn list_entries(&self) -> Result<Vec<StoredEntry>, StorageError>;

    /// 删除指定条目，返回实际删除数量。
    async fn remove_entries(&self, seqs: &[u64]) -> Result<usize, StorageError>;

    /// 修改条目状态。
    async fn set_state(&self, seqs: &[u64], state: EntryState) -> Result<(), StorageError>;

    /// 覆盖条目内容与状态（文件在缓存目录间移动后路径会变化）。
    async fn update_entry(&self, entry: &CacheEntry, state: EntryState) -> Result<(), StorageError>;

    /// 当前最大 seq（空库为 None）。
    async fn max_seq(&self) -> Result<Option<u64>, StorageError>;
}

/// 南向历史断点存储接口
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get_checkpoint(
        &self,
        scan_mode_id: &str,
        item_id: &str,
    ) -> Result<Option<HistoryCheckpoint>, StorageError>;

    async fn upsert_checkpoint(&self, checkpoint: &HistoryCheckpoint) -> Result<(), StorageError>;

    async fn list_checkpoints(&self) -> Result<Vec<HistoryCheckpoint>, StorageError>;

    /// 删除某扫描模式下的全部断点，返回删除数量。
    async fn remove_scan_mode(&self, scan_mode_id: &str) -> Result<usize, StorageError>;
}
