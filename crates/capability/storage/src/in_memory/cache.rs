//! 缓存条目内存实现

use crate::error::StorageError;
use crate::models::{EntryState, StoredEntry};
use crate::traits::CacheStore;
use domain::CacheEntry;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// 缓存条目内存存储（按 seq 有序）
#[derive(Default)]
pub struct InMemoryCacheStore {
    entries: RwLock<BTreeMap<u64, StoredEntry>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取条目数量（用于测试）
    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn insert_entry(&self, entry: &CacheEntry) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| StorageError::Lock)?;
        entries.insert(
            entry.seq,
            StoredEntry {
                entry: entry.clone(),
                state: EntryState::Pending,
            },
        );
        Ok(())
    }

    async fn list_entries(&self) -> Result<Vec<StoredEntry>, StorageError> {
        let entries = self.entries.read().map_err(|_| StorageError::Lock)?;
        Ok(entries.values().cloned().collect())
    }

    async fn remove_entries(&self, seqs: &[u64]) -> Result<usize, StorageError> {
        let mut entries = self.entries.write().map_err(|_| StorageError::Lock)?;
        Ok(seqs
            .iter()
            .filter(|seq| entries.remove(seq).is_some())
            .count())
    }

    async fn set_state(&self, seqs: &[u64], state: EntryState) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| StorageError::Lock)?;
        for seq in seqs {
            if let Some(stored) = entries.get_mut(seq) {
                stored.state = state;
            }
        }
        Ok(())
    }

    async fn update_entry(&self, entry: &CacheEntry, state: EntryState) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| StorageError::Lock)?;
        if let Some(stored) = entries.get_mut(&entry.seq) {
            stored.entry = entry.clone();
            stored.state = state;
        }
        Ok(())
    }

    async fn max_seq(&self) -> Result<Option<u64>, StorageError> {
        let entries = self.entries.read().map_err(|_| StorageError::Lock)?;
        Ok(entries.keys().next_back().copied())
    }
}
