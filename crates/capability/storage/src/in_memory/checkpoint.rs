//! 历史断点内存实现

use crate::error::StorageError;
use crate::traits::CheckpointStore;
use domain::HistoryCheckpoint;
use std::collections::HashMap;
use std::sync::RwLock;

fn checkpoint_key(scan_mode_id: &str, item_id: &str) -> (String, String) {
    (scan_mode_id.to_string(), item_id.to_string())
}

/// 历史断点内存存储
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: RwLock<HashMap<(String, String), HistoryCheckpoint>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn get_checkpoint(
        &self,
        scan_mode_id: &str,
        item_id: &str,
    ) -> Result<Option<HistoryCheckpoint>, StorageError> {
        let checkpoints = self.checkpoints.read().map_err(|_| StorageError::Lock)?;
        Ok(checkpoints
            .get(&checkpoint_key(scan_mode_id, item_id))
            .cloned())
    }

    async fn upsert_checkpoint(&self, checkpoint: &HistoryCheckpoint) -> Result<(), StorageError> {
        let mut checkpoints = self.checkpoints.write().map_err(|_| StorageError::Lock)?;
        checkpoints.insert(
            checkpoint_key(&checkpoint.scan_mode_id, &checkpoint.item_id),
            checkpoint.clone(),
        );
        Ok(())
    }

    async fn list_checkpoints(&self) -> Result<Vec<HistoryCheckpoint>, StorageError> {
        let checkpoints = self.checkpoints.read().map_err(|_| StorageError::Lock)?;
        let mut items: Vec<HistoryCheckpoint> = checkpoints.values().cloned().collect();
        items.sort_by(|a, b| {
            (a.scan_mode_id.as_str(), a.item_id.as_str())
                .cmp(&(b.scan_mode_id.as_str(), b.item_id.as_str()))
        });
        Ok(items)
    }

    async fn remove_scan_mode(&self, scan_mode_id: &str) -> Result<usize, StorageError> {
        let mut checkpoints = self.checkpoints.write().map_err(|_| StorageError::Lock)?;
        let before = checkpoints.len();
        checkpoints.retain(|(mode, _), _| mode != scan_mode_id);
        Ok(before - checkpoints.len())
    }
}
