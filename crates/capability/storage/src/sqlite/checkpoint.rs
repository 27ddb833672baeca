//! SQLite 历史断点实现

use crate::connection::connect_sqlite;
use crate::error::StorageError;
use crate::traits::CheckpointStore;
use domain::HistoryCheckpoint;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::Path;

pub struct SqliteCheckpointStore {
    pub pool: SqlitePool,
}

impl SqliteCheckpointStore {
    pub async fn new(pool: SqlitePool) -> Result<Self, StorageError> {
        sqlx::query(
            "create table if not exists history_checkpoints (\
               scan_mode_id text not null, \
               item_id text not null, \
               max_instant_ms integer not null, \
               interval_index integer not null, \
               primary key (scan_mode_id, item_id))",
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }

    pub async fn open(path: &Path) -> Result<Self, StorageError> {
        let pool = connect_sqlite(path).await?;
        Self::new(pool).await
    }
}

fn checkpoint_from_row(row: &SqliteRow) -> Result<HistoryCheckpoint, StorageError> {
    let interval_index: i64 = row.try_get("interval_index")?;
    Ok(HistoryCheckpoint {
        scan_mode_id: row.try_get("scan_mode_id")?,
        item_id: row.try_get("item_id")?,
        max_instant_ms: row.try_get("max_instant_ms")?,
        interval_index: interval_index as u32,
    })
}

#[async_trait::async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn get_checkpoint(
        &self,
        scan_mode_id: &str,
        item_id: &str,
    ) -> Result<Option<HistoryCheckpoint>, StorageError> {
        let row = sqlx::query(
            "select scan_mode_id, item_id, max_instant_ms, interval_index \
             from history_checkpoints where scan_mode_id = ?1 and item_id = ?2",
        )
        .bind(scan_mode_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(checkpoint_from_row).transpose()
    }

    async fn upsert_checkpoint(&self, checkpoint: &HistoryCheckpoint) -> Result<(), StorageError> {
        sqlx::query(
            "insert into history_checkpoints (scan_mode_id, item_id, max_instant_ms, interval_index) \
             values (?1, ?2, ?3, ?4) \
             on conflict (scan_mode_id, item_id) do update set \
               max_instant_ms = excluded.max_instant_ms, \
               interval_index = excluded.interval_index",
        )
        .bind(&checkpoint.scan_mode_id)
        .bind(&checkpoint.item_id)
        .bind(checkpoint.max_instant_ms)
        .bind(checkpoint.interval_index as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_checkpoints(&self) -> Result<Vec<HistoryCheckpoint>, StorageError> {
        let rows = sqlx::query(
            "select scan_mode_id, item_id, max_instant_ms, interval_index \
             from history_checkpoints order by scan_mode_id, item_id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(checkpoint_from_row).collect()
    }

    async fn remove_scan_mode(&self, scan_mode_id: &str) -> Result<usize, StorageError> {
        let result = sqlx::query("delete from history_checkpoints where scan_mode_id = ?1")
            .bind(scan_mode_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }
}
