//! SQLite 缓存条目实现

use crate::connection::connect_sqlite;
use crate::error::StorageError;
use crate::models::{EntryState, StoredEntry};
use crate::traits::CacheStore;
use domain::{CacheContent, CacheEntry};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::warn;

pub struct SqliteCacheStore {
    pub pool: SqlitePool,
}

impl SqliteCacheStore {
    pub async fn new(pool: SqlitePool) -> Result<Self, StorageError> {
        sqlx::query(
            "create table if not exists cache_entries (\
               seq integer primary key, \
               source_id text not null, \
               created_at_ms integer not null, \
               size_bytes integer not null, \
               state text not null, \
               content text not null)",
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }

    /// 打开 `path` 处的库文件（不存在则创建）。
    pub async fn open(path: &Path) -> Result<Self, StorageError> {
        let pool = connect_sqlite(path).await?;
        Self::new(pool).await
    }
}

#[async_trait::async_trait]
impl CacheStore for SqliteCacheStore {
    async fn insert_entry(&self, entry: &CacheEntry) -> Result<(), StorageError> {
        let content = serde_json::to_string(&entry.content)?;
        sqlx::query(
            "insert into cache_entries (seq, source_id, created_at_ms, size_bytes, state, content) \
             values (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(entry.seq as i64)
        .bind(&entry.source_id)
        .bind(entry.created_at_ms)
        .bind(entry.size_bytes as i64)
        .bind(EntryState::Pending.as_str())
        .bind(content)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_entries(&self) -> Result<Vec<StoredEntry>, StorageError> {
        let rows = sqlx::query(
            "select seq, source_id, created_at_ms, size_bytes, state, content \
             from cache_entries order by seq",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let seq: i64 = row.try_get("seq")?;
            let state: String = row.try_get("state")?;
            let Some(state) = EntryState::parse(&state) else {
                warn!(target: "fg.storage", seq, state = %state, "cache_entry_unknown_state");
                continue;
            };
            let content: String = row.try_get("content")?;
            let content: CacheContent = serde_json::from_str(&content)?;
            let size_bytes: i64 = row.try_get("size_bytes")?;
            items.push(StoredEntry {
                entry: CacheEntry {
                    seq: seq as u64,
                    source_id: row.try_get("source_id")?,
                    created_at_ms: row.try_get("created_at_ms")?,
                    size_bytes: size_bytes as u64,
                    content,
                },
                state,
            });
        }
        Ok(items)
    }

    async fn remove_entries(&self, seqs: &[u64]) -> Result<usize, StorageError> {
        if seqs.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let mut removed = 0;
        for seq in seqs {
            let result = sqlx::query("delete from cache_entries where seq = ?1")
                .bind(*seq as i64)
                .execute(&mut *tx)
                .await?;
            removed += result.rows_affected() as usize;
        }
        tx.commit().await?;
        Ok(removed)
    }

    async fn set_state(&self, seqs: &[u64], state: EntryState) -> Result<(), StorageError> {
        if seqs.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for seq in seqs {
            sqlx::query("update cache_entries set state = ?1 where seq = ?2")
                .bind(state.as_str())
                .bind(*seq as i64)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn update_entry(&self, entry: &CacheEntry, state: EntryState) -> Result<(), StorageError> {
        let content = serde_json::to_string(&entry.content)?;
        sqlx::query(
            "update cache_entries set content = ?1, size_bytes = ?2, state = ?3 where seq = ?4",
        )
        .bind(content)
        .bind(entry.size_bytes as i64)
        .bind(state.as_str())
        .bind(entry.seq as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn max_seq(&self) -> Result<Option<u64>, StorageError> {
        let row = sqlx::query("select max(seq) as max_seq from cache_entries")
            .fetch_one(&self.pool)
            .await?;
        let max: Option<i64> = row.try_get("max_seq")?;
        Ok(max.map(|v| v as u64))
    }
}
