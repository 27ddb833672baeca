//! 北向内容缓存。
//!
//! 条目在到达时即写入 SQLite（文件同时复制进 `files/`），发送确认后才删除。
//! `pending` 按 seq 有序；同一时刻只有一个 Transaction 的条目处于在途状态。

use crate::error::NorthError;
use domain::{CacheContent, CacheEntry, TimeValue, now_epoch_ms};
use fg_config::CachingSettings;
use fg_storage::{CacheStore, EntryState};
use fg_telemetry::NorthMetrics;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

/// 连接器缓存目录布局。
#[derive(Debug, Clone)]
pub struct CacheFolders {
    pub base: PathBuf,
    pub files: PathBuf,
    pub errors: PathBuf,
    pub archive: PathBuf,
}

impl CacheFolders {
    pub fn new(base: &Path) -> Self {
        Self {
            base: base.to_path_buf(),
            files: base.join("files"),
            errors: base.join("files-errors"),
            archive: base.join("archive"),
        }
    }

    pub async fn create(&self) -> Result<(), NorthError> {
        for folder in [&self.files, &self.errors, &self.archive] {
            tokio::fs::create_dir_all(folder).await?;
        }
        Ok(())
    }
}

/// 一次发送尝试：连续的时序值条目（合并为一个内容），或单个文件条目。
#[derive(Debug, Clone)]
pub struct Transaction {
    pub seqs: Vec<u64>,
    pub content: CacheContent,
    pub value_count: usize,
    pub file_count: usize,
}

#[derive(Default)]
struct BufferState {
    pending: BTreeMap<u64, CacheEntry>,
    in_flight: HashSet<u64>,
    errored: BTreeMap<u64, CacheEntry>,
    next_seq: u64,
    size_bytes: u64,
}

/// 北向内容缓存。
pub struct ContentBuffer {
    north_id: String,
    settings: CachingSettings,
    store: Arc<dyn CacheStore>,
    folders: CacheFolders,
    metrics: Arc<NorthMetrics>,
    state: Mutex<BufferState>,
    notify: Notify,
}

impl ContentBuffer {
    /// 打开缓存并从持久化存储重新加载条目。
    pub async fn open(
        north_id: &str,
        settings: CachingSettings,
        store: Arc<dyn CacheStore>,
        folders: CacheFolders,
        metrics: Arc<NorthMetrics>,
    ) -> Result<Self, NorthError> {
        folders.create().await?;
        let mut state = BufferState::default();
        for stored in store.list_entries().await? {
            state.size_bytes += stored.entry.size_bytes;
            match stored.state {
                EntryState::Pending => state.pending.insert(stored.entry.seq, stored.entry),
                EntryState::Errored => state.errored.insert(stored.entry.seq, stored.entry),
            };
        }
        state.next_seq = store.max_seq().await?.map(|seq| seq + 1).unwrap_or(1);
        info!(
            target: "fg.north",
            north_id = %north_id,
            pending = state.pending.len(),
            errored = state.errored.len(),
            size_bytes = state.size_bytes,
            "cache_reloaded"
        );
        metrics.set_cache_state(state.pending.len(), state.errored.len(), state.size_bytes);
        Ok(Self {
            north_id: north_id.to_string(),
            settings,
            store,
            folders,
            metrics,
            state: Mutex::new(state),
            notify: Notify::new(),
        })
    }

    pub fn folders(&self) -> &CacheFolders {
        &self.folders
    }

    fn sync_metrics(&self, state: &BufferState) {
        self.metrics
            .set_cache_state(state.pending.len(), state.errored.len(), state.size_bytes);
    }

    fn over_capacity(&self, state: &BufferState) -> bool {
        let max_bytes = self.settings.max_size_mb.saturating_mul(1024 * 1024);
        max_bytes > 0 && state.size_bytes >= max_bytes
    }

    fn discard(&self, source_id: &str, content_type: &str, state: &BufferState) {
        self.metrics.record_discarded();
        warn!(
            target: "fg.north",
            north_id = %self.north_id,
            source_id = %source_id,
            content_type,
            size_bytes = state.size_bytes,
            max_size_mb = self.settings.max_size_mb,
            "cache_full_content_discarded"
        );
    }

    /// 缓存一批时序值；超过 `max_send_count` 时拆分为多个条目。
    pub async fn add_values(&self, source_id: &str, values: Vec<TimeValue>) -> Result<(), NorthError> {
        if values.is_empty() {
            return Ok(());
        }
        let mut state = self.state.lock().await;
        if self.over_capacity(&state) {
            self.discard(source_id, "time-values", &state);
            return Ok(());
        }
        let created_at_ms = now_epoch_ms();
        let chunk_size = self.settings.max_send_count.max(1);
        let mut entries = 0;
        for chunk in values.chunks(chunk_size) {
            let content = CacheContent::TimeValues {
                values: chunk.to_vec(),
            };
            let size_bytes = serde_json::to_vec(&content)?.len() as u64;
            let entry = CacheEntry {
                seq: state.next_seq,
                source_id: source_id.to_string(),
                created_at_ms,
                size_bytes,
                content,
            };
            self.store.insert_entry(&entry).await?;
            state.next_seq += 1;
            state.size_bytes += size_bytes;
            state.pending.insert(entry.seq, entry);
            entries += 1;
        }
        self.sync_metrics(&state);
        drop(state);
        self.notify.notify_one();
        debug!(
            target: "fg.north",
            north_id = %self.north_id,
            source_id = %source_id,
            values = values.len(),
            entries,
            "values_cached"
        );
        Ok(())
    }

    /// 复制文件进缓存目录（`<stem>-<ts><ext>`），源文件不动。
    /// 缓存已满而丢弃时返回 `false`。复制期间不持有缓存锁。
    pub async fn add_file(&self, source_id: &str, path: &Path) -> Result<bool, NorthError> {
        {
            let state = self.state.lock().await;
            if self.over_capacity(&state) {
                self.discard(source_id, "raw", &state);
                return Ok(false);
            }
        }
        let created_at_ms = now_epoch_ms();
        let target = self.reserve_cache_file(path, created_at_ms).await?;
        let size_bytes = match tokio::fs::copy(path, &target).await {
            Ok(size_bytes) => size_bytes,
            Err(err) => {
                remove_file_logged(&self.north_id, &target).await;
                return Err(err.into());
            }
        };

        let mut state = self.state.lock().await;
        let entry = CacheEntry {
            seq: state.next_seq,
            source_id: source_id.to_string(),
            created_at_ms,
            size_bytes,
            content: CacheContent::Raw {
                path: target.clone(),
            },
        };
        if let Err(err) = self.store.insert_entry(&entry).await {
            drop(state);
            remove_file_logged(&self.north_id, &target).await;
            return Err(err.into());
        }
        state.next_seq += 1;
        state.size_bytes += size_bytes;
        state.pending.insert(entry.seq, entry);
        self.sync_metrics(&state);
        drop(state);
        self.notify.notify_one();
        debug!(
            target: "fg.north",
            north_id = %self.north_id,
            source_id = %source_id,
            file = %target.display(),
            size_bytes,
            "file_cached"
        );
        Ok(true)
    }

    /// 以 `create_new` 占位缓存文件名；重名时追加递增后缀。
    async fn reserve_cache_file(&self, source: &Path, ts_ms: i64) -> Result<PathBuf, NorthError> {
        let stem = source
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let extension = source
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let mut attempt = 0u32;
        loop {
            let name = match attempt {
                0 => format!("{}-{}{}", stem, ts_ms, extension),
                n => format!("{}-{}-{}{}", stem, ts_ms, n, extension),
            };
            let candidate = self.folders.files.join(name);
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&candidate)
                .await
            {
                Ok(_) => return Ok(candidate),
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// 等待新内容到达。
    pub(crate) async fn notified(&self) {
        self.notify.notified().await;
    }

    /// 可发送条目数与其中最早的创建时间。
    pub(crate) async fn backlog(&self) -> (usize, Option<i64>) {
        let state = self.state.lock().await;
        let ready = state
            .pending
            .values()
            .filter(|entry| !state.in_flight.contains(&entry.seq));
        let mut count = 0;
        let mut oldest: Option<i64> = None;
        for entry in ready {
            count += 1;
            oldest = Some(oldest.map_or(entry.created_at_ms, |ts| ts.min(entry.created_at_ms)));
        }
        (count, oldest)
    }

    /// 取出下一个 Transaction（最多 `max_send_count` 个条目），并标记为在途。
    pub(crate) async fn take_transaction(&self) -> Option<Transaction> {
        let mut state = self.state.lock().await;
        let mut seqs = Vec::new();
        let mut values = Vec::new();
        let mut file = None;
        for entry in state
            .pending
            .values()
            .filter(|entry| !state.in_flight.contains(&entry.seq))
        {
            match &entry.content {
                CacheContent::Raw { .. } => {
                    if seqs.is_empty() {
                        seqs.push(entry.seq);
                        file = Some(entry.content.clone());
                    }
                    break;
                }
                CacheContent::TimeValues { values: batch } => {
                    seqs.push(entry.seq);
                    values.extend(batch.iter().cloned());
                    if seqs.len() >= self.settings.max_send_count.max(1) {
                        break;
                    }
                }
            }
        }
        if seqs.is_empty() {
            return None;
        }
        state.in_flight.extend(seqs.iter().copied());
        let transaction = match file {
            Some(content) => Transaction {
                seqs,
                content,
                value_count: 0,
                file_count: 1,
            },
            None => Transaction {
                seqs,
                value_count: values.len(),
                content: CacheContent::TimeValues { values },
                file_count: 0,
            },
        };
        Some(transaction)
    }

    /// 发送成功：删除条目，返回需要归档的文件。
    ///
    /// 持久化删除失败只记录日志，已确认的发送不回滚。
    pub(crate) async fn complete(&self, transaction: &Transaction) -> Vec<PathBuf> {
        let mut state = self.state.lock().await;
        if let Err(err) = self.store.remove_entries(&transaction.seqs).await {
            warn!(
                target: "fg.north",
                north_id = %self.north_id,
                error = %err,
                "cache_remove_failed"
            );
        }
        let mut files = Vec::new();
        for seq in &transaction.seqs {
            state.in_flight.remove(seq);
            if let Some(entry) = state.pending.remove(seq) {
                state.size_bytes = state.size_bytes.saturating_sub(entry.size_bytes);
                if let CacheContent::Raw { path } = entry.content {
                    files.push(path);
                }
            }
        }
        self.sync_metrics(&state);
        files
    }

    /// 永久失败：条目转入 errored，文件移入 `files-errors/`。
    ///
    /// 持久化失败不中断处理：每个条目都离开在途状态，返回第一个错误。
    pub(crate) async fn fail(&self, transaction: &Transaction) -> Result<(), NorthError> {
        let mut state = self.state.lock().await;
        for seq in &transaction.seqs {
            state.in_flight.remove(seq);
        }
        let mut first_error = None;
        for seq in &transaction.seqs {
            let Some(mut entry) = state.pending.remove(seq) else {
                continue;
            };
            if let CacheContent::Raw { path } = &entry.content {
                match move_into(path, &self.folders.errors).await {
                    Ok(moved) => entry.content = CacheContent::Raw { path: moved },
                    Err(err) => warn!(
                        target: "fg.north",
                        north_id = %self.north_id,
                        file = %path.display(),
                        error = %err,
                        "error_file_move_failed"
                    ),
                }
            }
            if let Err(err) = self.store.update_entry(&entry, EntryState::Errored).await {
                warn!(
                    target: "fg.north",
                    north_id = %self.north_id,
                    seq = entry.seq,
                    error = %err,
                    "cache_error_state_failed"
                );
                first_error.get_or_insert(err);
            }
            state.errored.insert(entry.seq, entry);
        }
        self.sync_metrics(&state);
        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// 放弃在途标记（停止时），条目保留在缓存中。
    pub(crate) async fn release(&self, transaction: &Transaction) {
        let mut state = self.state.lock().await;
        for seq in &transaction.seqs {
            state.in_flight.remove(seq);
        }
    }

    pub async fn list_pending(&self) -> Vec<CacheEntry> {
        self.state.lock().await.pending.values().cloned().collect()
    }

    pub async fn list_errored(&self) -> Vec<CacheEntry> {
        self.state.lock().await.errored.values().cloned().collect()
    }

    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    pub async fn size_bytes(&self) -> u64 {
        self.state.lock().await.size_bytes
    }

    /// 将永久失败条目放回待发送队列（`seqs` 为 None 时全部）；按原 seq 排序。
    pub async fn retry_errored(&self, seqs: Option<&[u64]>) -> Result<usize, NorthError> {
        let mut state = self.state.lock().await;
        let selected: Vec<u64> = select_seqs(&state.errored, seqs);
        for seq in &selected {
            let Some(mut entry) = state.errored.remove(seq) else {
                continue;
            };
            if let CacheContent::Raw { path } = &entry.content {
                let moved = move_into(path, &self.folders.files).await?;
                entry.content = CacheContent::Raw { path: moved };
            }
            self.store.update_entry(&entry, EntryState::Pending).await?;
            state.pending.insert(entry.seq, entry);
        }
        self.sync_metrics(&state);
        drop(state);
        if !selected.is_empty() {
            self.notify.notify_one();
        }
        info!(
            target: "fg.north",
            north_id = %self.north_id,
            entries = selected.len(),
            "errored_entries_retried"
        );
        Ok(selected.len())
    }

    /// 删除永久失败条目（`seqs` 为 None 时全部）及其文件。
    pub async fn remove_errored(&self, seqs: Option<&[u64]>) -> Result<usize, NorthError> {
        let mut state = self.state.lock().await;
        let selected: Vec<u64> = select_seqs(&state.errored, seqs);
        self.store.remove_entries(&selected).await?;
        for seq in &selected {
            if let Some(entry) = state.errored.remove(seq) {
                state.size_bytes = state.size_bytes.saturating_sub(entry.size_bytes);
                if let CacheContent::Raw { path } = &entry.content {
                    remove_file_logged(&self.north_id, path).await;
                }
            }
        }
        self.sync_metrics(&state);
        info!(
            target: "fg.north",
            north_id = %self.north_id,
            entries = selected.len(),
            "errored_entries_removed"
        );
        Ok(selected.len())
    }

    /// 删除待发送条目；在途条目跳过。
    pub async fn remove_pending(&self, seqs: &[u64]) -> Result<usize, NorthError> {
        let mut state = self.state.lock().await;
        let selected: Vec<u64> = seqs
            .iter()
            .copied()
            .filter(|seq| state.pending.contains_key(seq) && !state.in_flight.contains(seq))
            .collect();
        self.store.remove_entries(&selected).await?;
        for seq in &selected {
            if let Some(entry) = state.pending.remove(seq) {
                state.size_bytes = state.size_bytes.saturating_sub(entry.size_bytes);
                if let CacheContent::Raw { path } = &entry.content {
                    remove_file_logged(&self.north_id, path).await;
                }
            }
        }
        self.sync_metrics(&state);
        Ok(selected.len())
    }
}

fn select_seqs(entries: &BTreeMap<u64, CacheEntry>, seqs: Option<&[u64]>) -> Vec<u64> {
    match seqs {
        Some(seqs) => seqs
            .iter()
            .copied()
            .filter(|seq| entries.contains_key(seq))
            .collect(),
        None => entries.keys().copied().collect(),
    }
}

/// 将文件移动到目标目录（保留文件名），返回新路径。
pub(crate) async fn move_into(path: &Path, folder: &Path) -> Result<PathBuf, NorthError> {
    let name = path
        .file_name()
        .ok_or_else(|| NorthError::Io(format!("invalid file path: {}", path.display())))?;
    let target = folder.join(name);
    tokio::fs::rename(path, &target).await?;
    Ok(target)
}

pub(crate) async fn remove_file_logged(north_id: &str, path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        warn!(
            target: "fg.north",
            north_id = %north_id,
            file = %path.display(),
            error = %err,
            "cache_file_remove_failed"
        );
    }
}
