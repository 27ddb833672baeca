//! 单个北向连接器的运行实例：缓存、发送循环、归档清理与缓存管理接口。

use crate::archive::{ArchiveManager, ArchivedFile};
use crate::buffer::{CacheFolders, ContentBuffer};
use crate::connector::NorthConnector;
use crate::dispatch::DispatchLoop;
use crate::error::NorthError;
use domain::{CacheEntry, TimeValue};
use fg_config::{NorthConnectorConfig, Subscriptions};
use fg_storage::{CacheStore, SqliteCacheStore};
use fg_telemetry::{NorthMetrics, NorthMetricsSnapshot};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// 归档重新入缓存时使用的来源标识。
const ARCHIVE_SOURCE: &str = "archive";

struct RunningTasks {
    stop: watch::Sender<bool>,
    dispatch: JoinHandle<()>,
    sweeper: JoinHandle<()>,
}

pub struct NorthRuntime {
    id: String,
    name: String,
    subscriptions: Subscriptions,
    connector: Arc<dyn NorthConnector>,
    buffer: Arc<ContentBuffer>,
    archive: Arc<ArchiveManager>,
    metrics: Arc<NorthMetrics>,
    settings: fg_config::CachingSettings,
    force_retry: Arc<Notify>,
    sweep_interval: Duration,
    tasks: Mutex<Option<RunningTasks>>,
}

impl NorthRuntime {
    /// 以指定存储打开运行实例；`base_folder` 下建立 files/、files-errors/、archive/。
    pub async fn open(
        config: &NorthConnectorConfig,
        connector: Arc<dyn NorthConnector>,
        base_folder: &Path,
        store: Arc<dyn CacheStore>,
        sweep_interval: Duration,
    ) -> Result<Self, NorthError> {
        config.validate()?;
        let folders = CacheFolders::new(base_folder);
        let metrics = Arc::new(NorthMetrics::new());
        let buffer = ContentBuffer::open(
            &config.id,
            config.caching.clone(),
            store,
            folders.clone(),
            metrics.clone(),
        )
        .await?;
        let archive = ArchiveManager::new(
            &config.id,
            folders.archive.clone(),
            config.caching.archive.clone(),
        );
        Ok(Self {
            id: config.id.clone(),
            name: config.name.clone(),
            subscriptions: config.subscriptions.clone(),
            connector,
            buffer: Arc::new(buffer),
            archive: Arc::new(archive),
            metrics,
            settings: config.caching.clone(),
            force_retry: Arc::new(Notify::new()),
            sweep_interval,
            tasks: Mutex::new(None),
        })
    }

    /// 使用 `<data>/north-<id>/cache.db` 打开运行实例。
    pub async fn open_in(
        config: &NorthConnectorConfig,
        connector: Arc<dyn NorthConnector>,
        data_folder: &Path,
        sweep_interval: Duration,
    ) -> Result<Self, NorthError> {
        let base = data_folder.join(format!("north-{}", config.id));
        let store = SqliteCacheStore::open(&base.join("cache.db")).await?;
        Self::open(config, connector, &base, Arc::new(store), sweep_interval).await
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_subscribed(&self, south_id: &str) -> bool {
        self.subscriptions.includes(south_id)
    }

    pub fn metrics(&self) -> NorthMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn buffer(&self) -> &ContentBuffer {
        &self.buffer
    }

    pub async fn is_running(&self) -> bool {
        self.tasks.lock().await.is_some()
    }

    /// 连接目的端并启动发送循环；连接失败只告警，由发送重试兜底。
    pub async fn start(&self) -> Result<(), NorthError> {
        let mut tasks = self.tasks.lock().await;
        if tasks.is_some() {
            return Ok(());
        }
        if let Err(err) = self.connector.connect().await {
            warn!(
                target: "fg.north",
                north_id = %self.id,
                error = %err,
                "north_connect_failed"
            );
        }
        let (stop, stop_rx) = watch::channel(false);
        let dispatch = DispatchLoop {
            north_id: self.id.clone(),
            settings: self.settings.clone(),
            buffer: self.buffer.clone(),
            connector: self.connector.clone(),
            archive: self.archive.clone(),
            metrics: self.metrics.clone(),
            force_retry: self.force_retry.clone(),
        };
        let dispatch = tokio::spawn(dispatch.run(stop_rx.clone()));
        let sweeper = self
            .archive
            .clone()
            .spawn_sweeper(self.sweep_interval, stop_rx);
        *tasks = Some(RunningTasks {
            stop,
            dispatch,
            sweeper,
        });
        info!(target: "fg.north", north_id = %self.id, name = %self.name, "north_started");
        Ok(())
    }

    /// 等待在途发送结束后停止，再断开连接。未发送条目保留在缓存中。
    pub async fn stop(&self) -> Result<(), NorthError> {
        let Some(running) = self.tasks.lock().await.take() else {
            return Ok(());
        };
        let _ = running.stop.send(true);
        if let Err(err) = running.dispatch.await {
            warn!(target: "fg.north", north_id = %self.id, error = %err, "dispatch_join_failed");
        }
        if let Err(err) = running.sweeper.await {
            warn!(target: "fg.north", north_id = %self.id, error = %err, "sweeper_join_failed");
        }
        if let Err(err) = self.connector.disconnect().await {
            warn!(
                target: "fg.north",
                north_id = %self.id,
                error = %err,
                "north_disconnect_failed"
            );
        }
        info!(target: "fg.north", north_id = %self.id, "north_stopped");
        Ok(())
    }

    pub async fn add_values(&self, source_id: &str, values: Vec<TimeValue>) -> Result<(), NorthError> {
        self.buffer.add_values(source_id, values).await
    }

    pub async fn add_file(&self, source_id: &str, path: &Path) -> Result<(), NorthError> {
        self.buffer.add_file(source_id, path).await.map(|_| ())
    }

    /// 立即重试在途 Transaction，跳过剩余的重试等待。
    pub fn force_retry(&self) {
        self.force_retry.notify_waiters();
    }

    pub async fn list_pending(&self) -> Vec<CacheEntry> {
        self.buffer.list_pending().await
    }

    pub async fn list_errored(&self) -> Vec<CacheEntry> {
        self.buffer.list_errored().await
    }

    pub async fn retry_errored(&self, seqs: Option<&[u64]>) -> Result<usize, NorthError> {
        self.buffer.retry_errored(seqs).await
    }

    pub async fn remove_errored(&self, seqs: Option<&[u64]>) -> Result<usize, NorthError> {
        self.buffer.remove_errored(seqs).await
    }

    pub async fn remove_pending(&self, seqs: &[u64]) -> Result<usize, NorthError> {
        self.buffer.remove_pending(seqs).await
    }

    pub async fn list_archive(&self) -> Result<Vec<ArchivedFile>, NorthError> {
        self.archive.list_archive().await
    }

    pub async fn remove_archived(&self, names: &[String]) -> Result<usize, NorthError> {
        self.archive.remove_archived(names).await
    }

    /// 将归档文件重新放入缓存待发送，成功后删除归档副本。
    pub async fn retry_archived(&self, names: &[String]) -> Result<usize, NorthError> {
        let mut retried = 0;
        for name in names {
            let path = self.archive.archived_path(name)?;
            if !tokio::fs::try_exists(&path).await? {
                continue;
            }
            if !self.buffer.add_file(ARCHIVE_SOURCE, &path).await? {
                break;
            }
            tokio::fs::remove_file(&path).await?;
            retried += 1;
        }
        info!(
            target: "fg.north",
            north_id = %self.id,
            files = retried,
            "archived_files_retried"
        );
        Ok(retried)
    }

    /// 立即执行一次归档清理。
    pub async fn sweep_archive(&self) -> usize {
        self.archive.sweep().await
    }
}
