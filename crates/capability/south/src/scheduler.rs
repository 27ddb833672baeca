//! 采集调度器（每个南向连接器一个实例）。
//!
//! 状态机：`Stopped → Connecting → Running → Stopping → Stopped`。
//! 触发器命中只做入队；单个消费任务按 FIFO 取任务，持有 RunToken 执行 run，
//! 执行期间任务保留在队首，执行结束后出队。

use crate::connector::{ContentSink, ScanModeSource, SouthConnector, SouthSink};
use crate::error::SouthError;
use crate::trigger::{TriggerCallback, TriggerSet, validate_cron};
use domain::{HISTORY_SCAN_MODE, Interval, SUBSCRIPTION_SCAN_MODE, ScanMode, SouthItem, now_epoch_ms};
use fg_config::{HistorySettings, SouthConnectorConfig};
use fg_storage::CheckpointStore;
use fg_telemetry::SouthMetrics;
use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, MutexGuard, PoisonError, Weak};
use std::time::Instant;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 调度器生命周期状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Connecting,
    Running,
    Stopping,
}

impl SchedulerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerState::Stopped => "stopped",
            SchedulerState::Connecting => "connecting",
            SchedulerState::Running => "running",
            SchedulerState::Stopping => "stopping",
        }
    }
}

pub(crate) struct SchedulerInner {
    pub(crate) south_id: String,
    pub(crate) history: HistorySettings,
    pub(crate) connector: Arc<dyn SouthConnector>,
    scan_modes: Arc<dyn ScanModeSource>,
    pub(crate) checkpoints: Arc<dyn CheckpointStore>,
    pub(crate) sink: SouthSink,
    pub(crate) metrics: Arc<SouthMetrics>,
    state: Mutex<SchedulerState>,
    items: Mutex<Vec<SouthItem>>,
    // 仅在同步临界区内访问，触发回调可直接入队。
    queue: std::sync::Mutex<VecDeque<ScanMode>>,
    notify: Notify,
    run_token: Mutex<()>,
    stopping: AtomicBool,
    triggers: Mutex<TriggerSet>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// 采集调度器。
#[derive(Clone)]
pub struct AcquisitionScheduler {
    inner: Arc<SchedulerInner>,
}

impl AcquisitionScheduler {
    pub fn new(
        config: &SouthConnectorConfig,
        connector: Arc<dyn SouthConnector>,
        scan_modes: Arc<dyn ScanModeSource>,
        checkpoints: Arc<dyn CheckpointStore>,
        output: Arc<dyn ContentSink>,
    ) -> Self {
        let metrics = Arc::new(SouthMetrics::new());
        let sink = SouthSink::new(&config.id, output, metrics.clone());
        Self {
            inner: Arc::new(SchedulerInner {
                south_id: config.id.clone(),
                history: config.history.clone(),
                connector,
                scan_modes,
                checkpoints,
                sink,
                metrics,
                state: Mutex::new(SchedulerState::Stopped),
                items: Mutex::new(config.items.clone()),
                queue: std::sync::Mutex::new(VecDeque::new()),
                notify: Notify::new(),
                run_token: Mutex::new(()),
                stopping: AtomicBool::new(true),
                triggers: Mutex::new(TriggerSet::default()),
                worker: Mutex::new(None),
            }),
        }
    }

    pub fn south_id(&self) -> &str {
        &self.inner.south_id
    }

    pub fn metrics(&self) -> Arc<SouthMetrics> {
        self.inner.metrics.clone()
    }

    pub async fn state(&self) -> SchedulerState {
        *self.inner.state.lock().await
    }

    pub async fn items(&self) -> Vec<SouthItem> {
        self.inner.items.lock().await.clone()
    }

    /// 当前排队任务数（包含正在执行的任务）。
    pub fn queue_len(&self) -> usize {
        self.inner.lock_queue().len()
    }

    /// 连接数据源、注册触发器与订阅。
    ///
    /// 扫描模式缺失或 cron 非法时返回配置错误，连接器不启动。
    pub async fn start(&self) -> Result<(), SouthError> {
        {
            let mut state = self.inner.state.lock().await;
            if *state != SchedulerState::Stopped {
                return Ok(());
            }
            *state = SchedulerState::Connecting;
        }
        match self.inner.start_inner().await {
            Ok(()) => {
                *self.inner.state.lock().await = SchedulerState::Running;
                info!(target: "fg.south", south_id = %self.inner.south_id, "south_started");
                Ok(())
            }
            Err(err) => {
                self.inner.shutdown().await;
                *self.inner.state.lock().await = SchedulerState::Stopped;
                warn!(
                    target: "fg.south",
                    south_id = %self.inner.south_id,
                    error = %err,
                    "south_start_failed"
                );
                Err(err)
            }
        }
    }

    /// 停止：等待正在执行的 run 完成（不中断 I/O），清理触发器与队列，最后断开连接。
    pub async fn stop(&self) {
        {
            let mut state = self.inner.state.lock().await;
            if *state == SchedulerState::Stopped {
                return;
            }
            *state = SchedulerState::Stopping;
        }
        self.inner.shutdown().await;
        *self.inner.state.lock().await = SchedulerState::Stopped;
        info!(target: "fg.south", south_id = %self.inner.south_id, "south_stopped");
    }

    /// 入队一个扫描任务；同一扫描模式已在队列中时丢弃本次触发。
    pub fn enqueue(&self, scan_mode: ScanMode) -> bool {
        self.inner.enqueue(scan_mode)
    }

    /// 在 RunToken 保护下对固定区间执行历史查询（断点记在保留扫描模式 `history` 下）。
    pub async fn run_history(&self, start_ms: i64, end_ms: i64) -> Result<(), SouthError> {
        if self.state().await != SchedulerState::Running {
            return Err(SouthError::Connection("connector not running".to_string()));
        }
        if !self.inner.connector.capabilities().has_history() {
            return Err(SouthError::Unsupported("history_query"));
        }
        let _token = self.inner.run_token.lock().await;
        let items: Vec<SouthItem> = self
            .inner
            .items
            .lock()
            .await
            .iter()
            .filter(|item| item.enabled && item.scan_mode_id != SUBSCRIPTION_SCAN_MODE)
            .cloned()
            .collect();
        info!(
            target: "fg.south",
            south_id = %self.inner.south_id,
            start_ms,
            end_ms,
            items = items.len(),
            "history_job_started"
        );
        let started_ms = now_epoch_ms();
        let started = Instant::now();
        let result = self
            .inner
            .history_query_handler(&items, HISTORY_SCAN_MODE, Some(Interval::new(start_ms, end_ms)))
            .await;
        self.inner
            .metrics
            .record_run(started_ms, started.elapsed().as_millis() as u64);
        if result.is_err() {
            self.inner.metrics.record_read_error();
        }
        result
    }

    /// 新增采集项（同 ID 存在时覆盖）。
    pub async fn add_item(&self, item: SouthItem) -> Result<(), SouthError> {
        self.update_item(item).await
    }

    /// 更新采集项；扫描模式变化时同步增减触发器。
    pub async fn update_item(&self, item: SouthItem) -> Result<(), SouthError> {
        let subscribed = item.enabled && item.scan_mode_id == SUBSCRIPTION_SCAN_MODE;
        let is_new = {
            let mut items = self.inner.items.lock().await;
            match items.iter_mut().find(|existing| existing.id == item.id) {
                Some(existing) => {
                    *existing = item.clone();
                    false
                }
                None => {
                    items.push(item.clone());
                    true
                }
            }
        };
        self.inner.refresh_triggers().await?;
        if subscribed && is_new && self.state().await == SchedulerState::Running {
            self.inner.subscribe(std::slice::from_ref(&item)).await?;
        }
        Ok(())
    }

    pub async fn remove_item(&self, item_id: &str) -> Result<(), SouthError> {
        self.inner
            .items
            .lock()
            .await
            .retain(|item| item.id != item_id);
        self.inner.refresh_triggers().await
    }

    pub async fn remove_all_items(&self) -> Result<(), SouthError> {
        self.inner.items.lock().await.clear();
        self.inner.refresh_triggers().await
    }
}

impl SchedulerInner {
    fn lock_queue(&self) -> MutexGuard<'_, VecDeque<ScanMode>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    fn enqueue(&self, scan_mode: ScanMode) -> bool {
        if self.is_stopping() {
            return false;
        }
        let mut queue = self.lock_queue();
        if queue.iter().any(|queued| queued.id == scan_mode.id) {
            self.metrics.record_dropped_trigger();
            warn!(
                target: "fg.south",
                south_id = %self.south_id,
                scan_mode = %scan_mode.name,
                "scan_job_dropped"
            );
            return false;
        }
        queue.push_back(scan_mode);
        self.metrics.set_queue_depth(queue.len());
        drop(queue);
        self.notify.notify_one();
        true
    }

    fn finish_job(&self, scan_mode_id: &str) {
        let mut queue = self.lock_queue();
        if let Some(position) = queue.iter().position(|queued| queued.id == scan_mode_id) {
            queue.remove(position);
        }
        self.metrics.set_queue_depth(queue.len());
    }

    fn trigger_callback(self: &Arc<Self>) -> TriggerCallback {
        let weak: Weak<SchedulerInner> = Arc::downgrade(self);
        Arc::new(move |scan_mode| {
            if let Some(inner) = weak.upgrade() {
                inner.enqueue(scan_mode);
            }
        })
    }

    /// 当前启用采集项引用的定时扫描模式（去重、有序）。
    async fn active_scan_mode_ids(&self) -> BTreeSet<String> {
        self.items
            .lock()
            .await
            .iter()
            .filter(|item| item.enabled && item.scan_mode_id != SUBSCRIPTION_SCAN_MODE)
            .map(|item| item.scan_mode_id.clone())
            .collect()
    }

    fn resolve_scan_mode(&self, id: &str) -> Result<ScanMode, SouthError> {
        let scan_mode = self
            .scan_modes
            .get_scan_mode(id)
            .ok_or_else(|| SouthError::ScanModeNotFound(id.to_string()))?;
        validate_cron(&scan_mode)?;
        Ok(scan_mode)
    }

    async fn start_inner(self: &Arc<Self>) -> Result<(), SouthError> {
        let scan_modes = self
            .active_scan_mode_ids()
            .await
            .iter()
            .map(|id| self.resolve_scan_mode(id))
            .collect::<Result<Vec<_>, _>>()?;

        self.connector.connect().await?;
        self.metrics.record_connection(now_epoch_ms());
        self.stopping.store(false, Ordering::SeqCst);

        let worker = tokio::spawn(run_loop(self.clone()));
        *self.worker.lock().await = Some(worker);

        {
            let mut triggers = self.triggers.lock().await;
            for scan_mode in scan_modes {
                triggers.add(scan_mode, self.trigger_callback()).await?;
            }
        }

        let subscribed: Vec<SouthItem> = self
            .items
            .lock()
            .await
            .iter()
            .filter(|item| item.enabled && item.scan_mode_id == SUBSCRIPTION_SCAN_MODE)
            .cloned()
            .collect();
        if !subscribed.is_empty() {
            self.subscribe(&subscribed).await?;
        }
        Ok(())
    }

    async fn subscribe(&self, items: &[SouthItem]) -> Result<(), SouthError> {
        if !self.connector.capabilities().subscription {
            warn!(
                target: "fg.south",
                south_id = %self.south_id,
                items = items.len(),
                "subscription_not_supported"
            );
            return Ok(());
        }
        self.connector.subscribe(items, self.sink.clone()).await?;
        debug!(
            target: "fg.south",
            south_id = %self.south_id,
            items = items.len(),
            "subscription_registered"
        );
        Ok(())
    }

    /// 按当前采集项增减触发器；扫描模式失去全部采集项时同时清除其断点。
    async fn refresh_triggers(self: &Arc<Self>) -> Result<(), SouthError> {
        if *self.state.lock().await != SchedulerState::Running {
            return Ok(());
        }
        let required = self.active_scan_mode_ids().await;
        let mut triggers = self.triggers.lock().await;
        for id in triggers.scan_mode_ids() {
            if !required.contains(&id) {
                triggers.remove(&id).await;
                self.checkpoints.remove_scan_mode(&id).await?;
                debug!(target: "fg.south", south_id = %self.south_id, scan_mode = %id, "scan_trigger_removed");
            }
        }
        for id in required {
            if !triggers.contains(&id) {
                let scan_mode = self.resolve_scan_mode(&id)?;
                triggers.add(scan_mode, self.trigger_callback()).await?;
            }
        }
        Ok(())
    }

    /// 停止流程，也用于启动失败后的清理。
    async fn shutdown(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.notify.notify_one();
        {
            // 等待在途 run 结束
            let _token = self.run_token.lock().await;
            self.triggers.lock().await.clear().await;
            self.lock_queue().clear();
            self.metrics.set_queue_depth(0);
        }
        if let Some(worker) = self.worker.lock().await.take() {
            if let Err(err) = worker.await {
                warn!(target: "fg.south", south_id = %self.south_id, error = %err, "scan_worker_join_failed");
            }
        }
        if let Err(err) = self.connector.disconnect().await {
            warn!(target: "fg.south", south_id = %self.south_id, error = %err, "south_disconnect_failed");
        }
    }

    /// 执行一次定时扫描：历史查询 → 文件查询 → 最新值查询，各自独立捕获错误。
    pub(crate) async fn run_scan(&self, scan_mode: &ScanMode) {
        let items: Vec<SouthItem> = self
            .items
            .lock()
            .await
            .iter()
            .filter(|item| item.enabled && item.scan_mode_id == scan_mode.id)
            .cloned()
            .collect();
        if items.is_empty() {
            debug!(
                target: "fg.south",
                south_id = %self.south_id,
                scan_mode = %scan_mode.name,
                "scan_job_no_items"
            );
            return;
        }
        let started_ms = now_epoch_ms();
        let started = Instant::now();
        let capabilities = self.connector.capabilities();

        if capabilities.has_history() {
            if let Err(err) = self.history_query_handler(&items, &scan_mode.id, None).await {
                self.read_failed(scan_mode, "history_query", &err);
            }
        }
        if capabilities.last_file {
            if let Err(err) = self.connector.file_query(&items, &self.sink).await {
                self.read_failed(scan_mode, "file_query", &err);
            }
        }
        if capabilities.last_point {
            if let Err(err) = self.connector.last_point_query(&items, &self.sink).await {
                self.read_failed(scan_mode, "last_point_query", &err);
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        self.metrics.record_run(started_ms, duration_ms);
        debug!(
            target: "fg.south",
            south_id = %self.south_id,
            scan_mode = %scan_mode.name,
            items = items.len(),
            duration_ms,
            "scan_job_finished"
        );
    }

    fn read_failed(&self, scan_mode: &ScanMode, operation: &str, err: &SouthError) {
        self.metrics.record_read_error();
        warn!(
            target: "fg.south",
            south_id = %self.south_id,
            scan_mode = %scan_mode.name,
            operation,
            error = %err,
            "scan_read_failed"
        );
    }
}

/// 单消费者循环：取队首任务，持有 RunToken 执行，完成后出队。
async fn run_loop(inner: Arc<SchedulerInner>) {
    loop {
        if inner.is_stopping() {
            break;
        }
        let next = inner.lock_queue().front().cloned();
        let Some(scan_mode) = next else {
            inner.notify.notified().await;
            continue;
        };
        {
            let _token = inner.run_token.lock().await;
            if inner.is_stopping() {
                break;
            }
            inner.run_scan(&scan_mode).await;
        }
        inner.finish_job(&scan_mode.id);
    }
    debug!(target: "fg.south", south_id = %inner.south_id, "scan_worker_exited");
}
