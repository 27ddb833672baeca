//! 扫描触发器：cron 表达式到周期回调的封装（tokio-cron-scheduler）。
//!
//! cron 为 6 段格式（含秒），例如 `*/5 * * * * *`。

use crate::error::SouthError;
use domain::ScanMode;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, warn};
use uuid::Uuid;

/// 触发回调：每次 cron 命中时以扫描模式调用。
pub type TriggerCallback = Arc<dyn Fn(ScanMode) + Send + Sync>;

fn cron_error(scan_mode: &ScanMode, err: impl std::fmt::Debug) -> SouthError {
    SouthError::InvalidCron {
        scan_mode: scan_mode.id.clone(),
        reason: format!("{:?}", err),
    }
}

fn build_job(scan_mode: &ScanMode, callback: TriggerCallback) -> Result<Job, SouthError> {
    if scan_mode.cron.trim().is_empty() {
        return Err(cron_error(scan_mode, "empty expression"));
    }
    let mode = scan_mode.clone();
    Job::new_async(scan_mode.cron.as_str(), move |_uuid, _scheduler| {
        let callback = callback.clone();
        let mode = mode.clone();
        Box::pin(async move {
            callback(mode);
        })
    })
    .map_err(|err| cron_error(scan_mode, err))
}

/// 校验扫描模式的 cron 表达式。
pub fn validate_cron(scan_mode: &ScanMode) -> Result<(), SouthError> {
    build_job(scan_mode, Arc::new(|_| {})).map(|_| ())
}

/// 单个扫描模式的触发器。
pub struct ScanTrigger {
    scan_mode: ScanMode,
    job_id: Uuid,
}

impl ScanTrigger {
    /// 在连接器的调度器上注册触发器。
    pub async fn start(
        scheduler: &JobScheduler,
        scan_mode: ScanMode,
        callback: TriggerCallback,
    ) -> Result<Self, SouthError> {
        let job = build_job(&scan_mode, callback)?;
        let job_id = scheduler
            .add(job)
            .await
            .map_err(|err| SouthError::Scheduler(format!("{:?}", err)))?;
        debug!(
            target: "fg.south",
            scan_mode = %scan_mode.id,
            cron = %scan_mode.cron,
            "scan_trigger_started"
        );
        Ok(Self { scan_mode, job_id })
    }

    pub fn scan_mode(&self) -> &ScanMode {
        &self.scan_mode
    }

    pub async fn stop(&self, scheduler: &JobScheduler) {
        if let Err(err) = scheduler.remove(&self.job_id).await {
            warn!(
                target: "fg.south",
                scan_mode = %self.scan_mode.id,
                error = ?err,
                "scan_trigger_stop_failed"
            );
        }
    }
}

/// 连接器级触发器集合（共享一个 `JobScheduler`）。
#[derive(Default)]
pub(crate) struct TriggerSet {
    scheduler: Option<JobScheduler>,
    triggers: HashMap<String, ScanTrigger>,
}

impl TriggerSet {
    pub(crate) fn contains(&self, scan_mode_id: &str) -> bool {
        self.triggers.contains_key(scan_mode_id)
    }

    pub(crate) fn scan_mode_ids(&self) -> Vec<String> {
        self.triggers.keys().cloned().collect()
    }

    pub(crate) async fn add(
        &mut self,
        scan_mode: ScanMode,
        callback: TriggerCallback,
    ) -> Result<(), SouthError> {
        if self.contains(&scan_mode.id) {
            return Ok(());
        }
        let scheduler = match &self.scheduler {
            Some(scheduler) => scheduler.clone(),
            None => {
                let scheduler = JobScheduler::new()
                    .await
                    .map_err(|err| SouthError::Scheduler(format!("{:?}", err)))?;
                scheduler
                    .start()
                    .await
                    .map_err(|err| SouthError::Scheduler(format!("{:?}", err)))?;
                self.scheduler = Some(scheduler.clone());
                scheduler
            }
        };
        let id = scan_mode.id.clone();
        let trigger = ScanTrigger::start(&scheduler, scan_mode, callback).await?;
        self.triggers.insert(id, trigger);
        Ok(())
    }

    pub(crate) async fn remove(&mut self, scan_mode_id: &str) {
        if let (Some(trigger), Some(scheduler)) =
            (self.triggers.remove(scan_mode_id), self.scheduler.as_ref())
        {
            trigger.stop(scheduler).await;
        }
    }

    /// 停止并清空全部触发器，关闭调度器。
    pub(crate) async fn clear(&mut self) {
        if let Some(scheduler) = self.scheduler.as_ref() {
            for trigger in self.triggers.values() {
                trigger.stop(scheduler).await;
            }
        }
        self.triggers.clear();
        if let Some(mut scheduler) = self.scheduler.take() {
            if let Err(err) = scheduler.shutdown().await {
                warn!(target: "fg.south", error = ?err, "scan_scheduler_shutdown_failed");
            }
        }
    }
}
