//! 发送循环：分组、发送、重试状态机。
//!
//! 同一时刻最多一个 Transaction 在途；重试期间该 Transaction 不与新到达条目合并。

use crate::archive::ArchiveManager;
use crate::buffer::{ContentBuffer, Transaction};
use crate::connector::NorthConnector;
use crate::error::NorthError;
use domain::now_epoch_ms;
use fg_config::CachingSettings;
use fg_telemetry::NorthMetrics;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Notify, watch};
use tracing::{debug, error, info, warn};

pub(crate) struct DispatchLoop {
    pub(crate) north_id: String,
    pub(crate) settings: CachingSettings,
    pub(crate) buffer: Arc<ContentBuffer>,
    pub(crate) connector: Arc<dyn NorthConnector>,
    pub(crate) archive: Arc<ArchiveManager>,
    pub(crate) metrics: Arc<NorthMetrics>,
    pub(crate) force_retry: Arc<Notify>,
}

enum Outcome {
    Sent,
    Failed,
    Stopped,
}

impl DispatchLoop {
    pub(crate) async fn run(self, mut stop: watch::Receiver<bool>) {
        info!(target: "fg.north", north_id = %self.north_id, "dispatch_loop_started");
        loop {
            if *stop.borrow() {
                break;
            }
            let (ready, oldest) = self.buffer.backlog().await;
            if ready >= self.settings.group_count {
                if let Outcome::Stopped = self.dispatch(&mut stop).await {
                    break;
                }
                continue;
            }
            match oldest {
                Some(created_at_ms) => {
                    let due_ms = created_at_ms + self.settings.send_interval_ms as i64;
                    let wait_ms = due_ms - now_epoch_ms();
                    if wait_ms <= 0 {
                        if let Outcome::Stopped = self.dispatch(&mut stop).await {
                            break;
                        }
                        continue;
                    }
                    tokio::select! {
                        _ = self.buffer.notified() => {}
                        _ = tokio::time::sleep(Duration::from_millis(wait_ms as u64)) => {}
                        changed = stop.changed() => if changed.is_err() { break; },
                    }
                }
                None => {
                    tokio::select! {
                        _ = self.buffer.notified() => {}
                        changed = stop.changed() => if changed.is_err() { break; },
                    }
                }
            }
        }
        info!(target: "fg.north", north_id = %self.north_id, "dispatch_loop_stopped");
    }

    async fn dispatch(&self, stop: &mut watch::Receiver<bool>) -> Outcome {
        let Some(transaction) = self.buffer.take_transaction().await else {
            return Outcome::Sent;
        };
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let start_ms = now_epoch_ms();
            let started = Instant::now();
            match self.send(&transaction).await {
                Ok(()) => {
                    let duration_ms = started.elapsed().as_millis() as u64;
                    for path in self.buffer.complete(&transaction).await {
                        self.archive.archive_or_remove(&path).await;
                    }
                    self.metrics.record_send_success(
                        start_ms,
                        duration_ms,
                        transaction.value_count,
                        transaction.file_count,
                    );
                    debug!(
                        target: "fg.north",
                        north_id = %self.north_id,
                        entries = transaction.seqs.len(),
                        values = transaction.value_count,
                        files = transaction.file_count,
                        attempt,
                        duration_ms,
                        "transaction_sent"
                    );
                    return Outcome::Sent;
                }
                Err(err) => {
                    self.metrics.record_send_error();
                    if !self.should_retry(&err, attempt) {
                        error!(
                            target: "fg.north",
                            north_id = %self.north_id,
                            entries = transaction.seqs.len(),
                            attempt,
                            error = %err,
                            "transaction_failed_permanently"
                        );
                        if let Err(store_err) = self.buffer.fail(&transaction).await {
                            warn!(
                                target: "fg.north",
                                north_id = %self.north_id,
                                error = %store_err,
                                "errored_state_persist_failed"
                            );
                        }
                        self.metrics.reset_attempts();
                        return Outcome::Failed;
                    }
                    warn!(
                        target: "fg.north",
                        north_id = %self.north_id,
                        entries = transaction.seqs.len(),
                        attempt,
                        retry_in_ms = self.settings.retry_interval_ms,
                        error = %err,
                        "transaction_send_failed"
                    );
                    if *stop.borrow() {
                        self.buffer.release(&transaction).await;
                        return Outcome::Stopped;
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_millis(self.settings.retry_interval_ms)) => {}
                        _ = self.force_retry.notified() => {
                            info!(target: "fg.north", north_id = %self.north_id, "transaction_retry_forced");
                        }
                        _ = stop.changed() => {
                            self.buffer.release(&transaction).await;
                            return Outcome::Stopped;
                        }
                    }
                }
            }
        }
    }

    async fn send(&self, transaction: &Transaction) -> Result<(), NorthError> {
        let timeout = Duration::from_millis(self.settings.timeout_ms);
        match tokio::time::timeout(timeout, self.connector.handle_content(&transaction.content)).await
        {
            Ok(result) => result,
            Err(_) => Err(NorthError::Timeout(self.settings.timeout_ms)),
        }
    }

    /// 传输失败无限重试；应用失败由连接器分类，并受 `retry_count` 限制（0 为不限）。
    fn should_retry(&self, err: &NorthError, attempt: u32) -> bool {
        if err.is_transport() {
            return true;
        }
        if !self.connector.should_retry(err) {
            return false;
        }
        let retry_count = self.settings.retry_count;
        retry_count == 0 || attempt <= retry_count
    }
}
