//! 历史查询处理：按断点切分区间、顺序执行、逐段持久化断点。

use crate::error::SouthError;
use crate::interval::split_interval;
use crate::scheduler::SchedulerInner;
use domain::{HistoryCheckpoint, Interval, SouthItem, now_epoch_ms};
use std::time::Duration;
use tracing::{debug, info};

/// 从未执行过的扫描模式默认回溯 1 小时。
const DEFAULT_LOOKBACK_MS: i64 = 3_600_000;

/// 未按采集项区分断点时使用的键。
const ALL_ITEMS: &str = "all";

impl SchedulerInner {
    /// `range` 为 None 时查询 `[断点, now]`，否则查询固定区间；
    /// 断点位于区间内时从断点续读。
    pub(crate) async fn history_query_handler(
        &self,
        items: &[SouthItem],
        scan_mode_id: &str,
        range: Option<Interval>,
    ) -> Result<(), SouthError> {
        if self.history.max_instant_per_item {
            for (index, item) in items.iter().enumerate() {
                if self.is_stopping() {
                    break;
                }
                if index > 0 {
                    self.read_delay().await;
                }
                self.query_group(std::slice::from_ref(item), scan_mode_id, &item.id, range)
                    .await?;
            }
            Ok(())
        } else {
            self.query_group(items, scan_mode_id, ALL_ITEMS, range).await
        }
    }

    async fn read_delay(&self) {
        if self.history.read_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.history.read_delay_ms)).await;
        }
    }

    async fn query_group(
        &self,
        items: &[SouthItem],
        scan_mode_id: &str,
        checkpoint_key: &str,
        range: Option<Interval>,
    ) -> Result<(), SouthError> {
        let checkpoint = self
            .checkpoints
            .get_checkpoint(scan_mode_id, checkpoint_key)
            .await?;
        let previous = checkpoint.as_ref().map(|c| c.max_instant_ms);
        let (start_ms, end_ms) = match range {
            // 断点落在本区间内才续读；其他区间的断点不影响本次查询
            Some(range) => (
                previous
                    .filter(|instant| *instant > range.start_ms && *instant <= range.end_ms)
                    .unwrap_or(range.start_ms),
                range.end_ms,
            ),
            None => {
                let now = now_epoch_ms();
                (previous.unwrap_or(now - DEFAULT_LOOKBACK_MS), now)
            }
        };
        if start_ms >= end_ms {
            debug!(
                target: "fg.south",
                south_id = %self.south_id,
                scan_mode = %scan_mode_id,
                item = %checkpoint_key,
                "history_query_up_to_date"
            );
            return Ok(());
        }

        let mut max_instant = start_ms;
        let intervals = split_interval(start_ms, end_ms, self.history.max_read_interval_seconds);
        for (index, interval) in intervals.enumerate() {
            if index > 0 {
                if self.is_stopping() {
                    info!(
                        target: "fg.south",
                        south_id = %self.south_id,
                        scan_mode = %scan_mode_id,
                        resume_from_ms = max_instant,
                        "history_query_interrupted"
                    );
                    break;
                }
                self.read_delay().await;
            }
            debug!(
                target: "fg.south",
                south_id = %self.south_id,
                scan_mode = %scan_mode_id,
                item = %checkpoint_key,
                start_ms = interval.start_ms,
                end_ms = interval.end_ms,
                "history_query_interval"
            );
            let retrieved = self
                .connector
                .history_query(items, interval.start_ms, interval.end_ms, &self.sink)
                .await?;
            max_instant = max_instant.max(retrieved.unwrap_or(interval.end_ms));
            // 下一段开始前落盘
            self.checkpoints
                .upsert_checkpoint(&HistoryCheckpoint {
                    scan_mode_id: scan_mode_id.to_string(),
                    item_id: checkpoint_key.to_string(),
                    max_instant_ms: max_instant,
                    interval_index: index as u32,
                })
                .await?;
        }
        Ok(())
    }
}
