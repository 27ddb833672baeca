//! 追踪初始化、请求 ID 生成与连接器级指标。

use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

// 0 表示“尚未发生”。
fn optional_ts(value: &AtomicI64) -> Option<i64> {
    match value.load(Ordering::Relaxed) {
        0 => None,
        v => Some(v),
    }
}

fn optional_u64(value: &AtomicU64, guard: &AtomicU64) -> Option<u64> {
    if guard.load(Ordering::Relaxed) == 0 {
        None
    } else {
        Some(value.load(Ordering::Relaxed))
    }
}

/// 南向连接器指标快照。
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SouthMetricsSnapshot {
    pub last_connection_ms: Option<i64>,
    pub last_run_start_ms: Option<i64>,
    pub last_run_duration_ms: Option<u64>,
    pub queue_depth: u64,
    pub runs: u64,
    pub dropped_triggers: u64,
    pub read_errors: u64,
    pub values_added: u64,
    pub files_added: u64,
}

/// 南向连接器指标（每个连接器实例一份）。
#[derive(Debug, Default)]
pub struct SouthMetrics {
    last_connection_ms: AtomicI64,
    last_run_start_ms: AtomicI64,
    last_run_duration_ms: AtomicU64,
    queue_depth: AtomicU64,
    runs: AtomicU64,
    dropped_triggers: AtomicU64,
    read_errors: AtomicU64,
    values_added: AtomicU64,
    files_added: AtomicU64,
}

impl SouthMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SouthMetricsSnapshot {
        SouthMetricsSnapshot {
            last_connection_ms: optional_ts(&self.last_connection_ms),
            last_run_start_ms: optional_ts(&self.last_run_start_ms),
            last_run_duration_ms: optional_u64(&self.last_run_duration_ms, &self.runs),
            queue_depth: self.queue_depth.load(Ordering::Relaxed),
            runs: self.runs.load(Ordering::Relaxed),
            dropped_triggers: self.dropped_triggers.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            values_added: self.values_added.load(Ordering::Relaxed),
            files_added: self.files_added.load(Ordering::Relaxed),
        }
    }

    pub fn record_connection(&self, ts_ms: i64) {
        self.last_connection_ms.store(ts_ms, Ordering::Relaxed);
    }

    /// 记录一次 run 完成（起始时间与耗时）。
    pub fn record_run(&self, start_ms: i64, duration_ms: u64) {
        self.last_run_start_ms.store(start_ms, Ordering::Relaxed);
        self.last_run_duration_ms
            .store(duration_ms, Ordering::Relaxed);
        self.runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_queue_depth(&self, depth: usize) {
        self.queue_depth.store(depth as u64, Ordering::Relaxed);
    }

    /// 记录因去重被丢弃的触发。
    pub fn record_dropped_trigger(&self) {
        self.dropped_triggers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_values_added(&self, count: usize) {
        self.values_added.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_file_added(&self) {
        self.files_added.fetch_add(1, Ordering::Relaxed);
    }
}

/// 北向连接器指标快照。
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct NorthMetricsSnapshot {
    pub last_run_start_ms: Option<i64>,
    pub last_run_duration_ms: Option<u64>,
    pub values_sent: u64,
    pub files_sent: u64,
    pub pending_entries: u64,
    pub cache_size_bytes: u64,
    pub errored_entries: u64,
    pub current_attempts: u64,
    pub send_errors: u64,
    pub discarded_entries: u64,
}

/// 北向连接器指标（每个连接器实例一份）。
#[derive(Debug, Default)]
pub struct NorthMetrics {
    last_run_start_ms: AtomicI64,
    last_run_duration_ms: AtomicU64,
    successful_sends: AtomicU64,
    values_sent: AtomicU64,
    files_sent: AtomicU64,
    pending_entries: AtomicU64,
    cache_size_bytes: AtomicU64,
    errored_entries: AtomicU64,
    current_attempts: AtomicU64,
    send_errors: AtomicU64,
    discarded_entries: AtomicU64,
}

impl NorthMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> NorthMetricsSnapshot {
        NorthMetricsSnapshot {
            last_run_start_ms: optional_ts(&self.last_run_start_ms),
            last_run_duration_ms: optional_u64(
                &self.last_run_duration_ms,
                &self.successful_sends,
            ),
            values_sent: self.values_sent.load(Ordering::Relaxed),
            files_sent: self.files_sent.load(Ordering::Relaxed),
            pending_entries: self.pending_entries.load(Ordering::Relaxed),
            cache_size_bytes: self.cache_size_bytes.load(Ordering::Relaxed),
            errored_entries: self.errored_entries.load(Ordering::Relaxed),
            current_attempts: self.current_attempts.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            discarded_entries: self.discarded_entries.load(Ordering::Relaxed),
        }
    }

    /// 记录发送成功，并清零当前重试计数。
    pub fn record_send_success(
        &self,
        start_ms: i64,
        duration_ms: u64,
        values: usize,
        files: usize,
    ) {
        self.last_run_start_ms.store(start_ms, Ordering::Relaxed);
        self.last_run_duration_ms
            .store(duration_ms, Ordering::Relaxed);
        self.successful_sends.fetch_add(1, Ordering::Relaxed);
        self.values_sent.fetch_add(values as u64, Ordering::Relaxed);
        self.files_sent.fetch_add(files as u64, Ordering::Relaxed);
        self.current_attempts.store(0, Ordering::Relaxed);
    }

    pub fn record_send_error(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
        self.current_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// 事务终止（成功或永久失败）后清零重试计数。
    pub fn reset_attempts(&self) {
        self.current_attempts.store(0, Ordering::Relaxed);
    }

    /// 同步缓存水位。
    pub fn set_cache_state(&self, pending: usize, errored: usize, size_bytes: u64) {
        self.pending_entries
            .store(pending as u64, Ordering::Relaxed);
        self.errored_entries
            .store(errored as u64, Ordering::Relaxed);
        self.cache_size_bytes.store(size_bytes, Ordering::Relaxed);
    }

    /// 记录因超出缓存上限而丢弃的内容。
    pub fn record_discarded(&self) {
        self.discarded_entries.fetch_add(1, Ordering::Relaxed);
    }
}
