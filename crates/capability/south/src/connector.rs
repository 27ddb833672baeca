//! 南向协议适配接口与数据出口。

use crate::error::SouthError;
use async_trait::async_trait;
use domain::{ScanMode, SouthItem, TimeValue};
use fg_telemetry::SouthMetrics;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// 协议适配器声明的能力集合。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SouthCapabilities {
    pub history_point: bool,
    pub history_file: bool,
    pub last_point: bool,
    pub last_file: bool,
    pub subscription: bool,
}

impl SouthCapabilities {
    pub fn has_history(&self) -> bool {
        self.history_point || self.history_file
    }
}

/// 南向协议适配器。
///
/// 数据在读取过程中通过 [`SouthSink`] 推送，不在返回值中批量返回。
/// 未声明的能力保持默认实现（返回 `Unsupported`）。
#[async_trait]
pub trait SouthConnector: Send + Sync {
    fn capabilities(&self) -> SouthCapabilities;

    async fn connect(&self) -> Result<(), SouthError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SouthError> {
        Ok(())
    }

    /// 读取 `[start_ms, end_ms]` 内的历史数据，返回实际取到的最大时间戳。
    async fn history_query(
        &self,
        _items: &[SouthItem],
        _start_ms: i64,
        _end_ms: i64,
        _sink: &SouthSink,
    ) -> Result<Option<i64>, SouthError> {
        Err(SouthError::Unsupported("history_query"))
    }

    async fn last_point_query(
        &self,
        _items: &[SouthItem],
        _sink: &SouthSink,
    ) -> Result<(), SouthError> {
        Err(SouthError::Unsupported("last_point_query"))
    }

    async fn file_query(&self, _items: &[SouthItem], _sink: &SouthSink) -> Result<(), SouthError> {
        Err(SouthError::Unsupported("file_query"))
    }

    /// 订阅采集项；适配器自行持有 sink 并在后台推送。
    async fn subscribe(&self, _items: &[SouthItem], _sink: SouthSink) -> Result<(), SouthError> {
        Err(SouthError::Unsupported("subscribe"))
    }
}

/// 采集数据的接收方（由引擎路由实现）。
#[async_trait]
pub trait ContentSink: Send + Sync {
    async fn add_values(&self, source_id: &str, values: Vec<TimeValue>) -> Result<(), SouthError>;

    async fn add_file(&self, source_id: &str, path: &Path) -> Result<(), SouthError>;
}

/// 绑定到某个南向连接器的数据出口。
#[derive(Clone)]
pub struct SouthSink {
    south_id: Arc<str>,
    target: Arc<dyn ContentSink>,
    metrics: Arc<SouthMetrics>,
}

impl SouthSink {
    pub fn new(south_id: &str, target: Arc<dyn ContentSink>, metrics: Arc<SouthMetrics>) -> Self {
        Self {
            south_id: Arc::from(south_id),
            target,
            metrics,
        }
    }

    pub fn south_id(&self) -> &str {
        &self.south_id
    }

    pub async fn add_values(&self, values: Vec<TimeValue>) -> Result<(), SouthError> {
        if values.is_empty() {
            return Ok(());
        }
        let count = values.len();
        self.target.add_values(&self.south_id, values).await?;
        self.metrics.record_values_added(count);
        Ok(())
    }

    /// 只统计被下游接受的文件。
    pub async fn add_file(&self, path: &Path) -> Result<(), SouthError> {
        self.target.add_file(&self.south_id, path).await?;
        self.metrics.record_file_added();
        Ok(())
    }
}

/// 扫描模式查询接口。
pub trait ScanModeSource: Send + Sync {
    fn get_scan_mode(&self, id: &str) -> Option<ScanMode>;
}

/// 基于配置文件的静态扫描模式表。
#[derive(Debug, Clone, Default)]
pub struct StaticScanModes {
    modes: HashMap<String, ScanMode>,
}

impl StaticScanModes {
    pub fn new(modes: impl IntoIterator<Item = ScanMode>) -> Self {
        Self {
            modes: modes
                .into_iter()
                .map(|mode| (mode.id.clone(), mode))
                .collect(),
        }
    }
}

impl ScanModeSource for StaticScanModes {
    fn get_scan_mode(&self, id: &str) -> Option<ScanMode> {
        self.modes.get(id).cloned()
    }
}
