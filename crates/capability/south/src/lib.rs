//! 南向采集调度：扫描触发器、串行任务队列、历史区间切分与协议适配接口。
//!
//! 每个南向连接器实例对应一个 [`AcquisitionScheduler`]：
//! 触发器只负责入队（同一扫描模式单槽去重），单个消费任务在 RunToken
//! 保护下依次执行，同一连接器任意时刻最多一个 run 在执行。

pub mod connector;
pub mod error;
mod history;
pub mod interval;
pub mod scheduler;
pub mod trigger;

pub use connector::{
    ContentSink, ScanModeSource, SouthCapabilities, SouthConnector, SouthSink, StaticScanModes,
};
pub use error::SouthError;
pub use interval::{IntervalSplit, split_interval};
pub use scheduler::{AcquisitionScheduler, SchedulerState};
pub use trigger::{ScanTrigger, TriggerCallback, validate_cron};
