//! # SQLite 存储实现模块
//!
//! 每个连接器目录一个 `cache.db`：
//!
//! - `cache_entries`：北向缓存条目（seq 主键，载荷为 JSON 文本）
//! - `history_checkpoints`：南向历史断点（`(scan_mode_id, item_id)` 主键）
//!
//! 表在 `open` 时按需创建。所有 SQL 使用参数绑定。

pub mod cache;
pub mod checkpoint;

pub use cache::*;
pub use checkpoint::*;
