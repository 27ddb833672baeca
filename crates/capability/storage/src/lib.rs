//! # Storage 模块
//!
//! 连接器的本地持久化：北向缓存条目与南向历史断点。
//!
//! - [`traits`]：`CacheStore`、`CheckpointStore` 异步接口
//! - [`models`]：持久化记录（`StoredEntry`、`EntryState`）
//! - [`connection`]：SQLite 连接池与建表
//! - [`in_memory`]：内存实现（测试用）
//! - [`sqlite`]：SQLite 实现（每个连接器目录一个 `cache.db`）
//!
//! 缓存条目只追加：写入即为 `pending`，发送确认后删除，
//! 永久失败时标记为 `errored` 而不是删除。

pub mod connection;
pub mod error;
pub mod in_memory;
pub mod models;
pub mod sqlite;
pub mod traits;

pub use connection::*;
pub use error::*;
pub use models::*;
pub use traits::*;

pub use in_memory::{InMemoryCacheStore, InMemoryCheckpointStore};
pub use sqlite::{SqliteCacheStore, SqliteCheckpointStore};
