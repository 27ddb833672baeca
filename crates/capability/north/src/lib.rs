//! 北向转发：内容缓存、分组发送、重试与归档。
//!
//! 每个北向连接器实例对应一个 [`NorthRuntime`]，内部包含：
//! - [`ContentBuffer`]：内存索引 + SQLite 持久化 + 文件缓存目录
//! - 发送循环：同一时刻最多一个 Transaction 在途
//! - [`ArchiveManager`]：发送成功后归档或删除文件

pub mod archive;
pub mod buffer;
pub mod connector;
mod dispatch;
pub mod error;
pub mod runtime;

pub use archive::{ArchiveManager, ArchivedFile};
pub use buffer::{CacheFolders, ContentBuffer, Transaction};
pub use connector::{NorthConnector, retryable_status};
pub use error::NorthError;
pub use runtime::NorthRuntime;
