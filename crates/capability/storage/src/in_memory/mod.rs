//! 内存存储实现模块
//!
//! 仅用于测试，进程退出即丢失。

pub mod cache;
pub mod checkpoint;

pub use cache::*;
pub use checkpoint::*;
