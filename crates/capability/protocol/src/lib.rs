//! # 协议适配
//!
//! 网关内置的南北向协议实现，由 [`ProtocolFactory`] 按连接器 `type` 装配：
//!
//! | type             | 方向 | 能力                         |
//! |------------------|------|------------------------------|
//! | `modbus`         | 南向 | 最新值轮询（保持/输入寄存器）  |
//! | `mqtt`           | 南向 | 主题订阅                      |
//! | `folder-scanner` | 南向 | 文件扫描                      |
//! | `mqtt`           | 北向 | 发布 JSON / 文件内容           |
//! | `console`        | 北向 | 日志输出                      |
//! | `file-writer`    | 北向 | 写出到本地目录                 |
//!
//! ```text
//! SouthConnector ──▶ SouthSink ──▶ EngineRouter ──▶ NorthRuntime ──▶ NorthConnector
//! ```

mod console;
mod error;
mod factory;
mod folder;
mod modbus_tcp;
mod mqtt;
mod types;

pub use console::{ConsoleNorth, ConsoleSettings};
pub use error::ProtocolError;
pub use factory::{NORTH_TYPES, ProtocolFactory, SOUTH_TYPES};
pub use folder::{FileWriterNorth, FileWriterSettings, FolderScannerSettings, FolderScannerSouth};
pub use modbus_tcp::{ModbusSouth, ModbusTcpConfig};
pub use mqtt::{MqttNorth, MqttSouth};
pub use types::*;
