//! 协议适配器工厂：按连接器 `type` 构造南北向实现。

use crate::console::ConsoleNorth;
use crate::folder::{FileWriterNorth, FolderScannerSouth};
use crate::modbus_tcp::ModbusSouth;
use crate::mqtt::{MqttNorth, MqttSouth};
use fg_config::{NorthConnectorConfig, SouthConnectorConfig};
use fg_engine::{ConnectorFactory, EngineError};
use fg_north::NorthConnector;
use fg_south::SouthConnector;
use std::sync::Arc;

pub const SOUTH_TYPES: &[&str] = &["modbus", "mqtt", "folder-scanner"];
pub const NORTH_TYPES: &[&str] = &["mqtt", "console", "file-writer"];

/// 内置协议集合。
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtocolFactory;

impl ConnectorFactory for ProtocolFactory {
    fn create_south(
        &self,
        config: &SouthConnectorConfig,
    ) -> Result<Arc<dyn SouthConnector>, EngineError> {
        let connector: Arc<dyn SouthConnector> = match config.kind.as_str() {
            "modbus" => Arc::new(ModbusSouth::from_settings(&config.id, &config.settings)?),
            "mqtt" => Arc::new(MqttSouth::from_settings(&config.id, &config.settings)?),
            "folder-scanner" => Arc::new(FolderScannerSouth::from_settings(&config.id, &config.settings)?),
            other => return Err(EngineError::UnknownType(other.to_string())),
        };
        Ok(connector)
    }

    fn create_north(
        &self,
        config: &NorthConnectorConfig,
    ) -> Result<Arc<dyn NorthConnector>, EngineError> {
        let connector: Arc<dyn NorthConnector> = match config.kind.as_str() {
            "mqtt" => Arc::new(MqttNorth::from_settings(&config.id, &config.settings)?),
            "console" => Arc::new(ConsoleNorth::from_settings(&config.id, &config.settings)?),
            "file-writer" => Arc::new(FileWriterNorth::from_settings(&config.id, &config.settings)?),
            other => return Err(EngineError::UnknownType(other.to_string())),
        };
        Ok(connector)
    }
}
