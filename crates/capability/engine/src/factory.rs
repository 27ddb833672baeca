use crate::error::EngineError;
use fg_config::{NorthConnectorConfig, SouthConnectorConfig};
use fg_north::NorthConnector;
use fg_south::SouthConnector;
use std::sync::Arc;

/// 按配置中的 `type` 创建协议适配器。
pub trait ConnectorFactory: Send + Sync {
    fn create_south(
        &self,
        config: &SouthConnectorConfig,
    ) -> Result<Arc<dyn SouthConnector>, EngineError>;

    fn create_north(
        &self,
        config: &NorthConnectorConfig,
    ) -> Result<Arc<dyn NorthConnector>, EngineError>;
}
