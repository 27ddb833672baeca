//! Modbus TCP 南向适配：按扫描模式读取寄存器最新值。
//!
//! ## 配置格式
//!
//! ```json
//! // south.settings
//! { "host": "192.168.1.100", "port": 502, "slave_id": 1 }
//!
//! // item.settings
//! { "function_code": 3, "register_address": 100, "data_type": "int16", "scale": 0.1 }
//! ```

use crate::error::ProtocolError;
use crate::types::{ModbusPointDetail, parse_registers, parse_settings};
use async_trait::async_trait;
use domain::{SouthItem, TimeValue, TimeValueData, now_epoch_ms};
use fg_south::{SouthCapabilities, SouthConnector, SouthError, SouthSink};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;
use tracing::{debug, info, warn};

/// Modbus TCP 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModbusTcpConfig {
    /// Modbus 服务器主机地址
    pub host: String,
    /// Modbus 服务器端口（默认 502）
    #[serde(default = "default_modbus_port")]
    pub port: u16,
    /// 从站 ID (1-247)
    #[serde(default = "default_slave_id")]
    pub slave_id: u8,
    /// 连接超时（毫秒）
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// 读取超时（毫秒）
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
}

fn default_modbus_port() -> u16 {
    502
}

fn default_slave_id() -> u8 {
    1
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_read_timeout() -> u64 {
    3000
}

/// Modbus TCP 南向连接器
pub struct ModbusSouth {
    south_id: String,
    config: ModbusTcpConfig,
    ctx: Mutex<Option<Context>>,
}

impl ModbusSouth {
    pub fn new(south_id: &str, config: ModbusTcpConfig) -> Self {
        Self {
            south_id: south_id.to_string(),
            config,
            ctx: Mutex::new(None),
        }
    }

    /// 从 `south.settings` 解析
    pub fn from_settings(south_id: &str, settings: &serde_json::Value) -> Result<Self, ProtocolError> {
        let config: ModbusTcpConfig = parse_settings(settings, "modbus settings")?;
        Ok(Self::new(south_id, config))
    }

    pub fn config(&self) -> &ModbusTcpConfig {
        &self.config
    }

    fn address(&self) -> Result<SocketAddr, ProtocolError> {
        format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| ProtocolError::ConfigParse(format!("invalid address: {}", e)))
    }

    async fn open(&self) -> Result<Context, ProtocolError> {
        let addr = self.address()?;
        let connect = tokio_modbus::client::tcp::connect_slave(addr, Slave(self.config.slave_id));
        let ctx = tokio::time::timeout(Duration::from_millis(self.config.connect_timeout_ms), connect)
            .await
            .map_err(|_| ProtocolError::Timeout(format!("connect to {}", addr)))?
            .map_err(|e| ProtocolError::Connection(e.to_string()))?;
        info!(
            target: "fg.protocol",
            south_id = %self.south_id,
            addr = %addr,
            slave = self.config.slave_id,
            "modbus_connected"
        );
        Ok(ctx)
    }

    /// 读取单个采集项
    async fn read_item(
        &self,
        ctx: &mut Context,
        detail: &ModbusPointDetail,
    ) -> Result<f64, ProtocolError> {
        let count = detail.data_type.register_count();
        let read_timeout = Duration::from_millis(self.config.read_timeout_ms);
        let registers = match detail.function_code {
            3 => {
                // 读保持寄存器
                tokio::time::timeout(read_timeout, ctx.read_holding_registers(detail.register_address, count))
                    .await
                    .map_err(|_| ProtocolError::Timeout("read holding registers".to_string()))?
                    .map_err(|e| ProtocolError::Modbus(e.to_string()))?
                    .map_err(|e| ProtocolError::Modbus(format!("exception: {:?}", e)))?
            }
            4 => {
                // 读输入寄存器
                tokio::time::timeout(read_timeout, ctx.read_input_registers(detail.register_address, count))
                    .await
                    .map_err(|_| ProtocolError::Timeout("read input registers".to_string()))?
                    .map_err(|e| ProtocolError::Modbus(e.to_string()))?
                    .map_err(|e| ProtocolError::Modbus(format!("exception: {:?}", e)))?
            }
            other => {
                return Err(ProtocolError::ConfigParse(format!(
                    "unsupported function code: {}",
                    other
                )));
            }
        };

        debug!(
            target: "fg.protocol",
            south_id = %self.south_id,
            register = detail.register_address,
            count,
            values = ?registers,
            "modbus_registers_read"
        );

        let raw = parse_registers(&registers, detail.data_type, detail.word_order)?;
        Ok(detail.apply_scale(raw))
    }
}

#[async_trait]
impl SouthConnector for ModbusSouth {
    fn capabilities(&self) -> SouthCapabilities {
        SouthCapabilities {
            last_point: true,
            ..Default::default()
        }
    }

    async fn connect(&self) -> Result<(), SouthError> {
        let ctx = self.open().await?;
        *self.ctx.lock().await = Some(ctx);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SouthError> {
        self.ctx.lock().await.take();
        Ok(())
    }

    /// 逐项读取；连接中断时丢弃连接，下次扫描重新建立。
    async fn last_point_query(&self, items: &[SouthItem], sink: &SouthSink) -> Result<(), SouthError> {
        let mut guard = self.ctx.lock().await;
        let mut ctx = match guard.take() {
            Some(ctx) => ctx,
            None => self.open().await?,
        };

        let mut values = Vec::with_capacity(items.len());
        let mut failure = None;
        for item in items {
            let detail: ModbusPointDetail = match parse_settings(&item.settings, &item.id) {
                Ok(detail) => detail,
                Err(err) => {
                    warn!(target: "fg.protocol", south_id = %self.south_id, item = %item.id, error = %err, "modbus_item_invalid");
                    continue;
                }
            };
            match self.read_item(&mut ctx, &detail).await {
                Ok(value) => values.push(TimeValue::new(
                    item.id.clone(),
                    now_epoch_ms(),
                    TimeValueData::F64(value),
                )),
                Err(err @ (ProtocolError::Modbus(_) | ProtocolError::DataParse(_))) => {
                    warn!(
                        target: "fg.protocol",
                        south_id = %self.south_id,
                        item = %item.id,
                        error = %err,
                        "modbus_read_failed"
                    );
                }
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        if failure.is_none() {
            *guard = Some(ctx);
        }
        drop(guard);
        sink.add_values(values).await?;
        match failure {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}
