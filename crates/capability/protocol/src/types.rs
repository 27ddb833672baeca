//! 协议相关类型定义

use crate::error::ProtocolError;
use domain::TimeValueData;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// 解析连接器或采集项的 `settings`（缺省视为空对象）。
pub fn parse_settings<T: DeserializeOwned>(
    value: &serde_json::Value,
    what: &str,
) -> Result<T, ProtocolError> {
    let value = if value.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        value.clone()
    };
    serde_json::from_value(value).map_err(|e| ProtocolError::ConfigParse(format!("{}: {}", what, e)))
}

/// Modbus 寄存器数据类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModbusDataType {
    /// 16位有符号整数
    #[default]
    Int16,
    /// 16位无符号整数
    Uint16,
    /// 32位有符号整数（2个寄存器）
    Int32,
    /// 32位无符号整数（2个寄存器）
    Uint32,
    /// 32位浮点数（2个寄存器）
    Float32,
    /// 64位浮点数（4个寄存器）
    Float64,
}

impl ModbusDataType {
    /// 该类型需要的寄存器数量
    pub fn register_count(&self) -> u16 {
        match self {
            ModbusDataType::Int16 | ModbusDataType::Uint16 => 1,
            ModbusDataType::Int32 | ModbusDataType::Uint32 | ModbusDataType::Float32 => 2,
            ModbusDataType::Float64 => 4,
        }
    }
}

/// 多寄存器值的字序
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordOrder {
    #[default]
    BigEndian,
    LittleEndian,
}

/// 采集项协议详情（Modbus），来自 `item.settings`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModbusPointDetail {
    /// 功能码（3 保持寄存器 / 4 输入寄存器）
    #[serde(default = "default_function_code")]
    pub function_code: u8,
    /// 寄存器起始地址
    pub register_address: u16,
    /// 数据类型
    #[serde(default)]
    pub data_type: ModbusDataType,
    #[serde(default)]
    pub word_order: WordOrder,
    /// 缩放系数
    #[serde(default)]
    pub scale: Option<f64>,
    /// 偏移量
    #[serde(default)]
    pub offset: Option<f64>,
}

fn default_function_code() -> u8 {
    3
}

impl ModbusPointDetail {
    /// 应用缩放和偏移
    pub fn apply_scale(&self, raw: f64) -> f64 {
        raw * self.scale.unwrap_or(1.0) + self.offset.unwrap_or(0.0)
    }
}

/// 解析寄存器数据为浮点值
pub fn parse_registers(
    registers: &[u16],
    data_type: ModbusDataType,
    word_order: WordOrder,
) -> Result<f64, ProtocolError> {
    let needed = data_type.register_count() as usize;
    if registers.len() < needed {
        return Err(ProtocolError::DataParse(format!(
            "need {} registers for {:?}, got {}",
            needed,
            data_type,
            registers.len()
        )));
    }
    let mut words: Vec<u16> = registers[..needed].to_vec();
    if word_order == WordOrder::LittleEndian {
        words.reverse();
    }
    let bits = words
        .iter()
        .fold(0u64, |acc, word| (acc << 16) | u64::from(*word));

    let value = match data_type {
        ModbusDataType::Int16 => words[0] as i16 as f64,
        ModbusDataType::Uint16 => words[0] as f64,
        ModbusDataType::Int32 => bits as u32 as i32 as f64,
        ModbusDataType::Uint32 => bits as u32 as f64,
        ModbusDataType::Float32 => f32::from_bits(bits as u32) as f64,
        ModbusDataType::Float64 => f64::from_bits(bits),
    };
    Ok(value)
}

/// MQTT 连接参数（南北向共用）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttSettings {
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub qos: u8,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_seconds: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_keep_alive() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    5000
}

pub(crate) fn qos_from_u8(qos: u8) -> rumqttc::QoS {
    match qos {
        2 => rumqttc::QoS::ExactlyOnce,
        1 => rumqttc::QoS::AtLeastOnce,
        _ => rumqttc::QoS::AtMostOnce,
    }
}

pub(crate) fn mqtt_options(settings: &MqttSettings, role: &str) -> rumqttc::MqttOptions {
    let client_id = format!("fg-{}-{}", role, uuid::Uuid::new_v4());
    let mut options = rumqttc::MqttOptions::new(client_id, settings.host.clone(), settings.port);
    options.set_keep_alive(std::time::Duration::from_secs(settings.keep_alive_seconds.max(5)));
    if let (Some(username), Some(password)) = (settings.username.as_ref(), settings.password.as_ref())
    {
        options.set_credentials(username, password);
    }
    options
}

/// 报文解析：数字 → F64/I64，true/false → Bool，其余保留为字符串。
pub fn parse_payload(payload: &[u8]) -> TimeValueData {
    let text = String::from_utf8_lossy(payload);
    let text = text.trim();
    if let Ok(value) = text.parse::<i64>() {
        return TimeValueData::I64(value);
    }
    if let Ok(value) = text.parse::<f64>() {
        return TimeValueData::F64(value);
    }
    match text {
        "true" => TimeValueData::Bool(true),
        "false" => TimeValueData::Bool(false),
        _ => TimeValueData::String(text.to_string()),
    }
}

/// MQTT 主题过滤匹配（支持 `+` 与 `#`）。
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_parts = filter.split('/');
    let mut topic_parts = topic.split('/');
    loop {
        match (filter_parts.next(), topic_parts.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
