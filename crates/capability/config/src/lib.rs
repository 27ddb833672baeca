//! 网关运行配置加载：进程级环境变量 + 连接器 JSON 文件。

use domain::{ScanMode, SouthItem};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
    #[error("config file error: {0}")]
    File(String),
    #[error("config parse error: {0}")]
    Parse(String),
    #[error("connector {id}: {reason}")]
    Connector { id: String, reason: String },
}

impl ConfigError {
    fn connector(id: &str, reason: impl Into<String>) -> Self {
        Self::Connector {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

/// 进程级运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_folder: PathBuf,
    pub connectors_file: PathBuf,
    pub admin_enabled: bool,
    pub admin_addr: String,
    pub archive_sweep_seconds: u64,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_folder =
            PathBuf::from(env::var("FG_DATA_FOLDER").unwrap_or_else(|_| "./data".to_string()));
        let connectors_file = PathBuf::from(
            env::var("FG_CONNECTORS_FILE").unwrap_or_else(|_| "./connectors.json".to_string()),
        );
        let admin_enabled = read_bool_with_default("FG_ADMIN_ENABLED", true);
        let admin_addr =
            env::var("FG_ADMIN_ADDR").unwrap_or_else(|_| "127.0.0.1:2223".to_string());
        let archive_sweep_seconds = read_u64_with_default("FG_ARCHIVE_SWEEP_SECONDS", 3600)?;
        if archive_sweep_seconds == 0 {
            return Err(ConfigError::Invalid(
                "FG_ARCHIVE_SWEEP_SECONDS".to_string(),
                "0".to_string(),
            ));
        }

        Ok(Self {
            data_folder,
            connectors_file,
            admin_enabled,
            admin_addr,
            archive_sweep_seconds,
        })
    }
}

/// 连接器配置文件（扫描模式 + 南向 + 北向）。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub scan_modes: Vec<ScanMode>,
    #[serde(default)]
    pub south: Vec<SouthConnectorConfig>,
    #[serde(default)]
    pub north: Vec<NorthConnectorConfig>,
}

impl GatewayConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|err| ConfigError::File(format!("{}: {}", path.display(), err)))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }
}

/// 历史查询配置。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySettings {
    /// 单次查询的最大区间（秒），0 表示不切分。
    #[serde(default = "default_max_read_interval")]
    pub max_read_interval_seconds: u64,
    /// 子区间之间的等待（毫秒）。
    #[serde(default = "default_read_delay")]
    pub read_delay_ms: u64,
    /// 每个采集项独立维护断点。
    #[serde(default)]
    pub max_instant_per_item: bool,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            max_read_interval_seconds: default_max_read_interval(),
            read_delay_ms: default_read_delay(),
            max_instant_per_item: false,
        }
    }
}

fn default_max_read_interval() -> u64 {
    3600
}

fn default_read_delay() -> u64 {
    200
}

fn default_enabled() -> bool {
    true
}

/// 南向连接器配置。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SouthConnectorConfig {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub settings: serde_json::Value,
    #[serde(default)]
    pub history: HistorySettings,
    #[serde(default)]
    pub items: Vec<SouthItem>,
}

impl SouthConnectorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::connector(&self.name, "empty id"));
        }
        for item in &self.items {
            if item.id.trim().is_empty() {
                return Err(ConfigError::connector(&self.id, "item with empty id"));
            }
            if item.scan_mode_id.trim().is_empty() {
                return Err(ConfigError::connector(
                    &self.id,
                    format!("item {} has no scan mode", item.id),
                ));
            }
        }
        Ok(())
    }
}

/// 北向订阅范围：全部南向，或显式白名单。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subscriptions {
    #[default]
    All,
    Sources(Vec<String>),
}

impl Subscriptions {
    pub fn includes(&self, south_id: &str) -> bool {
        match self {
            Subscriptions::All => true,
            Subscriptions::Sources(sources) => sources.iter().any(|id| id == south_id),
        }
    }
}

/// 归档配置。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveSettings {
    pub enabled: bool,
    /// 归档文件保留时长（小时），0 表示永久保留。
    #[serde(default)]
    pub retention_duration_hours: u64,
}

/// 北向缓存与发送配置。核心字段无默认值，缺失即配置错误。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachingSettings {
    pub send_interval_ms: u64,
    pub retry_interval_ms: u64,
    pub retry_count: u32,
    pub timeout_ms: u64,
    pub group_count: usize,
    pub max_send_count: usize,
    /// 缓存目录上限（MB），0 表示不限制。
    #[serde(default)]
    pub max_size_mb: u64,
    #[serde(default)]
    pub archive: ArchiveSettings,
}

/// 北向连接器配置。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NorthConnectorConfig {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub settings: serde_json::Value,
    pub caching: CachingSettings,
    #[serde(default)]
    pub subscriptions: Subscriptions,
}

impl NorthConnectorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::connector(&self.name, "empty id"));
        }
        let caching = &self.caching;
        if caching.group_count == 0 {
            return Err(ConfigError::connector(&self.id, "group_count must be >= 1"));
        }
        if caching.max_send_count < caching.group_count {
            return Err(ConfigError::connector(
                &self.id,
                format!(
                    "max_send_count ({}) must be >= group_count ({})",
                    caching.max_send_count, caching.group_count
                ),
            ));
        }
        if caching.send_interval_ms == 0 {
            return Err(ConfigError::connector(&self.id, "send_interval_ms must be > 0"));
        }
        if caching.retry_interval_ms == 0 {
            return Err(ConfigError::connector(&self.id, "retry_interval_ms must be > 0"));
        }
        if caching.timeout_ms == 0 {
            return Err(ConfigError::connector(&self.id, "timeout_ms must be > 0"));
        }
        Ok(())
    }
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}
