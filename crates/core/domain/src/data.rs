use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 时序值的数据类型。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeValueData {
    I64(i64),
    F64(f64),
    Bool(bool),
    String(String),
}

impl std::fmt::Display for TimeValueData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeValueData::I64(v) => write!(f, "{}", v),
            TimeValueData::F64(v) => write!(f, "{}", v),
            TimeValueData::Bool(v) => write!(f, "{}", v),
            TimeValueData::String(v) => write!(f, "{}", v),
        }
    }
}

/// 南向采集得到的单个时序点。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeValue {
    pub point_id: String,
    pub ts_ms: i64,
    pub value: TimeValueData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
}

impl TimeValue {
    pub fn new(point_id: impl Into<String>, ts_ms: i64, value: TimeValueData) -> Self {
        Self {
            point_id: point_id.into(),
            ts_ms,
            value,
            quality: None,
        }
    }
}

/// 缓存内容的类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentType {
    TimeValues,
    Raw,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::TimeValues => "time-values",
            ContentType::Raw => "raw",
        }
    }
}

/// 缓存条目载荷：一批时序值，或指向缓存目录中文件的引用。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CacheContent {
    TimeValues { values: Vec<TimeValue> },
    Raw { path: PathBuf },
}

impl CacheContent {
    pub fn content_type(&self) -> ContentType {
        match self {
            CacheContent::TimeValues { .. } => ContentType::TimeValues,
            CacheContent::Raw { .. } => ContentType::Raw,
        }
    }

    pub fn file_path(&self) -> Option<&Path> {
        match self {
            CacheContent::Raw { path } => Some(path.as_path()),
            CacheContent::TimeValues { .. } => None,
        }
    }
}

/// 等待发送的缓存条目。
///
/// `seq` 在单个北向连接器内单调递增，决定发送顺序；
/// 条目只追加，发送成功确认后才会被删除。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub seq: u64,
    pub source_id: String,
    pub created_at_ms: i64,
    pub size_bytes: u64,
    pub content: CacheContent,
}

impl CacheEntry {
    pub fn content_type(&self) -> ContentType {
        self.content.content_type()
    }

    pub fn is_file(&self) -> bool {
        matches!(self.content, CacheContent::Raw { .. })
    }

    /// 条目中的时序值数量（文件条目为 0）。
    pub fn value_count(&self) -> usize {
        match &self.content {
            CacheContent::TimeValues { values } => values.len(),
            CacheContent::Raw { .. } => 0,
        }
    }
}
