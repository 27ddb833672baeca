//! 管理接口的 DTO 与 API 响应契约。

use serde::{Deserialize, Serialize};

/// 标准 API 响应封装。
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 网关整体状态。
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatusDto {
    pub version: String,
    pub started_at_ms: i64,
    pub south_count: usize,
    pub north_count: usize,
}

/// 南向连接器概要。
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SouthConnectorDto {
    pub id: String,
    pub state: String,
    pub item_count: usize,
    pub queue_len: usize,
}

/// 北向连接器概要。
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NorthConnectorDto {
    pub id: String,
    pub name: String,
    pub running: bool,
}

/// 缓存条目（pending 或 errored）。
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntryDto {
    pub seq: u64,
    pub source_id: String,
    pub created_at_ms: i64,
    pub size_bytes: u64,
    /// `time-values` 或 `raw`
    pub kind: String,
    pub value_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// 按序号选择缓存条目；缺省表示全部。
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySelectionRequest {
    #[serde(default)]
    pub seqs: Option<Vec<u64>>,
}

/// 按文件名选择归档文件。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveSelectionRequest {
    pub names: Vec<String>,
}

/// 归档文件。
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedFileDto {
    pub name: String,
    pub size_bytes: u64,
    pub modified_ms: i64,
}

/// 历史补采请求。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRequest {
    pub start_ms: i64,
    pub end_ms: i64,
}

/// 批量操作结果。
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedDto {
    pub affected: usize,
}

