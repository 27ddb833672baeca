//! HTTP 响应辅助函数和 DTO 转换
//!
//! 所有错误返回统一的 ApiResponse 格式，HTTP 状态码与错误码对应。

use api_contract::{ApiResponse, ArchivedFileDto, CacheEntryDto};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::CacheEntry;
use fg_north::{ArchivedFile, NorthError};
use fg_south::SouthError;
use serde::Serialize;

/// 成功响应
pub fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// 错误请求响应
pub fn bad_request_error(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error("INVALID.REQUEST", message.into())),
    )
        .into_response()
}

/// 连接器未找到
pub fn not_found_error(connector_id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::error(
            "CONNECTOR.NOT_FOUND",
            format!("connector not found: {}", connector_id),
        )),
    )
        .into_response()
}

/// 连接器状态不允许该操作
pub fn conflict_error(message: impl Into<String>) -> Response {
    (
        StatusCode::CONFLICT,
        Json(ApiResponse::<()>::error("CONNECTOR.STATE", message.into())),
    )
        .into_response()
}

/// 北向缓存操作错误
pub fn north_error(err: NorthError) -> Response {
    match err {
        NorthError::Config(message) => bad_request_error(message),
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<()>::error("INTERNAL.ERROR", other.to_string())),
        )
            .into_response(),
    }
}

/// 南向操作错误
pub fn south_error(err: SouthError) -> Response {
    match err {
        SouthError::Unsupported(operation) => bad_request_error(format!("unsupported: {}", operation)),
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<()>::error("INTERNAL.ERROR", other.to_string())),
        )
            .into_response(),
    }
}

/// CacheEntry 转 CacheEntryDto
pub fn cache_entry_to_dto(entry: CacheEntry) -> CacheEntryDto {
    CacheEntryDto {
        kind: entry.content_type().as_str().to_string(),
        value_count: entry.value_count(),
        file_name: entry
            .content
            .file_path()
            .and_then(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned()),
        seq: entry.seq,
        source_id: entry.source_id,
        created_at_ms: entry.created_at_ms,
        size_bytes: entry.size_bytes,
    }
}

/// ArchivedFile 转 ArchivedFileDto
pub fn archived_file_to_dto(file: ArchivedFile) -> ArchivedFileDto {
    ArchivedFileDto {
        name: file.name,
        size_bytes: file.size_bytes,
        modified_ms: file.modified_ms,
    }
}
