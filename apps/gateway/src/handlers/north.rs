//! 北向连接器与缓存管理 handlers
//!
//! - GET /north - 列出运行中的北向连接器
//! - GET /north/{id}/metrics - 指标快照
//! - POST /north/{id}/retry - 立即重试在途批次
//! - GET /north/{id}/cache/pending, POST /north/{id}/cache/pending/remove
//! - GET /north/{id}/cache/errored, POST .../errored/retry, POST .../errored/remove
//! - GET /north/{id}/archive, POST .../archive/retry, POST .../archive/remove

use crate::AppState;
use crate::utils::{
    archived_file_to_dto, bad_request_error, cache_entry_to_dto, north_error, not_found_error, ok,
};
use api_contract::{
    AffectedDto, ArchiveSelectionRequest, ArchivedFileDto, CacheEntryDto, EntrySelectionRequest,
    NorthConnectorDto,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use fg_north::{NorthError, NorthRuntime};
use std::sync::Arc;

async fn runtime(state: &AppState, north_id: &str) -> Result<Arc<NorthRuntime>, Response> {
    state
        .engine
        .north(north_id)
        .await
        .ok_or_else(|| not_found_error(north_id))
}

fn affected(result: Result<usize, NorthError>) -> Response {
    match result {
        Ok(affected) => ok(AffectedDto { affected }),
        Err(err) => north_error(err),
    }
}

pub async fn list_norths(State(state): State<AppState>) -> Response {
    let mut data = Vec::new();
    for north in state.engine.norths().await {
        data.push(NorthConnectorDto {
            id: north.id().to_string(),
            name: north.name().to_string(),
            running: north.is_running().await,
        });
    }
    ok(data)
}

pub async fn get_north_metrics(
    State(state): State<AppState>,
    Path(north_id): Path<String>,
) -> Response {
    match runtime(&state, &north_id).await {
        Ok(north) => ok(north.metrics()),
        Err(response) => response,
    }
}

pub async fn force_north_retry(
    State(state): State<AppState>,
    Path(north_id): Path<String>,
) -> Response {
    match runtime(&state, &north_id).await {
        Ok(north) => {
            north.force_retry();
            StatusCode::ACCEPTED.into_response()
        }
        Err(response) => response,
    }
}

pub async fn list_pending(State(state): State<AppState>, Path(north_id): Path<String>) -> Response {
    match runtime(&state, &north_id).await {
        Ok(north) => {
            let data: Vec<CacheEntryDto> = north
                .list_pending()
                .await
                .into_iter()
                .map(cache_entry_to_dto)
                .collect();
            ok(data)
        }
        Err(response) => response,
    }
}

/// 在途批次中的条目不会被删除。
pub async fn remove_pending(
    State(state): State<AppState>,
    Path(north_id): Path<String>,
    Json(req): Json<EntrySelectionRequest>,
) -> Response {
    let Some(seqs) = req.seqs else {
        return bad_request_error("seqs is required");
    };
    match runtime(&state, &north_id).await {
        Ok(north) => affected(north.remove_pending(&seqs).await),
        Err(response) => response,
    }
}

pub async fn list_errored(State(state): State<AppState>, Path(north_id): Path<String>) -> Response {
    match runtime(&state, &north_id).await {
        Ok(north) => {
            let data: Vec<CacheEntryDto> = north
                .list_errored()
                .await
                .into_iter()
                .map(cache_entry_to_dto)
                .collect();
            ok(data)
        }
        Err(response) => response,
    }
}

pub async fn retry_errored(
    State(state): State<AppState>,
    Path(north_id): Path<String>,
    Json(req): Json<EntrySelectionRequest>,
) -> Response {
    match runtime(&state, &north_id).await {
        Ok(north) => affected(north.retry_errored(req.seqs.as_deref()).await),
        Err(response) => response,
    }
}

pub async fn remove_errored(
    State(state): State<AppState>,
    Path(north_id): Path<String>,
    Json(req): Json<EntrySelectionRequest>,
) -> Response {
    match runtime(&state, &north_id).await {
        Ok(north) => affected(north.remove_errored(req.seqs.as_deref()).await),
        Err(response) => response,
    }
}

pub async fn list_archive(State(state): State<AppState>, Path(north_id): Path<String>) -> Response {
    match runtime(&state, &north_id).await {
        Ok(north) => match north.list_archive().await {
            Ok(files) => {
                let data: Vec<ArchivedFileDto> =
                    files.into_iter().map(archived_file_to_dto).collect();
                ok(data)
            }
            Err(err) => north_error(err),
        },
        Err(response) => response,
    }
}

pub async fn retry_archived(
    State(state): State<AppState>,
    Path(north_id): Path<String>,
    Json(req): Json<ArchiveSelectionRequest>,
) -> Response {
    match runtime(&state, &north_id).await {
        Ok(north) => affected(north.retry_archived(&req.names).await),
        Err(response) => response,
    }
}

pub async fn remove_archived(
    State(state): State<AppState>,
    Path(north_id): Path<String>,
    Json(req): Json<ArchiveSelectionRequest>,
) -> Response {
    match runtime(&state, &north_id).await {
        Ok(north) => affected(north.remove_archived(&req.names).await),
        Err(response) => response,
    }
}
