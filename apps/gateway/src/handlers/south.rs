//! 南向连接器 handlers
//!
//! - GET /south - 列出运行中的南向连接器
//! - GET /south/{id} - 连接器概要
//! - GET /south/{id}/metrics - 指标快照
//! - POST /south/{id}/history - 后台执行一次历史补采

use crate::AppState;
use crate::utils::{bad_request_error, conflict_error, not_found_error, ok};
use api_contract::{HistoryRequest, SouthConnectorDto};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use fg_south::{AcquisitionScheduler, SchedulerState};
use tracing::warn;

async fn south_to_dto(scheduler: &AcquisitionScheduler) -> SouthConnectorDto {
    SouthConnectorDto {
        id: scheduler.south_id().to_string(),
        state: scheduler.state().await.as_str().to_string(),
        item_count: scheduler.items().await.len(),
        queue_len: scheduler.queue_len(),
    }
}

pub async fn list_souths(State(state): State<AppState>) -> Response {
    let mut data = Vec::new();
    for scheduler in state.engine.souths().await {
        data.push(south_to_dto(&scheduler).await);
    }
    ok(data)
}

pub async fn get_south(State(state): State<AppState>, Path(south_id): Path<String>) -> Response {
    match state.engine.south(&south_id).await {
        Some(scheduler) => ok(south_to_dto(&scheduler).await),
        None => not_found_error(&south_id),
    }
}

pub async fn get_south_metrics(
    State(state): State<AppState>,
    Path(south_id): Path<String>,
) -> Response {
    match state.engine.south(&south_id).await {
        Some(scheduler) => ok(scheduler.metrics().snapshot()),
        None => not_found_error(&south_id),
    }
}

/// 历史补采可能持续较久，校验后在后台执行，结果写入日志。
pub async fn run_south_history(
    State(state): State<AppState>,
    Path(south_id): Path<String>,
    Json(req): Json<HistoryRequest>,
) -> Response {
    if req.start_ms >= req.end_ms {
        return bad_request_error("startMs must be before endMs");
    }
    let Some(scheduler) = state.engine.south(&south_id).await else {
        return not_found_error(&south_id);
    };
    if scheduler.state().await != SchedulerState::Running {
        return conflict_error(format!("south {} is not running", south_id));
    }
    tokio::spawn(async move {
        if let Err(err) = scheduler.run_history(req.start_ms, req.end_ms).await {
            warn!(
                target: "fg.gateway",
                south_id = %scheduler.south_id(),
                error = %err,
                "history_request_failed"
            );
        }
    });
    StatusCode::ACCEPTED.into_response()
}
