//! 健康检查与网关状态
//!
//! - GET /health
//! - GET /status

use crate::AppState;
use crate::utils::ok;
use api_contract::GatewayStatusDto;
use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

pub async fn get_status(State(state): State<AppState>) -> Response {
    ok(GatewayStatusDto {
        version: env!("CARGO_PKG_VERSION").to_string(),
        started_at_ms: state.started_at_ms,
        south_count: state.engine.souths().await.len(),
        north_count: state.engine.norths().await.len(),
    })
}
