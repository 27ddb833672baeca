//! 路由定义
//!
//! 管理 API 挂在 `/api` 下：
//! - 状态：/status
//! - 南向：/south/*
//! - 北向与缓存管理：/north/*

use crate::AppState;
use crate::handlers::*;
use crate::middleware::request_context;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// 创建管理 API 路由
pub fn create_admin_router() -> Router<AppState> {
    Router::new()
        .route("/status", get(get_status))
        .route("/south", get(list_souths))
        .route("/south/:south_id", get(get_south))
        .route("/south/:south_id/metrics", get(get_south_metrics))
        .route("/south/:south_id/history", post(run_south_history))
        .route("/north", get(list_norths))
        .route("/north/:north_id/metrics", get(get_north_metrics))
        .route("/north/:north_id/retry", post(force_north_retry))
        .route("/north/:north_id/cache/pending", get(list_pending))
        .route("/north/:north_id/cache/pending/remove", post(remove_pending))
        .route("/north/:north_id/cache/errored", get(list_errored))
        .route("/north/:north_id/cache/errored/retry", post(retry_errored))
        .route("/north/:north_id/cache/errored/remove", post(remove_errored))
        .route("/north/:north_id/archive", get(list_archive))
        .route("/north/:north_id/archive/retry", post(retry_archived))
        .route("/north/:north_id/archive/remove", post(remove_archived))
}

/// 完整应用：健康检查 + `/api` + 追踪中间件
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", create_admin_router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // 注入 request_id/trace_id
        .layer(middleware::from_fn(request_context))
}
