//! 采集网关进程：加载配置、启动引擎、提供管理 API，ctrl-c 后有序停止。

mod handlers;
mod middleware;
mod routes;
mod utils;

use domain::now_epoch_ms;
use fg_config::{AppConfig, GatewayConfig};
use fg_engine::Engine;
use fg_protocol::ProtocolFactory;
use fg_telemetry::init_tracing;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub started_at_ms: i64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    init_tracing();

    let gateway = GatewayConfig::load(&config.connectors_file)?;
    let engine = Arc::new(Engine::new(
        config.data_folder.clone(),
        Duration::from_secs(config.archive_sweep_seconds),
        gateway.scan_modes.clone(),
        Arc::new(ProtocolFactory),
    ));

    let report = engine.start(&gateway).await;
    for failure in &report.failed {
        warn!(target: "fg.gateway", connector_id = %failure.id, reason = %failure.reason, "connector_skipped");
    }
    info!(
        target: "fg.gateway",
        north = report.started_north.len(),
        south = report.started_south.len(),
        failed = report.failed.len(),
        data_folder = %config.data_folder.display(),
        "gateway_started"
    );

    let state = AppState {
        engine: engine.clone(),
        started_at_ms: now_epoch_ms(),
    };

    if config.admin_enabled {
        let listener = tokio::net::TcpListener::bind(&config.admin_addr).await?;
        info!(target: "fg.gateway", addr = %config.admin_addr, "admin_api_listening");
        axum::serve(listener, routes::create_app(state))
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    } else {
        shutdown_signal().await;
    }

    // 先停南向，再停北向（等待在途发送结束）
    engine.stop().await;
    info!(target: "fg.gateway", "gateway_stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(target: "fg.gateway", error = %err, "shutdown_signal_failed");
    }
    info!(target: "fg.gateway", "shutdown_requested");
}
