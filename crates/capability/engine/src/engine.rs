//! 连接器注册表与生命周期。
//!
//! 北向先于南向启动，停止顺序相反，保证南向产出的内容总有缓存可写。
//! 单个连接器启动失败只记录并跳过，不影响其他连接器。

use crate::error::EngineError;
use crate::factory::ConnectorFactory;
use crate::router::EngineRouter;
use domain::ScanMode;
use fg_config::{GatewayConfig, NorthConnectorConfig, SouthConnectorConfig};
use fg_north::NorthRuntime;
use fg_south::{AcquisitionScheduler, StaticScanModes};
use fg_storage::SqliteCheckpointStore;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info};

/// 启动失败的连接器。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorFailure {
    pub id: String,
    pub reason: String,
}

/// 一次整体启动的结果。
#[derive(Debug, Clone, Default)]
pub struct EngineReport {
    pub started_north: Vec<String>,
    pub started_south: Vec<String>,
    pub failed: Vec<ConnectorFailure>,
}

pub struct Engine {
    data_folder: PathBuf,
    sweep_interval: Duration,
    factory: Arc<dyn ConnectorFactory>,
    scan_modes: Arc<StaticScanModes>,
    router: Arc<EngineRouter>,
    souths: Mutex<BTreeMap<String, AcquisitionScheduler>>,
}

impl Engine {
    pub fn new(
        data_folder: PathBuf,
        sweep_interval: Duration,
        scan_modes: Vec<ScanMode>,
        factory: Arc<dyn ConnectorFactory>,
    ) -> Self {
        Self {
            data_folder,
            sweep_interval,
            factory,
            scan_modes: Arc::new(StaticScanModes::new(scan_modes)),
            router: Arc::new(EngineRouter::new()),
            souths: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn router(&self) -> Arc<EngineRouter> {
        self.router.clone()
    }

    /// 启动配置中所有启用的连接器。
    pub async fn start(&self, config: &GatewayConfig) -> EngineReport {
        let mut report = EngineReport::default();
        for north in config.north.iter().filter(|north| north.enabled) {
            match self.start_north(north).await {
                Ok(()) => report.started_north.push(north.id.clone()),
                Err(err) => report.failed.push(self.failure(&north.id, "north", err)),
            }
        }
        for south in config.south.iter().filter(|south| south.enabled) {
            match self.start_south(south).await {
                Ok(()) => report.started_south.push(south.id.clone()),
                Err(err) => report.failed.push(self.failure(&south.id, "south", err)),
            }
        }
        info!(
            target: "fg.engine",
            north = report.started_north.len(),
            south = report.started_south.len(),
            failed = report.failed.len(),
            "engine_started"
        );
        report
    }

    fn failure(&self, id: &str, direction: &str, err: EngineError) -> ConnectorFailure {
        error!(
            target: "fg.engine",
            connector_id = %id,
            direction,
            error = %err,
            "connector_start_failed"
        );
        ConnectorFailure {
            id: id.to_string(),
            reason: err.to_string(),
        }
    }

    pub async fn start_north(&self, config: &NorthConnectorConfig) -> Result<(), EngineError> {
        config.validate()?;
        if self.router.get(&config.id).await.is_some() {
            return Err(EngineError::Duplicate(config.id.clone()));
        }
        let connector = self.factory.create_north(config)?;
        let runtime =
            NorthRuntime::open_in(config, connector, &self.data_folder, self.sweep_interval)
                .await?;
        runtime.start().await?;
        self.router.insert(Arc::new(runtime)).await;
        Ok(())
    }

    pub async fn start_south(&self, config: &SouthConnectorConfig) -> Result<(), EngineError> {
        config.validate()?;
        let mut souths = self.souths.lock().await;
        if souths.contains_key(&config.id) {
            return Err(EngineError::Duplicate(config.id.clone()));
        }
        let connector = self.factory.create_south(config)?;
        let checkpoints = SqliteCheckpointStore::open(
            &self
                .data_folder
                .join(format!("south-{}", config.id))
                .join("cache.db"),
        )
        .await?;
        let scheduler = AcquisitionScheduler::new(
            config,
            connector,
            self.scan_modes.clone(),
            Arc::new(checkpoints),
            self.router.clone(),
        );
        scheduler.start().await?;
        souths.insert(config.id.clone(), scheduler);
        Ok(())
    }

    pub async fn stop_south(&self, south_id: &str) -> Result<(), EngineError> {
        let scheduler = self
            .souths
            .lock()
            .await
            .remove(south_id)
            .ok_or_else(|| EngineError::NotFound(south_id.to_string()))?;
        scheduler.stop().await;
        Ok(())
    }

    pub async fn stop_north(&self, north_id: &str) -> Result<(), EngineError> {
        let runtime = self
            .router
            .remove(north_id)
            .await
            .ok_or_else(|| EngineError::NotFound(north_id.to_string()))?;
        runtime.stop().await?;
        Ok(())
    }

    /// 先停南向，再停北向（等待在途发送结束）。
    pub async fn stop(&self) {
        let souths: Vec<AcquisitionScheduler> = {
            let mut souths = self.souths.lock().await;
            std::mem::take(&mut *souths).into_values().collect()
        };
        for scheduler in souths {
            scheduler.stop().await;
        }
        for north in self.router.list().await {
            self.router.remove(north.id()).await;
            if let Err(err) = north.stop().await {
                error!(target: "fg.engine", north_id = %north.id(), error = %err, "north_stop_failed");
            }
        }
        info!(target: "fg.engine", "engine_stopped");
    }

    pub async fn south(&self, south_id: &str) -> Option<AcquisitionScheduler> {
        self.souths.lock().await.get(south_id).cloned()
    }

    pub async fn souths(&self) -> Vec<AcquisitionScheduler> {
        self.souths.lock().await.values().cloned().collect()
    }

    pub async fn north(&self, north_id: &str) -> Option<Arc<NorthRuntime>> {
        self.router.get(north_id).await
    }

    pub async fn norths(&self) -> Vec<Arc<NorthRuntime>> {
        self.router.list().await
    }
}
