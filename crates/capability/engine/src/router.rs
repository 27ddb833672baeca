//! 南向输出到北向缓存的路由。

use async_trait::async_trait;
use domain::TimeValue;
use fg_north::{NorthError, NorthRuntime};
use fg_south::{ContentSink, SouthError};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// 按订阅关系把南向内容分发到各北向缓存。
///
/// 单个北向写入失败不影响其他北向；只要有一个订阅方未接受，调用即返回错误，
/// 由南向保留源数据。
#[derive(Default)]
pub struct EngineRouter {
    norths: RwLock<BTreeMap<String, Arc<NorthRuntime>>>,
}

impl EngineRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, north: Arc<NorthRuntime>) {
        self.norths
            .write()
            .await
            .insert(north.id().to_string(), north);
    }

    pub async fn remove(&self, north_id: &str) -> Option<Arc<NorthRuntime>> {
        self.norths.write().await.remove(north_id)
    }

    pub async fn get(&self, north_id: &str) -> Option<Arc<NorthRuntime>> {
        self.norths.read().await.get(north_id).cloned()
    }

    pub async fn list(&self) -> Vec<Arc<NorthRuntime>> {
        self.norths.read().await.values().cloned().collect()
    }

    async fn targets(&self, source_id: &str) -> Vec<Arc<NorthRuntime>> {
        self.norths
            .read()
            .await
            .values()
            .filter(|north| north.is_subscribed(source_id))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ContentSink for EngineRouter {
    async fn add_values(&self, source_id: &str, values: Vec<TimeValue>) -> Result<(), SouthError> {
        let targets = self.targets(source_id).await;
        if targets.is_empty() {
            debug!(target: "fg.engine", source_id = %source_id, values = values.len(), "no_north_subscribed");
            return Ok(());
        }
        let mut first_error = None;
        for north in targets {
            if let Err(err) = north.add_values(source_id, values.clone()).await {
                warn!(
                    target: "fg.engine",
                    source_id = %source_id,
                    north_id = %north.id(),
                    error = %err,
                    "route_values_failed"
                );
                first_error.get_or_insert_with(|| routing_error(north.id(), err));
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn add_file(&self, source_id: &str, path: &Path) -> Result<(), SouthError> {
        let targets = self.targets(source_id).await;
        if targets.is_empty() {
            debug!(target: "fg.engine", source_id = %source_id, file = %path.display(), "no_north_subscribed");
            return Ok(());
        }
        let mut first_error = None;
        for north in targets {
            if let Err(err) = north.add_file(source_id, path).await {
                warn!(
                    target: "fg.engine",
                    source_id = %source_id,
                    north_id = %north.id(),
                    file = %path.display(),
                    error = %err,
                    "route_file_failed"
                );
                first_error.get_or_insert_with(|| routing_error(north.id(), err));
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

fn routing_error(north_id: &str, err: NorthError) -> SouthError {
    match err {
        NorthError::Io(message) => SouthError::Io(format!("north {}: {}", north_id, message)),
        other => SouthError::Storage(format!("north {}: {}", north_id, other)),
    }
}
