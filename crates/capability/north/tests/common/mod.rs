#![allow(dead_code)]

use async_trait::async_trait;
use domain::{CacheContent, TimeValue, TimeValueData};
use fg_config::{ArchiveSettings, CachingSettings, NorthConnectorConfig, Subscriptions};
use fg_north::{NorthConnector, NorthError};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// 按脚本返回结果的北向连接器，记录每次尝试。
#[derive(Default)]
pub struct ScriptedConnector {
    pub attempts: Mutex<Vec<CacheContent>>,
    pub sent: Mutex<Vec<CacheContent>>,
    pub sent_files: Mutex<Vec<Vec<u8>>>,
    pub script: Mutex<VecDeque<NorthError>>,
    pub fail_every_second: bool,
    pub slow_attempts: Mutex<usize>,
    pub delay: Duration,
}

impl ScriptedConnector {
    pub fn failing(errors: Vec<NorthError>) -> Self {
        Self {
            script: Mutex::new(errors.into()),
            ..Self::default()
        }
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().expect("attempts").len()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("sent").len()
    }

    pub fn sent_values(&self) -> Vec<TimeValue> {
        self.sent
            .lock()
            .expect("sent")
            .iter()
            .filter_map(|content| match content {
                CacheContent::TimeValues { values } => Some(values.clone()),
                CacheContent::Raw { .. } => None,
            })
            .flatten()
            .collect()
    }
}

#[async_trait]
impl NorthConnector for ScriptedConnector {
    async fn handle_content(&self, content: &CacheContent) -> Result<(), NorthError> {
        let attempt = {
            let mut attempts = self.attempts.lock().expect("attempts");
            attempts.push(content.clone());
            attempts.len()
        };
        let slow = {
            let mut slow = self.slow_attempts.lock().expect("slow");
            if *slow > 0 {
                *slow -= 1;
                true
            } else {
                false
            }
        };
        if slow {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(err) = self.script.lock().expect("script").pop_front() {
            return Err(err);
        }
        if self.fail_every_second && attempt % 2 == 0 {
            return Err(NorthError::Transport("connection reset".to_string()));
        }
        if let CacheContent::Raw { path } = content {
            let bytes = std::fs::read(path).map_err(|err| NorthError::Io(err.to_string()))?;
            self.sent_files.lock().expect("files").push(bytes);
        }
        self.sent.lock().expect("sent").push(content.clone());
        Ok(())
    }
}

pub fn caching(group_count: usize, max_send_count: usize) -> CachingSettings {
    CachingSettings {
        send_interval_ms: 100,
        retry_interval_ms: 50,
        retry_count: 0,
        timeout_ms: 1000,
        group_count,
        max_send_count,
        max_size_mb: 0,
        archive: ArchiveSettings::default(),
    }
}

pub fn north_config(id: &str, caching: CachingSettings) -> NorthConnectorConfig {
    NorthConnectorConfig {
        id: id.to_string(),
        name: format!("{} connector", id),
        kind: "test".to_string(),
        enabled: true,
        settings: serde_json::Value::Null,
        caching,
        subscriptions: Subscriptions::All,
    }
}

pub fn value(ts_ms: i64) -> TimeValue {
    TimeValue::new("point-1", ts_ms, TimeValueData::I64(ts_ms))
}

/// 轮询直到条件成立或超时。
pub async fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
