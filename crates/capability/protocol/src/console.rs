//! 控制台北向：把收到的内容摘要写入日志，用于调试与联调。

use async_trait::async_trait;
use domain::CacheContent;
use fg_north::{NorthConnector, NorthError};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsoleSettings {
    /// 为 true 时逐条输出时序值
    #[serde(default)]
    pub verbose: bool,
}

pub struct ConsoleNorth {
    north_id: String,
    settings: ConsoleSettings,
}

impl ConsoleNorth {
    pub fn new(north_id: &str, settings: ConsoleSettings) -> Self {
        Self {
            north_id: north_id.to_string(),
            settings,
        }
    }

    pub fn from_settings(
        north_id: &str,
        settings: &serde_json::Value,
    ) -> Result<Self, crate::ProtocolError> {
        Ok(Self::new(
            north_id,
            crate::types::parse_settings(settings, "console settings")?,
        ))
    }
}

#[async_trait]
impl NorthConnector for ConsoleNorth {
    async fn handle_content(&self, content: &CacheContent) -> Result<(), NorthError> {
        match content {
            CacheContent::TimeValues { values } => {
                info!(target: "fg.console", north_id = %self.north_id, values = values.len(), "values_received");
                if self.settings.verbose {
                    for value in values {
                        info!(
                            target: "fg.console",
                            north_id = %self.north_id,
                            point_id = %value.point_id,
                            ts = value.ts_ms,
                            value = %value.value,
                            "value"
                        );
                    }
                }
            }
            CacheContent::Raw { path } => {
                let size = tokio::fs::metadata(path).await?.len();
                info!(
                    target: "fg.console",
                    north_id = %self.north_id,
                    file = %path.display(),
                    size_bytes = size,
                    "file_received"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{TimeValue, TimeValueData};

    #[tokio::test]
    async fn accepts_values_and_existing_files() {
        let north = ConsoleNorth::from_settings("console", &serde_json::json!({ "verbose": true }))
            .expect("settings");
        north
            .handle_content(&CacheContent::TimeValues {
                values: vec![TimeValue::new("p", 1, TimeValueData::Bool(true))],
            })
            .await
            .expect("values");

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"abc").expect("write");
        north
            .handle_content(&CacheContent::Raw { path: path.clone() })
            .await
            .expect("file");

        std::fs::remove_file(&path).expect("remove");
        let err = north
            .handle_content(&CacheContent::Raw { path })
            .await
            .expect_err("missing file");
        assert!(matches!(err, NorthError::Io(_)));
    }
}
