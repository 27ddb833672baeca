//! 文件夹适配：南向扫描输入目录、北向写出到输出目录。

use crate::error::ProtocolError;
use crate::types::parse_settings;
use async_trait::async_trait;
use domain::{CacheContent, SouthItem, now_epoch_ms};
use fg_north::{NorthConnector, NorthError};
use fg_south::{SouthCapabilities, SouthConnector, SouthError, SouthSink};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct FolderScannerSettings {
    pub input_folder: PathBuf,
    /// 修改时间距今不足该值的文件视为仍在写入，跳过。
    #[serde(default)]
    pub min_age_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FolderItemSettings {
    #[serde(default)]
    suffix: String,
}

/// 扫描输入目录，把匹配的文件交给缓存后删除源文件。
pub struct FolderScannerSouth {
    south_id: String,
    settings: FolderScannerSettings,
}

impl FolderScannerSouth {
    pub fn from_settings(south_id: &str, settings: &serde_json::Value) -> Result<Self, ProtocolError> {
        Ok(Self {
            south_id: south_id.to_string(),
            settings: parse_settings(settings, "folder-scanner settings")?,
        })
    }

    fn old_enough(&self, modified: Option<SystemTime>) -> bool {
        if self.settings.min_age_ms == 0 {
            return true;
        }
        modified
            .and_then(|modified| modified.elapsed().ok())
            .map(|age| age >= Duration::from_millis(self.settings.min_age_ms))
            .unwrap_or(false)
    }

    async fn matching_files(&self, suffixes: &[String]) -> Result<Vec<PathBuf>, ProtocolError> {
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.settings.input_folder).await?;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() || !self.old_enough(metadata.modified().ok()) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if suffixes.iter().any(|suffix| name.ends_with(suffix.as_str())) {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl SouthConnector for FolderScannerSouth {
    fn capabilities(&self) -> SouthCapabilities {
        SouthCapabilities {
            last_file: true,
            ..Default::default()
        }
    }

    async fn connect(&self) -> Result<(), SouthError> {
        if !tokio::fs::try_exists(&self.settings.input_folder).await? {
            return Err(SouthError::Connection(format!(
                "input folder {} does not exist",
                self.settings.input_folder.display()
            )));
        }
        Ok(())
    }

    async fn file_query(&self, items: &[SouthItem], sink: &SouthSink) -> Result<(), SouthError> {
        let mut suffixes = Vec::with_capacity(items.len());
        for item in items {
            let settings: FolderItemSettings = parse_settings(&item.settings, &item.id)?;
            suffixes.push(settings.suffix);
        }
        let files = self.matching_files(&suffixes).await?;
        for path in &files {
            sink.add_file(path).await?;
            if let Err(err) = tokio::fs::remove_file(path).await {
                warn!(
                    target: "fg.protocol",
                    south_id = %self.south_id,
                    file = %path.display(),
                    error = %err,
                    "scanned_file_remove_failed"
                );
            }
        }
        if !files.is_empty() {
            info!(target: "fg.protocol", south_id = %self.south_id, files = files.len(), "folder_scanned");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileWriterSettings {
    pub output_folder: PathBuf,
    #[serde(default)]
    pub prefix: String,
}

/// 时序值写为 JSON 文件，缓存文件复制到输出目录。
pub struct FileWriterNorth {
    north_id: String,
    settings: FileWriterSettings,
    counter: AtomicU64,
}

impl FileWriterNorth {
    pub fn from_settings(north_id: &str, settings: &serde_json::Value) -> Result<Self, ProtocolError> {
        Ok(Self {
            north_id: north_id.to_string(),
            settings: parse_settings(settings, "file-writer settings")?,
            counter: AtomicU64::new(0),
        })
    }

    fn target_for(&self, source: &Path) -> Result<PathBuf, NorthError> {
        let name = source
            .file_name()
            .ok_or_else(|| NorthError::Io(format!("invalid cache file: {}", source.display())))?;
        Ok(self.settings.output_folder.join(format!(
            "{}{}",
            self.settings.prefix,
            name.to_string_lossy()
        )))
    }
}

#[async_trait]
impl NorthConnector for FileWriterNorth {
    async fn connect(&self) -> Result<(), NorthError> {
        tokio::fs::create_dir_all(&self.settings.output_folder)
            .await
            .map_err(|e| NorthError::Transport(e.to_string()))
    }

    /// 缓存文件缺失是永久错误；写出目录不可用可重试。
    async fn handle_content(&self, content: &CacheContent) -> Result<(), NorthError> {
        match content {
            CacheContent::TimeValues { values } => {
                let body = serde_json::to_vec_pretty(values)?;
                let index = self.counter.fetch_add(1, Ordering::Relaxed);
                let target = self.settings.output_folder.join(format!(
                    "{}values-{}-{}.json",
                    self.settings.prefix,
                    now_epoch_ms(),
                    index
                ));
                tokio::fs::write(&target, body)
                    .await
                    .map_err(|e| NorthError::Transport(e.to_string()))?;
                debug!(target: "fg.protocol", north_id = %self.north_id, file = %target.display(), values = values.len(), "values_written");
            }
            CacheContent::Raw { path } => {
                if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                    return Err(NorthError::Io(format!("cache file missing: {}", path.display())));
                }
                let target = self.target_for(path)?;
                tokio::fs::copy(path, &target)
                    .await
                    .map_err(|e| NorthError::Transport(e.to_string()))?;
                debug!(target: "fg.protocol", north_id = %self.north_id, file = %target.display(), "file_written");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{TimeValue, TimeValueData};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct CollectingSink {
        files: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl fg_south::ContentSink for CollectingSink {
        async fn add_values(&self, _source_id: &str, _values: Vec<TimeValue>) -> Result<(), SouthError> {
            Ok(())
        }

        async fn add_file(&self, _source_id: &str, path: &Path) -> Result<(), SouthError> {
            let bytes = std::fs::read(path)?;
            self.files.lock().expect("files").push(bytes);
            Ok(())
        }
    }

    struct RejectingSink;

    #[async_trait]
    impl fg_south::ContentSink for RejectingSink {
        async fn add_values(&self, _source_id: &str, _values: Vec<TimeValue>) -> Result<(), SouthError> {
            Ok(())
        }

        async fn add_file(&self, _source_id: &str, _path: &Path) -> Result<(), SouthError> {
            Err(SouthError::Storage("north north-1: disk full".to_string()))
        }
    }

    fn item(id: &str, suffix: &str) -> SouthItem {
        SouthItem {
            id: id.to_string(),
            name: id.to_string(),
            scan_mode_id: "every-minute".to_string(),
            enabled: true,
            settings: serde_json::json!({ "suffix": suffix }),
        }
    }

    #[tokio::test]
    async fn scanner_hands_matching_files_over_and_removes_them() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.csv"), b"a").expect("write");
        std::fs::write(dir.path().join("b.txt"), b"b").expect("write");
        let south = FolderScannerSouth::from_settings(
            "south-1",
            &serde_json::json!({ "input_folder": dir.path() }),
        )
        .expect("settings");
        south.connect().await.expect("connect");

        let collected = Arc::new(CollectingSink::default());
        let sink = SouthSink::new(
            "south-1",
            collected.clone(),
            Arc::new(fg_telemetry::SouthMetrics::new()),
        );
        south
            .file_query(&[item("csv", ".csv")], &sink)
            .await
            .expect("scan");

        assert_eq!(collected.files.lock().expect("files").clone(), vec![b"a".to_vec()]);
        assert!(!dir.path().join("a.csv").exists());
        assert!(dir.path().join("b.txt").exists());
    }

    #[tokio::test]
    async fn scanner_keeps_files_the_cache_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.csv"), b"a").expect("write");
        let south = FolderScannerSouth::from_settings(
            "south-1",
            &serde_json::json!({ "input_folder": dir.path() }),
        )
        .expect("settings");
        let sink = SouthSink::new(
            "south-1",
            Arc::new(RejectingSink),
            Arc::new(fg_telemetry::SouthMetrics::new()),
        );

        let err = south
            .file_query(&[item("csv", ".csv")], &sink)
            .await
            .expect_err("rejected");
        assert!(matches!(err, SouthError::Storage(_)));
        assert!(dir.path().join("a.csv").exists());
    }

    #[tokio::test]
    async fn scanner_requires_existing_folder() {
        let dir = tempfile::tempdir().expect("tempdir");
        let south = FolderScannerSouth::from_settings(
            "south-1",
            &serde_json::json!({ "input_folder": dir.path().join("missing") }),
        )
        .expect("settings");
        assert!(matches!(south.connect().await, Err(SouthError::Connection(_))));
    }

    #[tokio::test]
    async fn writer_outputs_values_and_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("out");
        let north = FileWriterNorth::from_settings(
            "north-1",
            &serde_json::json!({ "output_folder": output, "prefix": "gw-" }),
        )
        .expect("settings");
        north.connect().await.expect("connect");

        north
            .handle_content(&CacheContent::TimeValues {
                values: vec![TimeValue::new("p", 1, TimeValueData::I64(7))],
            })
            .await
            .expect("write values");
        let cached = dir.path().join("report-1.csv");
        std::fs::write(&cached, b"x").expect("write cached");
        north
            .handle_content(&CacheContent::Raw { path: cached.clone() })
            .await
            .expect("write file");

        assert!(output.join("gw-report-1.csv").exists());
        let written = std::fs::read_dir(&output).expect("read dir").count();
        assert_eq!(written, 2);

        std::fs::remove_file(&cached).expect("remove");
        let err = north
            .handle_content(&CacheContent::Raw { path: cached })
            .await
            .expect_err("missing");
        assert!(!err.default_retryable());
    }
}
