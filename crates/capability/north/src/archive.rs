//! 已发送文件的归档与保留期清理。
//!
//! 归档失败只记录日志：发送已被确认，不回滚。

use crate::error::NorthError;
use fg_config::ArchiveSettings;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 启动后首次清理的延迟。
const FIRST_SWEEP_DELAY: Duration = Duration::from_secs(10);

/// 归档目录中的文件。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivedFile {
    pub name: String,
    pub size_bytes: u64,
    pub modified_ms: i64,
}

pub struct ArchiveManager {
    north_id: String,
    folder: PathBuf,
    settings: ArchiveSettings,
}

impl ArchiveManager {
    pub fn new(north_id: &str, folder: PathBuf, settings: ArchiveSettings) -> Self {
        Self {
            north_id: north_id.to_string(),
            folder,
            settings,
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn enabled(&self) -> bool {
        self.settings.enabled
    }

    /// 发送成功后：启用归档则移入归档目录，否则删除。
    pub async fn archive_or_remove(&self, path: &Path) {
        if self.settings.enabled {
            match crate::buffer::move_into(path, &self.folder).await {
                Ok(target) => debug!(
                    target: "fg.north",
                    north_id = %self.north_id,
                    file = %target.display(),
                    "file_archived"
                ),
                Err(err) => warn!(
                    target: "fg.north",
                    north_id = %self.north_id,
                    file = %path.display(),
                    error = %err,
                    "file_archive_failed"
                ),
            }
        } else {
            crate::buffer::remove_file_logged(&self.north_id, path).await;
        }
    }

    /// 删除超过保留期的归档文件，返回删除数量。
    pub async fn sweep(&self) -> usize {
        if self.settings.retention_duration_hours == 0 {
            return 0;
        }
        let retention = Duration::from_secs(self.settings.retention_duration_hours * 3600);
        match SystemTime::now().checked_sub(retention) {
            Some(cutoff) => self.sweep_before(cutoff).await,
            None => 0,
        }
    }

    /// 删除修改时间早于 `cutoff` 的归档文件。
    pub async fn sweep_before(&self, cutoff: SystemTime) -> usize {
        let mut removed = 0;
        let mut entries = match tokio::fs::read_dir(&self.folder).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(
                    target: "fg.north",
                    north_id = %self.north_id,
                    error = %err,
                    "archive_sweep_failed"
                );
                return 0;
            }
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let expired = metadata
                .modified()
                .map(|modified| modified < cutoff)
                .unwrap_or(false);
            if expired {
                crate::buffer::remove_file_logged(&self.north_id, &entry.path()).await;
                removed += 1;
            }
        }
        if removed > 0 {
            info!(
                target: "fg.north",
                north_id = %self.north_id,
                removed,
                "archive_swept"
            );
        }
        removed
    }

    pub async fn list_archive(&self) -> Result<Vec<ArchivedFile>, NorthError> {
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.folder).await?;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let modified_ms = metadata
                .modified()
                .ok()
                .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
                .map(|elapsed| elapsed.as_millis() as i64)
                .unwrap_or_default();
            files.push(ArchivedFile {
                name: entry.file_name().to_string_lossy().into_owned(),
                size_bytes: metadata.len(),
                modified_ms,
            });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    /// 归档目录中某文件的路径；拒绝带路径分隔符的名字。
    pub fn archived_path(&self, name: &str) -> Result<PathBuf, NorthError> {
        let candidate = Path::new(name);
        if candidate.components().count() != 1 || candidate.file_name().is_none() {
            return Err(NorthError::Io(format!("invalid archive file name: {}", name)));
        }
        Ok(self.folder.join(candidate))
    }

    pub async fn remove_archived(&self, names: &[String]) -> Result<usize, NorthError> {
        let mut removed = 0;
        for name in names {
            let path = self.archived_path(name)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(removed)
    }

    /// 后台周期清理：首次延迟 10 秒，之后每 `interval` 一次。
    pub fn spawn_sweeper(
        self: std::sync::Arc<Self>,
        interval: Duration,
        mut stop: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut delay = FIRST_SWEEP_DELAY;
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = stop.changed() => break,
                }
                if *stop.borrow() {
                    break;
                }
                self.sweep().await;
                delay = interval;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(folder: &Path, enabled: bool, hours: u64) -> ArchiveManager {
        ArchiveManager::new(
            "north-test",
            folder.to_path_buf(),
            ArchiveSettings {
                enabled,
                retention_duration_hours: hours,
            },
        )
    }

    #[tokio::test]
    async fn sweep_removes_only_files_older_than_cutoff() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = manager(dir.path(), true, 1);
        std::fs::write(dir.path().join("a.csv"), b"a").expect("write");
        std::fs::write(dir.path().join("b.csv"), b"b").expect("write");

        assert_eq!(archive.sweep().await, 0);
        let future = SystemTime::now() + Duration::from_secs(60);
        assert_eq!(archive.sweep_before(future).await, 2);
        assert!(archive.list_archive().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn zero_retention_keeps_forever() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = manager(dir.path(), true, 0);
        std::fs::write(dir.path().join("a.csv"), b"a").expect("write");
        assert_eq!(archive.sweep().await, 0);
        assert_eq!(archive.list_archive().await.expect("list").len(), 1);
    }

    #[test]
    fn archived_path_rejects_traversal() {
        let archive = manager(Path::new("/tmp/archive"), true, 0);
        assert!(archive.archived_path("../cache.db").is_err());
        assert!(archive.archived_path("a/b.csv").is_err());
        assert!(archive.archived_path("b.csv").is_ok());
    }
}
