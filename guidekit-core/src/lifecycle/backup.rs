//! Timestamped snapshots taken before destructive writes

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::error::{FrameworkError, Result};
use crate::gateway::FileGateway;

const BACKUP_MARKER: &str = ".backup-";

#[derive(Clone)]
pub struct BackupManager {
    gateway: Arc<dyn FileGateway>,
}

impl BackupManager {
    pub fn new(gateway: Arc<dyn FileGateway>) -> Self {
        Self { gateway }
    }

    /// Copy `path` to `<path>.backup-<timestamp>` beside it.
    ///
    /// The original is only ever read. Any failure is a `Backup` error.
    pub async fn backup(&self, path: &Path) -> Result<PathBuf> {
        let wrap = |source: FrameworkError| FrameworkError::Backup {
            path: path.to_path_buf(),
            source: Box::new(source),
        };

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                wrap(FrameworkError::io(
                    path,
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
                ))
            })?;

        let contents = self.gateway.read(path).await.map_err(wrap)?;

        // The name is claimed by create_new, so concurrent snapshots within
        // one millisecond fall through to the next counter
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%3f").to_string();
        let mut attempt = 0;
        let backup_path = loop {
            let candidate = if attempt == 0 {
                path.with_file_name(format!("{file_name}{BACKUP_MARKER}{stamp}"))
            } else {
                path.with_file_name(format!("{file_name}{BACKUP_MARKER}{stamp}-{attempt}"))
            };

            match self.gateway.create_new(&candidate, &contents).await {
                Ok(()) => break candidate,
                Err(e) if e.is_io_kind(std::io::ErrorKind::AlreadyExists) => attempt += 1,
                Err(e) => return Err(wrap(e)),
            }
        };

        info!("Backed up {} to {}", path.display(), backup_path.display());
        Ok(backup_path)
    }

    /// Existing snapshots of `path`, newest first
    pub async fn list_backups(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let (Some(dir), Some(file_name)) = (path.parent(), path.file_name()) else {
            return Ok(Vec::new());
        };

        let pattern = format!(
            "{}{BACKUP_MARKER}*",
            glob::Pattern::escape(&file_name.to_string_lossy())
        );

        let mut backups = self.gateway.list(dir, &pattern).await?;
        backups.sort_by(|a, b| b.cmp(a));
        Ok(backups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::LocalFileGateway;
    use futures::future::join_all;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn manager() -> BackupManager {
        BackupManager::new(Arc::new(LocalFileGateway::new()))
    }

    #[tokio::test]
    async fn test_backup_copies_and_keeps_original() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("tdd-bdd.md");
        std::fs::write(&target, "my edits").unwrap();

        let backup = manager().backup(&target).await.unwrap();

        assert_ne!(backup, target);
        assert_eq!(backup.parent(), target.parent());
        assert!(backup
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("tdd-bdd.md.backup-"));
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "my edits");
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "my edits");
    }

    #[tokio::test]
    async fn test_rapid_backups_never_collide() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("guide.md");
        std::fs::write(&target, "v1").unwrap();

        let manager = manager();
        let first = manager.backup(&target).await.unwrap();
        let second = manager.backup(&target).await.unwrap();
        let third = manager.backup(&target).await.unwrap();

        assert_ne!(first, second);
        assert_ne!(second, third);
        assert_eq!(manager.list_backups(&target).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_backups_get_distinct_names() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("guide.md");
        std::fs::write(&target, "precious").unwrap();

        let manager = manager();
        let backups: Vec<PathBuf> = join_all((0..8).map(|_| manager.backup(&target)))
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let distinct: HashSet<_> = backups.iter().collect();
        assert_eq!(distinct.len(), 8);
        assert_eq!(manager.list_backups(&target).await.unwrap().len(), 8);
        for backup in &backups {
            assert_eq!(std::fs::read_to_string(backup).unwrap(), "precious");
        }
    }

    #[tokio::test]
    async fn test_missing_source_is_backup_error() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("absent.md");

        let err = manager().backup(&target).await.unwrap_err();
        assert!(matches!(err, FrameworkError::Backup { .. }));
        assert!(err.is_io_kind(std::io::ErrorKind::NotFound));
        assert!(manager().list_backups(&target).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_backups_ignores_other_files() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("a[1].md");
        std::fs::write(&target, "x").unwrap();
        std::fs::write(temp_dir.path().join("b.md.backup-20240101T000000000"), "y").unwrap();

        let manager = manager();
        manager.backup(&target).await.unwrap();

        let backups = manager.list_backups(&target).await.unwrap();
        assert_eq!(backups.len(), 1);
    }
}
