//! File gateway - the only path through which the lifecycle touches disk
//!
//! All operations are atomic at single-file granularity. No cross-file
//! transactionality is provided.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::error::{FrameworkError, Result};

/// File-system operations consumed by the catalog, state store and lifecycle
#[async_trait]
pub trait FileGateway: Send + Sync {
    async fn exists(&self, path: &Path) -> bool;

    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Replace the contents of `path`. The parent directory must exist.
    async fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// Create `path` with `contents`, failing with `AlreadyExists` if it is
    /// already there. Two concurrent callers never both succeed.
    async fn create_new(&self, path: &Path, contents: &[u8]) -> Result<()>;

    async fn copy(&self, src: &Path, dst: &Path) -> Result<()>;

    async fn delete(&self, path: &Path) -> Result<()>;

    async fn ensure_dir(&self, path: &Path) -> Result<()>;

    /// Files directly inside `dir` whose name matches the glob `pattern`, sorted.
    /// A missing directory yields an empty list.
    async fn list(&self, dir: &Path, pattern: &str) -> Result<Vec<PathBuf>>;
}

/// Gateway backed by the local file system via `tokio::fs`
#[derive(Debug, Clone, Default)]
pub struct LocalFileGateway;

impl LocalFileGateway {
    pub fn new() -> Self {
        Self
    }

    fn temp_path_for(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::now_v7()))
    }
}

#[async_trait]
impl FileGateway for LocalFileGateway {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(|e| FrameworkError::io(path, e))
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        // Write beside the target then rename so readers never see a partial file
        let temp = Self::temp_path_for(path);
        if let Err(e) = tokio::fs::write(&temp, contents).await {
            return Err(FrameworkError::io(path, e));
        }

        if let Err(e) = tokio::fs::rename(&temp, path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(FrameworkError::io(path, e));
        }

        Ok(())
    }

    async fn create_new(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
            .map_err(|e| FrameworkError::io(path, e))?;

        let written = match file.write_all(contents).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            drop(file);
            let _ = tokio::fs::remove_file(path).await;
            return Err(FrameworkError::io(path, e));
        }

        Ok(())
    }

    async fn copy(&self, src: &Path, dst: &Path) -> Result<()> {
        let contents = self.read(src).await?;
        self.write(dst, &contents).await
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| FrameworkError::io(path, e))
    }

    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| FrameworkError::io(path, e))
    }

    async fn list(&self, dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
        let matcher = glob::Pattern::new(pattern).map_err(|e| {
            FrameworkError::io(
                dir,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()),
            )
        })?;

        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(FrameworkError::io(dir, e)),
        };

        let mut matches = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| FrameworkError::io(dir, e))?
        {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_file && matcher.matches(&entry.file_name().to_string_lossy()) {
                matches.push(entry.path());
            }
        }

        matches.sort();
        Ok(matches)
    }
}
