//! Installed-state tracking (.guidekit/installed.json)
//!
//! Records which frameworks are installed in the workspace, at which
//! version, and whether the installed copy has been customized.
//!
//! The store keeps a short-lived in-memory copy of the file so bursts of
//! read-only calls (listing, searching, update checks) do not re-read it.
//! All writers go through a single async mutex so concurrent lifecycle
//! operations cannot lose each other's records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{FrameworkError, Result};
use crate::gateway::FileGateway;

/// Default cache TTL (5 seconds)
pub const DEFAULT_STATE_TTL: Duration = Duration::from_secs(5);

/// One installed framework
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledRecord {
    pub id: String,

    /// Version that was installed; may lag the catalog
    pub version: String,

    pub installed_at: DateTime<Utc>,

    pub customized: bool,

    /// Present iff `customized`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customized_at: Option<DateTime<Utc>>,

    /// Target file name captured at install time, used when the catalog
    /// entry has since disappeared
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl InstalledRecord {
    /// A fresh, uncustomized record
    pub fn new(id: &str, version: &str, file_name: &str) -> Self {
        Self {
            id: id.to_string(),
            version: version.to_string(),
            installed_at: Utc::now(),
            customized: false,
            customized_at: None,
            file_name: Some(file_name.to_string()),
        }
    }
}

/// Everything installed in the workspace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstalledState {
    #[serde(default)]
    pub frameworks: Vec<InstalledRecord>,
}

impl InstalledState {
    pub fn get(&self, id: &str) -> Option<&InstalledRecord> {
        self.frameworks.iter().find(|r| r.id == id)
    }

    pub fn is_installed(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Insert or replace the record with the same id
    pub fn upsert(&mut self, record: InstalledRecord) {
        match self.frameworks.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => self.frameworks.push(record),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<InstalledRecord> {
        let index = self.frameworks.iter().position(|r| r.id == id)?;
        Some(self.frameworks.remove(index))
    }

    /// Flag a record as customized. Returns false when `id` is not installed.
    pub fn mark_customized(&mut self, id: &str, at: DateTime<Utc>) -> bool {
        match self.frameworks.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.customized = true;
                record.customized_at = Some(at);
                true
            }
            None => false,
        }
    }

    /// Clear the customized flag. Returns false when `id` is not installed.
    pub fn clear_customized(&mut self, id: &str) -> bool {
        match self.frameworks.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.customized = false;
                record.customized_at = None;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.frameworks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frameworks.is_empty()
    }

    /// Collapse duplicate ids, keeping the last occurrence
    fn dedupe(&mut self) -> usize {
        let before = self.frameworks.len();
        let mut kept: Vec<InstalledRecord> = Vec::with_capacity(before);
        for record in self.frameworks.drain(..) {
            kept.retain(|r| r.id != record.id);
            kept.push(record);
        }
        self.frameworks = kept;
        before - self.frameworks.len()
    }
}

struct CachedState {
    state: InstalledState,
    loaded_at: Instant,
}

/// Owns the persisted installed-state file and its TTL cache
pub struct InstalledStateStore {
    path: PathBuf,
    ttl: Duration,
    gateway: Arc<dyn FileGateway>,
    cache: Mutex<Option<CachedState>>,
    /// Serializes every read-modify-write of the persisted file
    writer: Mutex<()>,
}

impl InstalledStateStore {
    pub fn new(path: impl Into<PathBuf>, gateway: Arc<dyn FileGateway>) -> Self {
        Self::with_ttl(path, gateway, DEFAULT_STATE_TTL)
    }

    pub fn with_ttl(path: impl Into<PathBuf>, gateway: Arc<dyn FileGateway>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
            gateway,
            cache: Mutex::new(None),
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached state if younger than the TTL, otherwise re-read from disk.
    /// A missing file is an empty state.
    pub async fn read(&self) -> Result<InstalledState> {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            let age = cached.loaded_at.elapsed();
            if age < self.ttl {
                debug!("Using cached installed-state (age: {:?})", age);
                return Ok(cached.state.clone());
            }
            debug!("Installed-state cache expired (age: {:?})", age);
        }

        let state = self.load_persisted().await?;
        *cache = Some(CachedState {
            state: state.clone(),
            loaded_at: Instant::now(),
        });

        Ok(state)
    }

    /// Persist `state` and make it the cached value
    pub async fn write(&self, state: &InstalledState) -> Result<()> {
        let _guard = self.writer.lock().await;
        self.persist(state).await
    }

    /// Serialized read-modify-write.
    ///
    /// Holds the writer lock for the whole cycle and starts from the
    /// persisted file rather than the cache. When `f` fails nothing is written.
    pub async fn mutate<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut InstalledState) -> Result<T> + Send,
        T: Send,
    {
        let _guard = self.writer.lock().await;

        let mut state = self.load_persisted().await?;
        let value = f(&mut state)?;
        self.persist(&state).await?;

        Ok(value)
    }

    /// Drop the cache only; the persisted file is untouched
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }

    async fn load_persisted(&self) -> Result<InstalledState> {
        if !self.gateway.exists(&self.path).await {
            debug!(
                "No installed-state at {}, starting empty",
                self.path.display()
            );
            return Ok(InstalledState::default());
        }

        let bytes = self.gateway.read(&self.path).await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(InstalledState::default());
        }

        let mut state: InstalledState =
            serde_json::from_slice(&bytes).map_err(|e| FrameworkError::StateCorrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        let dropped = state.dedupe();
        if dropped > 0 {
            warn!(
                "Installed-state {} had {} duplicate record(s); keeping the latest",
                self.path.display(),
                dropped
            );
        }

        Ok(state)
    }

    /// Write to disk and refresh the cache. Caller holds the writer lock.
    async fn persist(&self, state: &InstalledState) -> Result<()> {
        let mut content = serde_json::to_vec_pretty(state).map_err(|e| {
            FrameworkError::io(
                &self.path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })?;
        content.push(b'\n');

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                self.gateway.ensure_dir(parent).await?;
            }
        }
        self.gateway.write(&self.path, &content).await?;

        *self.cache.lock().await = Some(CachedState {
            state: state.clone(),
            loaded_at: Instant::now(),
        });

        debug!(
            "Persisted installed-state to {} ({} records)",
            self.path.display(),
            state.len()
        );
        Ok(())
    }
}
