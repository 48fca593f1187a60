//! Catalog store - loads the catalog once and serves it from memory
//!
//! The catalog is read-only for the lifetime of the process. The cache is
//! only dropped through `invalidate()`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::{Catalog, FrameworkDefinition};
use crate::error::{FrameworkError, Result};
use crate::gateway::FileGateway;

pub struct CatalogStore {
    path: PathBuf,
    gateway: Arc<dyn FileGateway>,
    cached: RwLock<Option<Arc<Catalog>>>,
}

impl CatalogStore {
    pub fn new(path: impl Into<PathBuf>, gateway: Arc<dyn FileGateway>) -> Self {
        Self {
            path: path.into(),
            gateway,
            cached: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the cached catalog, reading and parsing it on first use
    pub async fn load(&self) -> Result<Arc<Catalog>> {
        if let Some(catalog) = self.cached.read().await.as_ref() {
            return Ok(Arc::clone(catalog));
        }

        let mut cached = self.cached.write().await;
        // Another task may have filled the cache while we waited for the lock
        if let Some(catalog) = cached.as_ref() {
            return Ok(Arc::clone(catalog));
        }

        let bytes = self.gateway.read(&self.path).await?;
        let content = String::from_utf8(bytes).map_err(|e| FrameworkError::CatalogCorrupt {
            path: self.path.clone(),
            reason: format!("not valid UTF-8: {e}"),
        })?;

        let catalog = Arc::new(Catalog::parse(&content, &self.path)?);
        debug!(
            "Loaded catalog {} from {} ({} frameworks)",
            catalog.version,
            self.path.display(),
            catalog.len()
        );

        *cached = Some(Arc::clone(&catalog));
        Ok(catalog)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<FrameworkDefinition>> {
        Ok(self.load().await?.get(id).cloned())
    }

    /// Like `get_by_id`, but an unknown id is an error
    pub async fn require(&self, id: &str) -> Result<FrameworkDefinition> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| FrameworkError::UnknownFramework { id: id.to_string() })
    }

    pub async fn search(&self, query: &str) -> Result<Vec<FrameworkDefinition>> {
        let catalog = self.load().await?;
        Ok(catalog.search(query).into_iter().cloned().collect())
    }

    /// Drop the cache so the next `load()` re-reads the source
    pub async fn invalidate(&self) {
        debug!("Invalidating catalog cache for {}", self.path.display());
        *self.cached.write().await = None;
    }
}
