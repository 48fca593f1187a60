//! Lifecycle manager - install, update, remove and track frameworks
//!
//! Business logic (conflict resolution, backups, copies) runs without a
//! global lock. Only the installed-state read-modify-write is serialized,
//! through [`InstalledStateStore::mutate`].

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::backup::BackupManager;
use super::conflict::{
    ConflictPrompt, ConflictResolver, DecisionProvider, Resolution, UpdateChoice, UpdatePrompt,
    WritePlan,
};
use super::customization::CustomizationDetector;
use super::state::{InstalledRecord, InstalledState, InstalledStateStore};
use crate::catalog::{is_contained_file_name, CatalogStore, FrameworkDefinition};
use crate::config::WorkspaceLayout;
use crate::error::{FrameworkError, Result};
use crate::gateway::FileGateway;

/// Pre-selected answers for an existing target. With neither `overwrite`
/// nor `merge` set the decision provider is asked. `overwrite` wins over `merge`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallOptions {
    pub overwrite: bool,
    pub merge: bool,
    pub backup: bool,
}

impl InstallOptions {
    pub fn overwrite() -> Self {
        Self {
            overwrite: true,
            ..Self::default()
        }
    }

    pub fn merge() -> Self {
        Self {
            merge: true,
            ..Self::default()
        }
    }

    pub fn with_backup(mut self) -> Self {
        self.backup = true;
        self
    }
}

/// Result of `install`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub id: String,
    pub version: String,
    pub target: PathBuf,
    pub resolution: Resolution,
    pub backup: Option<PathBuf>,
}

impl InstallReport {
    /// The existing target was kept and nothing was recorded
    pub fn is_kept(&self) -> bool {
        self.resolution == Resolution::Keep
    }
}

/// Result of `update`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub id: String,
    pub from_version: String,
    pub to_version: String,
    pub was_customized: bool,
    pub backup: Option<PathBuf>,
}

/// An installed framework whose version differs from the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateInfo {
    pub id: String,
    pub current_version: String,
    pub latest_version: String,
}

impl UpdateInfo {
    /// Semver comparison when both sides parse, otherwise any change counts
    pub fn is_upgrade(&self) -> bool {
        match (
            semver::Version::parse(&self.current_version),
            semver::Version::parse(&self.latest_version),
        ) {
            (Ok(current), Ok(latest)) => latest > current,
            _ => self.current_version != self.latest_version,
        }
    }
}

#[derive(Debug)]
pub struct UpdateFailure {
    pub id: String,
    pub error: FrameworkError,
}

/// Per-id outcome of `update_all`
#[derive(Debug, Default)]
pub struct UpdateSummary {
    pub updated: Vec<UpdateReport>,
    pub failed: Vec<UpdateFailure>,
}

impl UpdateSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Result of `remove`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed { file_deleted: bool },
    /// No record existed; nothing was done
    NotInstalled,
}

pub struct LifecycleManager {
    layout: WorkspaceLayout,
    gateway: Arc<dyn FileGateway>,
    catalog: Arc<CatalogStore>,
    state: Arc<InstalledStateStore>,
    detector: CustomizationDetector,
    backups: BackupManager,
    resolver: ConflictResolver,
}

impl LifecycleManager {
    /// Build a manager with its own catalog and state stores
    pub fn new(layout: WorkspaceLayout, gateway: Arc<dyn FileGateway>) -> Self {
        let catalog = Arc::new(CatalogStore::new(&layout.catalog, Arc::clone(&gateway)));
        let state = Arc::new(InstalledStateStore::with_ttl(
            &layout.state_file,
            Arc::clone(&gateway),
            layout.state_ttl,
        ));
        Self::with_stores(layout, gateway, catalog, state)
    }

    /// Build a manager around stores shared with other components
    pub fn with_stores(
        layout: WorkspaceLayout,
        gateway: Arc<dyn FileGateway>,
        catalog: Arc<CatalogStore>,
        state: Arc<InstalledStateStore>,
    ) -> Self {
        let backups = BackupManager::new(Arc::clone(&gateway));
        Self {
            detector: CustomizationDetector::new(Arc::clone(&gateway)),
            resolver: ConflictResolver::new(Arc::clone(&gateway), backups.clone()),
            backups,
            layout,
            gateway,
            catalog,
            state,
        }
    }

    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    pub fn catalog(&self) -> &Arc<CatalogStore> {
        &self.catalog
    }

    pub fn state(&self) -> &Arc<InstalledStateStore> {
        &self.state
    }

    pub async fn list_available(&self) -> Result<Vec<FrameworkDefinition>> {
        Ok(self.catalog.load().await?.frameworks.clone())
    }

    pub async fn search(&self, query: &str) -> Result<Vec<FrameworkDefinition>> {
        self.catalog.search(query).await
    }

    pub async fn get_installed(&self) -> Result<InstalledState> {
        self.state.read().await
    }

    pub async fn is_installed(&self, id: &str) -> Result<bool> {
        Ok(self.state.read().await?.is_installed(id))
    }

    /// Copy a framework into the workspace and record it
    pub async fn install(
        &self,
        id: &str,
        options: InstallOptions,
        provider: &dyn DecisionProvider,
    ) -> Result<InstallReport> {
        let framework = self.catalog.require(id).await?;
        let source = framework.source_path(&self.layout.source_dir);
        let target = framework.target_path(&self.layout.target_dir);

        let (resolution, asked) = if !self.gateway.exists(&target).await {
            (Resolution::NoConflict, false)
        } else if options.overwrite {
            (Resolution::Overwrite, false)
        } else if options.merge {
            (Resolution::Merge, false)
        } else {
            let prompt = ConflictPrompt {
                id: framework.id.clone(),
                name: framework.name.clone(),
                target: target.clone(),
                source: source.clone(),
            };
            (self.resolver.resolve(&prompt, provider).await?, true)
        };

        if resolution == Resolution::Keep {
            info!("Kept existing {} for '{}'", target.display(), id);
            return Ok(InstallReport {
                id: framework.id,
                version: framework.version,
                target,
                resolution,
                backup: None,
            });
        }

        let backup = options.backup
            || (asked && resolution.is_destructive())
            || (self.layout.backup_on_overwrite && resolution == Resolution::Overwrite);

        let written = self
            .resolver
            .apply(&WritePlan {
                id: &framework.id,
                version: &framework.version,
                source: &source,
                target: &target,
                resolution,
                backup,
            })
            .await?;

        let record = InstalledRecord::new(&framework.id, &framework.version, &framework.file_name);
        self.state
            .mutate(move |state| {
                state.upsert(record);
                Ok(())
            })
            .await?;

        info!("Installed '{}' v{}", framework.id, framework.version);
        Ok(InstallReport {
            id: framework.id,
            version: framework.version,
            target,
            resolution,
            backup: written.backup,
        })
    }

    /// Replace an installed copy with the catalog's current source
    pub async fn update(&self, id: &str, provider: &dyn DecisionProvider) -> Result<UpdateReport> {
        let installed = self
            .state
            .read()
            .await?
            .get(id)
            .cloned()
            .ok_or_else(|| FrameworkError::NotInstalled { id: id.to_string() })?;
        let framework = self.catalog.require(id).await?;

        let source = framework.source_path(&self.layout.source_dir);
        let target = framework.target_path(&self.layout.target_dir);
        let customized = self.detector.is_customized(&target, &source).await;

        let prompt = UpdatePrompt {
            id: framework.id.clone(),
            name: framework.name.clone(),
            current_version: installed.version.clone(),
            latest_version: framework.version.clone(),
            customized,
            target: target.clone(),
            source: source.clone(),
        };

        let backup = loop {
            match provider.confirm_update(&prompt).await? {
                UpdateChoice::ShowDiff => provider.show_diff(&prompt).await?,
                UpdateChoice::Cancel => {
                    return Err(FrameworkError::UserCancelled { id: id.to_string() })
                }
                // A customized copy is always backed up
                UpdateChoice::Update => break customized,
                UpdateChoice::UpdateWithBackup => break true,
            }
        };

        let resolution = if self.gateway.exists(&target).await {
            Resolution::Overwrite
        } else {
            Resolution::NoConflict
        };

        let written = self
            .resolver
            .apply(&WritePlan {
                id: &framework.id,
                version: &framework.version,
                source: &source,
                target: &target,
                resolution,
                backup,
            })
            .await?;

        let record = InstalledRecord::new(&framework.id, &framework.version, &framework.file_name);
        self.state
            .mutate(move |state| {
                state.upsert(record);
                Ok(())
            })
            .await?;

        info!(
            "Updated '{}' v{} -> v{}",
            framework.id, installed.version, framework.version
        );
        Ok(UpdateReport {
            id: framework.id,
            from_version: installed.version,
            to_version: framework.version,
            was_customized: customized,
            backup: written.backup,
        })
    }

    /// Update everything `check_for_updates` reports, one id at a time.
    /// Per-id failures are collected, never raised.
    pub async fn update_all(&self, provider: &dyn DecisionProvider) -> Result<UpdateSummary> {
        let pending = self.check_for_updates().await?;
        let mut summary = UpdateSummary::default();

        for info in pending {
            match self.update(&info.id, provider).await {
                Ok(report) => summary.updated.push(report),
                Err(error) => {
                    warn!("Update of '{}' failed: {}", info.id, error);
                    summary.failed.push(UpdateFailure { id: info.id, error });
                }
            }
        }

        Ok(summary)
    }

    /// Delete the installed copy and its record. No record means no-op.
    pub async fn remove(&self, id: &str) -> Result<RemoveOutcome> {
        let Some(record) = self.state.read().await?.get(id).cloned() else {
            debug!("Remove of '{}' skipped: not installed", id);
            return Ok(RemoveOutcome::NotInstalled);
        };

        let file_name = match record.file_name {
            Some(name) => Some(name),
            None => self.catalog.get_by_id(id).await?.map(|f| f.file_name),
        };

        let mut file_deleted = false;
        match file_name {
            Some(name) if is_contained_file_name(&name) => {
                let target = self.layout.target_dir.join(name);
                if self.gateway.exists(&target).await {
                    self.gateway.delete(&target).await?;
                    file_deleted = true;
                }
            }
            Some(name) => warn!(
                "Record for '{}' names '{}' outside {}; dropping its record only",
                id,
                name,
                self.layout.target_dir.display()
            ),
            None => warn!(
                "'{}' is installed but absent from the catalog; dropping its record only",
                id
            ),
        }

        let id_owned = id.to_string();
        self.state
            .mutate(move |state| {
                state.remove(&id_owned);
                Ok(())
            })
            .await?;

        info!("Removed '{}'", id);
        Ok(RemoveOutcome::Removed { file_deleted })
    }

    /// Installed frameworks whose version differs from the catalog's
    pub async fn check_for_updates(&self) -> Result<Vec<UpdateInfo>> {
        let state = self.state.read().await?;
        let catalog = self.catalog.load().await?;

        let mut updates = Vec::new();
        for record in &state.frameworks {
            match catalog.get(&record.id) {
                Some(framework) if framework.version != record.version => {
                    updates.push(UpdateInfo {
                        id: record.id.clone(),
                        current_version: record.version.clone(),
                        latest_version: framework.version.clone(),
                    });
                }
                Some(_) => {}
                None => warn!(
                    "Installed framework '{}' is no longer in the catalog",
                    record.id
                ),
            }
        }

        Ok(updates)
    }

    /// Flag an installed framework as hand-edited
    pub async fn mark_customized(&self, id: &str) -> Result<()> {
        let id_owned = id.to_string();
        self.state
            .mutate(move |state| {
                if state.mark_customized(&id_owned, Utc::now()) {
                    Ok(())
                } else {
                    Err(FrameworkError::NotInstalled { id: id_owned })
                }
            })
            .await?;

        info!("Marked '{}' as customized", id);
        Ok(())
    }

    /// Re-run the detector for every installed framework and record the
    /// result. Returns the ids that are customized afterwards.
    pub async fn sync_customization_flags(&self) -> Result<Vec<String>> {
        let state = self.state.read().await?;
        let catalog = self.catalog.load().await?;

        let mut detected = Vec::new();
        for record in &state.frameworks {
            if let Some(framework) = catalog.get(&record.id) {
                let customized = self
                    .detector
                    .is_customized(
                        &framework.target_path(&self.layout.target_dir),
                        &framework.source_path(&self.layout.source_dir),
                    )
                    .await;
                detected.push((record.id.clone(), customized));
            }
        }

        self.state
            .mutate(move |state| {
                let now = Utc::now();
                let mut flagged = Vec::new();
                for (id, customized) in detected {
                    let Some(record) = state.get(&id) else {
                        continue;
                    };
                    match (customized, record.customized) {
                        (true, false) => {
                            state.mark_customized(&id, now);
                        }
                        (false, true) => {
                            state.clear_customized(&id);
                        }
                        _ => {}
                    }
                    if customized {
                        flagged.push(id);
                    }
                }
                Ok(flagged)
            })
            .await
    }

    /// Existing backups of an installed framework's target, newest first
    pub async fn list_backups(&self, id: &str) -> Result<Vec<PathBuf>> {
        let framework = self.catalog.require(id).await?;
        self.backups
            .list_backups(&framework.target_path(&self.layout.target_dir))
            .await
    }
}
