//! Conflict resolution for install and update targets
//!
//! When a target file already exists the resolver asks an injected
//! [`DecisionProvider`] what to do. The provider may be a terminal prompt,
//! a fixed policy, or a scripted double in tests.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::backup::BackupManager;
use crate::error::{FrameworkError, Result};
use crate::gateway::FileGateway;

/// Answer to "the target already exists"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    Overwrite,
    Merge,
    Keep,
    Cancel,
}

/// Answer to "an update is about to replace the installed copy"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateChoice {
    ShowDiff,
    Update,
    UpdateWithBackup,
    Cancel,
}

/// Context handed to the provider when a target already exists
#[derive(Debug, Clone)]
pub struct ConflictPrompt {
    pub id: String,
    pub name: String,
    pub target: PathBuf,
    pub source: PathBuf,
}

/// Context handed to the provider before an update
#[derive(Debug, Clone)]
pub struct UpdatePrompt {
    pub id: String,
    pub name: String,
    pub current_version: String,
    pub latest_version: String,
    /// The installed copy differs from its source
    pub customized: bool,
    pub target: PathBuf,
    pub source: PathBuf,
}

impl UpdatePrompt {
    /// Choices to offer for this prompt
    pub fn choices(&self) -> &'static [UpdateChoice] {
        if self.customized {
            &[
                UpdateChoice::ShowDiff,
                UpdateChoice::UpdateWithBackup,
                UpdateChoice::Cancel,
            ]
        } else {
            &[
                UpdateChoice::ShowDiff,
                UpdateChoice::Update,
                UpdateChoice::Cancel,
            ]
        }
    }
}

/// Source of user (or policy) decisions. One instance per logical operation.
#[async_trait]
pub trait DecisionProvider: Send + Sync {
    async fn resolve_conflict(&self, prompt: &ConflictPrompt) -> Result<ConflictChoice>;

    async fn confirm_update(&self, prompt: &UpdatePrompt) -> Result<UpdateChoice>;

    /// Present the difference between installed copy and source.
    /// Advisory only; the update prompt is shown again afterwards.
    async fn show_diff(&self, _prompt: &UpdatePrompt) -> Result<()> {
        Ok(())
    }
}

/// How a target will be written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Target absent, write directly
    NoConflict,
    Overwrite,
    Merge,
    Keep,
}

impl Resolution {
    /// Overwrite and merge replace existing bytes on disk
    pub fn is_destructive(&self) -> bool {
        matches!(self, Resolution::Overwrite | Resolution::Merge)
    }
}

/// A single write to perform
#[derive(Debug, Clone)]
pub struct WritePlan<'a> {
    pub id: &'a str,
    pub version: &'a str,
    pub source: &'a Path,
    pub target: &'a Path,
    pub resolution: Resolution,
    pub backup: bool,
}

/// What `apply` actually did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub written: bool,
    pub backup: Option<PathBuf>,
}

#[derive(Clone)]
pub struct ConflictResolver {
    gateway: Arc<dyn FileGateway>,
    backups: BackupManager,
}

impl ConflictResolver {
    pub fn new(gateway: Arc<dyn FileGateway>, backups: BackupManager) -> Self {
        Self { gateway, backups }
    }

    /// Decide how to treat `prompt.target`. `Cancel` becomes `UserCancelled`.
    pub async fn resolve(
        &self,
        prompt: &ConflictPrompt,
        provider: &dyn DecisionProvider,
    ) -> Result<Resolution> {
        if !self.gateway.exists(&prompt.target).await {
            return Ok(Resolution::NoConflict);
        }

        let choice = provider.resolve_conflict(prompt).await?;
        debug!(
            "Conflict on {} for '{}' resolved as {:?}",
            prompt.target.display(),
            prompt.id,
            choice
        );

        match choice {
            ConflictChoice::Overwrite => Ok(Resolution::Overwrite),
            ConflictChoice::Merge => Ok(Resolution::Merge),
            ConflictChoice::Keep => Ok(Resolution::Keep),
            ConflictChoice::Cancel => Err(FrameworkError::UserCancelled {
                id: prompt.id.clone(),
            }),
        }
    }

    /// Carry out a resolved write.
    ///
    /// The source is read before anything else so a missing source aborts
    /// without side effects. When a backup is requested and the target
    /// exists, the backup completes before the target is touched.
    pub async fn apply(&self, plan: &WritePlan<'_>) -> Result<WriteReport> {
        if plan.resolution == Resolution::Keep {
            return Ok(WriteReport::default());
        }

        let incoming = self.gateway.read(plan.source).await?;
        let target_exists = self.gateway.exists(plan.target).await;

        let backup = if plan.backup && target_exists {
            Some(self.backups.backup(plan.target).await?)
        } else {
            None
        };

        let contents = match plan.resolution {
            Resolution::Merge if target_exists => {
                let existing = self.gateway.read(plan.target).await?;
                merge_with_markers(&existing, &incoming, plan.id, plan.version)
            }
            _ => incoming,
        };

        if let Some(parent) = plan.target.parent() {
            self.gateway.ensure_dir(parent).await?;
        }
        self.gateway.write(plan.target, &contents).await?;

        info!(
            "Wrote {} ({:?}) for '{}'",
            plan.target.display(),
            plan.resolution,
            plan.id
        );

        Ok(WriteReport {
            written: true,
            backup,
        })
    }
}

/// Append `incoming` after `existing`, bracketed by conflict markers
pub fn merge_with_markers(existing: &[u8], incoming: &[u8], id: &str, version: &str) -> Vec<u8> {
    let mut merged = Vec::with_capacity(existing.len() + incoming.len() + 128);
    merged.extend_from_slice(existing);
    if !existing.ends_with(b"\n") {
        merged.push(b'\n');
    }
    merged.push(b'\n');
    merged.extend_from_slice(format!("<<<<<<< INCOMING {id} v{version}\n").as_bytes());
    merged.extend_from_slice(incoming);
    if !incoming.ends_with(b"\n") {
        merged.push(b'\n');
    }
    merged.extend_from_slice(format!(">>>>>>> END INCOMING {id}\n").as_bytes());
    merged
}
