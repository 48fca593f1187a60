//! Shared helpers for lifecycle integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use guidekit_core::lifecycle::{ConflictChoice, ConflictPrompt, UpdateChoice, UpdatePrompt};
use guidekit_core::{
    DecisionProvider, FrameworkError, LifecycleManager, LocalFileGateway, Result, WorkspaceLayout,
};
use std::path::PathBuf;
use std::sync::{Arc, Once};
use tempfile::TempDir;

/// Initialize logging for tests (only once per test run)
static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Provider that answers every prompt the same way
pub struct FixedProvider {
    pub conflict: ConflictChoice,
    pub update: UpdateChoice,
}

impl FixedProvider {
    pub fn new(conflict: ConflictChoice, update: UpdateChoice) -> Self {
        Self { conflict, update }
    }

    /// Never expected to be asked anything
    pub fn silent() -> Self {
        Self::new(ConflictChoice::Cancel, UpdateChoice::Cancel)
    }
}

#[async_trait]
impl DecisionProvider for FixedProvider {
    async fn resolve_conflict(&self, _prompt: &ConflictPrompt) -> Result<ConflictChoice> {
        Ok(self.conflict)
    }

    async fn confirm_update(&self, prompt: &UpdatePrompt) -> Result<UpdateChoice> {
        if self.update == UpdateChoice::ShowDiff {
            return Err(FrameworkError::ConflictUnresolved {
                id: prompt.id.clone(),
                reason: "fixed provider cannot loop on ShowDiff".to_string(),
            });
        }
        Ok(self.update)
    }
}

/// A scratch workspace with a catalog and source documents
pub struct TestWorkspace {
    pub dir: TempDir,
    pub layout: WorkspaceLayout,
}

impl TestWorkspace {
    pub fn new(frameworks: &[(&str, &str)]) -> Self {
        init_test_logging();

        let dir = TempDir::new().unwrap();
        let layout = WorkspaceLayout::for_root(dir.path());
        let workspace = Self { dir, layout };

        workspace.set_catalog(frameworks);
        for (id, _) in frameworks {
            workspace.write_source(id, &format!("# {id}\n\nGuidance.\n"));
        }
        workspace
    }

    /// Rewrite the catalog manifest with `(id, version)` entries
    pub fn set_catalog(&self, frameworks: &[(&str, &str)]) {
        let entries: Vec<_> = frameworks
            .iter()
            .map(|(id, version)| {
                serde_json::json!({
                    "id": id,
                    "name": id,
                    "description": format!("Guidance for {id}"),
                    "category": "testing",
                    "version": version,
                    "fileName": format!("{id}.md"),
                })
            })
            .collect();

        std::fs::create_dir_all(self.layout.catalog.parent().unwrap()).unwrap();
        std::fs::write(
            &self.layout.catalog,
            serde_json::to_string_pretty(&serde_json::json!({
                "version": "1",
                "frameworks": entries,
            }))
            .unwrap(),
        )
        .unwrap();
    }

    pub fn write_source(&self, id: &str, content: &str) {
        std::fs::create_dir_all(&self.layout.source_dir).unwrap();
        std::fs::write(self.layout.source_dir.join(format!("{id}.md")), content).unwrap();
    }

    pub fn write_target(&self, id: &str, content: &str) {
        std::fs::create_dir_all(&self.layout.target_dir).unwrap();
        std::fs::write(self.target(id), content).unwrap();
    }

    pub fn target(&self, id: &str) -> PathBuf {
        self.layout.target_dir.join(format!("{id}.md"))
    }

    pub fn manager(&self) -> LifecycleManager {
        LifecycleManager::new(self.layout.clone(), Arc::new(LocalFileGateway::new()))
    }

    /// Parse the persisted installed-state file directly
    pub fn persisted_state(&self) -> serde_json::Value {
        let content = std::fs::read_to_string(&self.layout.state_file).unwrap();
        serde_json::from_str(&content).unwrap()
    }
}
