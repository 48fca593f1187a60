//! Workspace configuration (.guidekit/config.yaml)
//!
//! Every field is optional. Relative paths resolve against the workspace root.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{FrameworkError, Result};

/// Project-level config file, relative to the workspace root
pub const PROJECT_CONFIG_FILE: &str = ".guidekit/config.yaml";

const DEFAULT_CATALOG: &str = ".guidekit/catalog.json";
const DEFAULT_TARGET_DIR: &str = "frameworks";
const DEFAULT_STATE_FILE: &str = ".guidekit/installed.json";
const DEFAULT_STATE_TTL_MS: u64 = 5_000;

/// Raw configuration as written in YAML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GuidekitConfig {
    /// Catalog manifest path
    #[serde(default)]
    pub catalog: Option<PathBuf>,

    /// Directory holding source documents (defaults to `frameworks/` beside the catalog)
    #[serde(default)]
    pub source_dir: Option<PathBuf>,

    /// Install destination
    #[serde(default)]
    pub target_dir: Option<PathBuf>,

    /// Installed-state file
    #[serde(default)]
    pub state_file: Option<PathBuf>,

    /// Installed-state cache TTL in milliseconds
    #[serde(default)]
    pub state_ttl_ms: Option<u64>,

    /// Back up before every overwrite, even pre-selected ones
    #[serde(default)]
    pub backup_on_overwrite: Option<bool>,
}

/// Fully resolved, absolute locations used by the lifecycle
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceLayout {
    pub root: PathBuf,
    pub catalog: PathBuf,
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
    pub state_file: PathBuf,
    pub state_ttl: Duration,
    pub backup_on_overwrite: bool,
}

impl GuidekitConfig {
    /// Parse config from YAML string
    pub fn from_yaml(content: &str, path: &Path) -> Result<Self> {
        serde_yaml_ng::from_str(content).map_err(|e| FrameworkError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Load config from a specific path. A missing file yields defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| FrameworkError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        Self::from_yaml(&content, path)
    }

    /// Find the config for a workspace.
    ///
    /// Order: explicit path, `<root>/.guidekit/config.yaml`, the per-user
    /// config directory, then defaults.
    pub fn discover(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(FrameworkError::Config {
                    path: path.to_path_buf(),
                    reason: "file does not exist".to_string(),
                });
            }
            return Self::load_from_path(path);
        }

        let project = root.join(PROJECT_CONFIG_FILE);
        if project.exists() {
            return Self::load_from_path(&project);
        }

        match Self::user_config_path() {
            Some(user) if user.exists() => Self::load_from_path(&user),
            _ => Ok(Self::default()),
        }
    }

    /// Per-user config file location, if the platform has one
    pub fn user_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "guidekit", "guidekit")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Resolve every path against `root`
    pub fn resolve(&self, root: &Path) -> WorkspaceLayout {
        let absolute = |p: &Path| -> PathBuf {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                root.join(p)
            }
        };

        let catalog = absolute(
            self.catalog
                .as_deref()
                .unwrap_or_else(|| Path::new(DEFAULT_CATALOG)),
        );
        let source_dir = match &self.source_dir {
            Some(dir) => absolute(dir),
            None => catalog
                .parent()
                .map(|p| p.join("frameworks"))
                .unwrap_or_else(|| root.join("frameworks")),
        };

        WorkspaceLayout {
            root: root.to_path_buf(),
            catalog,
            source_dir,
            target_dir: absolute(
                self.target_dir
                    .as_deref()
                    .unwrap_or_else(|| Path::new(DEFAULT_TARGET_DIR)),
            ),
            state_file: absolute(
                self.state_file
                    .as_deref()
                    .unwrap_or_else(|| Path::new(DEFAULT_STATE_FILE)),
            ),
            state_ttl: Duration::from_millis(self.state_ttl_ms.unwrap_or(DEFAULT_STATE_TTL_MS)),
            backup_on_overwrite: self.backup_on_overwrite.unwrap_or(false),
        }
    }
}

impl WorkspaceLayout {
    /// Layout with every default, rooted at `root`
    pub fn for_root(root: &Path) -> Self {
        GuidekitConfig::default().resolve(root)
    }
}
