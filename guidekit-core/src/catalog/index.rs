//! Catalog manifest parsing and querying
//!
//! The catalog lists every framework document that can be installed,
//! with its category, version and target file name.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::error::{FrameworkError, Result};

/// Framework category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Architecture,
    Testing,
    Security,
    Devops,
    Cloud,
    Infrastructure,
    WorkManagement,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Architecture => "architecture",
            Category::Testing => "testing",
            Category::Security => "security",
            Category::Devops => "devops",
            Category::Cloud => "cloud",
            Category::Infrastructure => "infrastructure",
            Category::WorkManagement => "work-management",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The catalog manifest (catalog.json or catalog.yaml)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    /// Catalog schema version
    pub version: String,

    /// Framework definitions in catalog order
    pub frameworks: Vec<FrameworkDefinition>,
}

/// A single installable framework
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameworkDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: Category,

    /// Semantic version of the framework document
    pub version: String,

    /// Path of the document, relative to both the source and target directories
    pub file_name: String,

    /// Advisory only, never resolved transitively
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl Catalog {
    /// Parse a catalog, choosing YAML or JSON by the file extension of `path`
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
            .unwrap_or(false);

        let catalog: Catalog = if is_yaml {
            serde_yaml_ng::from_str(content).map_err(|e| FrameworkError::CatalogCorrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        } else {
            serde_json::from_str(content).map_err(|e| FrameworkError::CatalogCorrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        };

        catalog.validate(path)?;
        Ok(catalog)
    }

    /// Reject duplicate ids and blank required fields
    fn validate(&self, path: &Path) -> Result<()> {
        let mut seen = HashSet::new();

        for framework in &self.frameworks {
            if framework.id.trim().is_empty() {
                return Err(FrameworkError::CatalogCorrupt {
                    path: path.to_path_buf(),
                    reason: "framework with empty id".to_string(),
                });
            }

            if framework.file_name.trim().is_empty() {
                return Err(FrameworkError::CatalogCorrupt {
                    path: path.to_path_buf(),
                    reason: format!("framework '{}' has an empty fileName", framework.id),
                });
            }

            if !is_contained_file_name(&framework.file_name) {
                return Err(FrameworkError::CatalogCorrupt {
                    path: path.to_path_buf(),
                    reason: format!(
                        "framework '{}' has fileName '{}' outside its directory",
                        framework.id, framework.file_name
                    ),
                });
            }

            if !seen.insert(framework.id.as_str()) {
                return Err(FrameworkError::CatalogCorrupt {
                    path: path.to_path_buf(),
                    reason: format!("duplicate framework id '{}'", framework.id),
                });
            }
        }

        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&FrameworkDefinition> {
        self.frameworks.iter().find(|f| f.id == id)
    }

    /// Case-insensitive substring match over name, description and category.
    /// An empty (or whitespace) query returns the whole catalog.
    pub fn search(&self, query: &str) -> Vec<&FrameworkDefinition> {
        let query_lower = query.trim().to_lowercase();
        if query_lower.is_empty() {
            return self.frameworks.iter().collect();
        }

        self.frameworks
            .iter()
            .filter(|f| {
                f.name.to_lowercase().contains(&query_lower)
                    || f.description.to_lowercase().contains(&query_lower)
                    || f.category.as_str().contains(&query_lower)
            })
            .collect()
    }

    pub fn list_by_category(&self, category: Category) -> Vec<&FrameworkDefinition> {
        self.frameworks
            .iter()
            .filter(|f| f.category == category)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.frameworks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frameworks.is_empty()
    }
}

/// True when `name` is a relative path made only of plain components, so
/// joining it onto a directory can never leave that directory
pub(crate) fn is_contained_file_name(name: &str) -> bool {
    let path = Path::new(name);
    path.components().next().is_some()
        && path.components().all(|c| matches!(c, Component::Normal(_)))
}

impl FrameworkDefinition {
    /// Location of the source-of-truth document
    pub fn source_path(&self, source_dir: &Path) -> PathBuf {
        source_dir.join(&self.file_name)
    }

    /// Location the document is installed to
    pub fn target_path(&self, target_dir: &Path) -> PathBuf {
        target_dir.join(&self.file_name)
    }

    /// First line of the description, trimmed
    pub fn short_description(&self) -> &str {
        self.description
            .lines()
            .next()
            .unwrap_or(&self.description)
            .trim()
    }
}
