//! Error types for the framework lifecycle with clear, actionable messages

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the core crate
pub type Result<T, E = FrameworkError> = std::result::Result<T, E>;

/// Errors surfaced by catalog, installed-state and lifecycle operations
#[derive(Error, Debug)]
pub enum FrameworkError {
    /// The id is not present in the catalog
    #[error("Framework '{id}' not found in catalog")]
    UnknownFramework { id: String },

    /// The id has no installed record
    #[error("Framework '{id}' is not installed.\n\nTo install it, run:\n  guidekit install {id}")]
    NotInstalled { id: String },

    /// The catalog manifest could not be parsed or failed validation
    #[error("Catalog at {path} is corrupt: {reason}")]
    CatalogCorrupt { path: PathBuf, reason: String },

    /// The installed-state file exists but could not be parsed
    #[error("Installed-state file {path} is corrupt: {reason}\n\nFix or delete the file to start from an empty state.")]
    StateCorrupt { path: PathBuf, reason: String },

    /// The decision provider chose to abort the operation
    #[error("Operation on '{id}' was cancelled")]
    UserCancelled { id: String },

    /// The decision provider failed to produce a choice
    #[error("Conflict for '{id}' could not be resolved: {reason}")]
    ConflictUnresolved { id: String, reason: String },

    /// A snapshot of an existing file could not be created
    #[error("Failed to back up {path}")]
    Backup {
        path: PathBuf,
        #[source]
        source: Box<FrameworkError>,
    },

    /// Generic file-system failure reported by the file gateway
    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file could not be read or parsed
    #[error("Invalid configuration {path}: {reason}")]
    Config { path: PathBuf, reason: String },
}

impl FrameworkError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FrameworkError::Io {
            path: path.into(),
            source,
        }
    }

    /// Either flavour of "not found": unknown to the catalog or not installed
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FrameworkError::UnknownFramework { .. } | FrameworkError::NotInstalled { .. }
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FrameworkError::UserCancelled { .. })
    }

    /// True when the underlying cause is an I/O error of the given kind
    pub fn is_io_kind(&self, kind: std::io::ErrorKind) -> bool {
        match self {
            FrameworkError::Io { source, .. } => source.kind() == kind,
            FrameworkError::Backup { source, .. } => source.is_io_kind(kind),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_covers_both_variants() {
        let unknown = FrameworkError::UnknownFramework {
            id: "ghost".to_string(),
        };
        let missing = FrameworkError::NotInstalled {
            id: "tdd-bdd".to_string(),
        };

        assert!(unknown.is_not_found());
        assert!(missing.is_not_found());
        assert!(missing.to_string().contains("guidekit install tdd-bdd"));
    }

    #[test]
    fn test_backup_error_exposes_io_kind() {
        let inner = FrameworkError::io(
            "/tmp/a.md",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let err = FrameworkError::Backup {
            path: PathBuf::from("/tmp/a.md"),
            source: Box::new(inner),
        };

        assert!(err.is_io_kind(std::io::ErrorKind::PermissionDenied));
        assert!(!err.is_not_found());
    }
}
