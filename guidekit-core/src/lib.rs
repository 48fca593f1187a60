//! Guidekit core library
//!
//! Manages a catalog of versioned framework documents and their installed
//! copies inside a workspace.

pub mod catalog;
pub mod config;
pub mod error;
pub mod gateway;
pub mod lifecycle;

pub use catalog::{Catalog, CatalogStore, Category, FrameworkDefinition};
pub use config::{GuidekitConfig, WorkspaceLayout};
pub use error::{FrameworkError, Result};
pub use gateway::{FileGateway, LocalFileGateway};
pub use lifecycle::{
    DecisionProvider, InstallOptions, LifecycleManager, RemoveOutcome, UpdateInfo, UpdateSummary,
};
