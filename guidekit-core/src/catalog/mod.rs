//! Guidekit Catalog - the read-only list of installable frameworks
//!
//! # Overview
//!
//! The catalog is a single manifest (`catalog.json` or `catalog.yaml`)
//! describing every framework document shipped with Guidekit. Each entry
//! names a source document under the source directory; installing it
//! copies that document into the workspace's target directory.
//!
//! ```text
//! .guidekit/
//!     ├── catalog.json        ← framework definitions
//!     └── frameworks/*.md     ← source-of-truth documents
//!            │
//!            ▼
//!     LifecycleManager
//!            │
//!            ▼
//!     frameworks/*.md         ← installed copies
//!     .guidekit/installed.json ← installed-state
//! ```

mod index;
mod store;

pub(crate) use index::is_contained_file_name;
pub use index::{Catalog, Category, FrameworkDefinition};
pub use store::CatalogStore;
