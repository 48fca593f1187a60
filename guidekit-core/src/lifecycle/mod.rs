//! Framework lifecycle - installing, updating and removing catalog frameworks
//!
//! Components, leaves first:
//!
//! - [`InstalledStateStore`]: persisted installed-state with a TTL cache and
//!   a serialized read-modify-write
//! - [`CustomizationDetector`]: SHA-256 fingerprint comparison
//! - [`BackupManager`]: timestamped sibling snapshots
//! - [`ConflictResolver`]: existing-target handling via a [`DecisionProvider`]
//! - [`LifecycleManager`]: orchestrates all of the above

mod backup;
mod conflict;
mod customization;
mod manager;
mod state;

pub use backup::BackupManager;
pub use conflict::{
    merge_with_markers, ConflictChoice, ConflictPrompt, ConflictResolver, DecisionProvider,
    Resolution, UpdateChoice, UpdatePrompt, WritePlan, WriteReport,
};
pub use customization::{fingerprint, CustomizationDetector};
pub use manager::{
    InstallOptions, InstallReport, LifecycleManager, RemoveOutcome, UpdateFailure, UpdateInfo,
    UpdateReport, UpdateSummary,
};
pub use state::{InstalledRecord, InstalledState, InstalledStateStore, DEFAULT_STATE_TTL};
