//! Backup system for stash
//!
//! Snapshots a project tree into a self-contained backup and restores it
//! later, keeping secrets out of plaintext.
//!
//! # Architecture
//!
//! The backup system consists of two orchestrators:
//!
//! - `BackupManager`: classifies, redacts, encrypts and packs a backup, then
//!   enforces the retention policy
//! - `RestoreManager`: locates, validates and merges a backup back into the
//!   working tree, then runs the post-restore steps
//!
//! # Backup Format
//!
//! A backup is either `<id>.tar.gz` or a plain `<id>/` directory holding:
//! - the project's regular files at their relative paths
//! - `<path>.encrypted` envelopes for secret-bearing files
//! - `backup-metadata.json` describing the backup
//!
//! # Example
//!
//! ```rust,ignore
//! use stash::backup::{BackupManager, RestoreManager};
//! use stash::config::{StashConfig, StashPaths};
//!
//! let paths = StashPaths::new(None)?;
//! let config = StashConfig::load_or_default(&paths)?;
//!
//! let manager = BackupManager::new(paths.clone(), config.clone());
//! let (outcome, _deleted) = manager.create_backup_with_retention(true)?;
//!
//! // Later, restore from backup
//! let result = RestoreManager::new(paths, config).restore(outcome.id.as_str())?;
//! println!("{}", result.summary());
//! ```

pub mod archive;
pub mod classifier;
pub mod hooks;
pub mod id;
pub mod manifest;
pub mod progress;
pub mod redactor;
pub mod report;

mod manager;
mod restore;

pub use hooks::{
    CommandRunner, NoSecretProvider, PromptSecretProvider, SecretProvider, StaticSecretProvider,
    SystemCommandRunner,
};
pub use id::BackupId;
pub use manager::{
    encrypted_name, list_backups_in, BackupInfo, BackupKind, BackupManager, BackupOutcome,
    ENCRYPTED_SUFFIX, STAGING_DIR,
};
pub use manifest::{BackupManifest, BackupStats};
pub use progress::{BackupStage, LogObserver, ProgressObserver, RecordingObserver, RestoreStage};
pub use report::{BatchReport, FileFailure};
pub use restore::{RestoreManager, RestoreResult};
