//! stash - project backup and restore
//!
//! This library snapshots a project's working tree into self-contained
//! backups and restores them later. Files matching the encryption patterns
//! are sealed with AES-256-GCM, credential assignments in route files are
//! blanked, and only the newest backups are kept.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Project root resolution and settings
//! - `error`: Custom error types
//! - `crypto`: Key handling and authenticated encryption
//! - `storage`: File helpers shared by the pipelines
//! - `backup`: Backup and restore orchestration
//! - `cli`: Command handlers for the `stash` binary
//!
//! # Example
//!
//! ```rust,ignore
//! use stash::config::{StashConfig, StashPaths};
//!
//! let paths = StashPaths::new(None)?;
//! let config = StashConfig::load_or_default(&paths)?;
//! ```

pub mod backup;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod storage;

pub use error::{StashError, StashResult};
