//! Configuration module for stash
//!
//! This module provides configuration management including:
//! - Project root and tooling directory resolution
//! - Project settings persistence
//! - The allow-listed config snapshot stored in manifests

pub mod paths;
pub mod settings;

pub use paths::StashPaths;
pub use settings::{ConfigSnapshot, StashConfig};
