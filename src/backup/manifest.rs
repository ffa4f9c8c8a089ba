//! Backup manifest
//!
//! `backup-metadata.json` at the top of every backup. Restore trusts nothing
//! else: a backup without a readable manifest is invalid.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::settings::{ConfigSnapshot, StashConfig};
use crate::error::{StashError, StashResult};
use crate::storage::file_io::{read_json_required, write_json_atomic};

use super::id::BackupId;

/// File name of the manifest inside a backup
pub const MANIFEST_FILE: &str = "backup-metadata.json";

/// Counts of files that actually made it into the backup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupStats {
    pub regular: usize,
    pub encrypted: usize,
}

/// Metadata describing one backup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupManifest {
    pub id: BackupId,
    pub project_name: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    /// Version of the tool that produced the backup
    #[serde(rename = "nodeVersion")]
    pub runtime_version: String,
    pub platform: String,
    pub stats: BackupStats,
    pub config: ConfigSnapshot,
}

impl BackupManifest {
    /// Describe a backup of the project configured by `config`
    pub fn new(id: BackupId, config: &StashConfig, stats: BackupStats) -> Self {
        Self {
            id,
            project_name: config.project.name.clone(),
            version: config.project.version.clone(),
            timestamp: Utc::now(),
            runtime_version: concat!("stash ", env!("CARGO_PKG_VERSION")).to_string(),
            platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
            stats,
            config: config.snapshot(),
        }
    }

    /// Write the manifest into the top of `dir`
    pub fn write(&self, dir: &Path) -> StashResult<PathBuf> {
        let path = dir.join(MANIFEST_FILE);
        write_json_atomic(&path, self)?;
        Ok(path)
    }

    /// Read the manifest from the top of `dir`
    pub fn read(dir: &Path) -> StashResult<Self> {
        read_json_required(dir.join(MANIFEST_FILE))
            .map_err(|e| StashError::InvalidBackup(format!("unreadable manifest: {}", e)))
    }

    /// Find the directory holding the manifest: `root` itself, or one of
    /// its immediate subdirectories
    pub fn locate(root: &Path) -> Option<PathBuf> {
        if root.join(MANIFEST_FILE).is_file() {
            return Some(root.to_path_buf());
        }

        let mut candidates: Vec<PathBuf> = std::fs::read_dir(root)
            .ok()?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir() && path.join(MANIFEST_FILE).is_file())
            .collect();

        candidates.sort();
        candidates.into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn sample() -> BackupManifest {
        let config = StashConfig::for_project("shop");
        BackupManifest::new(
            BackupId::from_name("shop-test"),
            &config,
            BackupStats {
                regular: 3,
                encrypted: 1,
            },
        )
    }

    #[test]
    fn test_json_shape() {
        let value = serde_json::to_value(sample()).unwrap();

        assert_eq!(value["id"], "shop-test");
        assert_eq!(value["projectName"], "shop");
        assert_eq!(value["version"], "0.0.0");
        assert!(value["timestamp"].is_string());
        assert!(value["nodeVersion"].as_str().unwrap().starts_with("stash "));
        assert!(value["platform"].is_string());
        assert_eq!(value["stats"]["regular"], 3);
        assert_eq!(value["stats"]["encrypted"], 1);
        assert!(value["config"].get("storage").is_none());
    }

    #[test]
    fn test_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let manifest = sample();

        manifest.write(temp_dir.path()).unwrap();
        let loaded = BackupManifest::read(temp_dir.path()).unwrap();

        assert_eq!(loaded.id, manifest.id);
        assert_eq!(loaded.stats, manifest.stats);
        assert_eq!(loaded.config, manifest.config);
    }

    #[test]
    fn test_missing_or_corrupt_is_invalid_backup() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            BackupManifest::read(temp_dir.path()),
            Err(StashError::InvalidBackup(_))
        ));

        fs::write(temp_dir.path().join(MANIFEST_FILE), "{ nope").unwrap();
        assert!(matches!(
            BackupManifest::read(temp_dir.path()),
            Err(StashError::InvalidBackup(_))
        ));
    }

    #[test]
    fn test_locate_top_level_and_nested() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        assert!(BackupManifest::locate(root).is_none());

        let nested = root.join("shop-test");
        fs::create_dir_all(&nested).unwrap();
        sample().write(&nested).unwrap();
        assert_eq!(BackupManifest::locate(root), Some(nested));

        sample().write(root).unwrap();
        assert_eq!(BackupManifest::locate(root), Some(root.to_path_buf()));
    }

    #[test]
    fn test_locate_only_one_level_deep() {
        let temp_dir = TempDir::new().unwrap();
        let deep = temp_dir.path().join("a").join("b");
        fs::create_dir_all(&deep).unwrap();
        sample().write(&deep).unwrap();

        assert!(BackupManifest::locate(temp_dir.path()).is_none());
    }
}
