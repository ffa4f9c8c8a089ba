//! Path management for stash
//!
//! Everything stash owns inside a project lives under the tooling directory
//! `<project>/.stash/`.
//!
//! ## Path Resolution Order
//!
//! 1. Explicit `--project-dir` argument (if given)
//! 2. `STASH_PROJECT_DIR` environment variable (if set)
//! 3. The current working directory
//!
//! The encryption key lives outside the project tree so that it can never be
//! swept into a backup: `STASH_KEY_FILE` if set, otherwise
//! `<user config dir>/stash/keys/<project>.key`.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::error::StashError;

/// Name of the tooling directory inside a project
pub const TOOLING_DIR: &str = ".stash";

/// Manages all paths used by stash for one project
#[derive(Debug, Clone)]
pub struct StashPaths {
    /// Root of the working tree being backed up
    project_root: PathBuf,
    /// Key file override (tests, `STASH_KEY_FILE`)
    key_file: Option<PathBuf>,
}

impl StashPaths {
    /// Create a new StashPaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory cannot be determined.
    pub fn new(project_dir: Option<PathBuf>) -> Result<Self, StashError> {
        let project_root = match project_dir {
            Some(dir) => dir,
            None => match std::env::var("STASH_PROJECT_DIR") {
                Ok(custom) => PathBuf::from(custom),
                Err(_) => std::env::current_dir().map_err(|e| {
                    StashError::Config(format!("Could not determine current directory: {}", e))
                })?,
            },
        };

        let key_file = std::env::var("STASH_KEY_FILE").ok().map(PathBuf::from);

        Ok(Self {
            project_root,
            key_file,
        })
    }

    /// Create StashPaths with a custom project root (useful for testing)
    pub fn with_project_root(project_root: PathBuf) -> Self {
        Self {
            project_root,
            key_file: None,
        }
    }

    /// Override the key file location
    pub fn with_key_file(mut self, key_file: PathBuf) -> Self {
        self.key_file = Some(key_file);
        self
    }

    /// Get the project root
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Name of the project directory, used when no name is configured
    pub fn project_dir_name(&self) -> String {
        self.project_root
            .canonicalize()
            .unwrap_or_else(|_| self.project_root.clone())
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "project".to_string())
    }

    /// Get the tooling directory (<project>/.stash/)
    pub fn tooling_dir(&self) -> PathBuf {
        self.project_root.join(TOOLING_DIR)
    }

    /// Get the path to the project configuration file
    pub fn config_file(&self) -> PathBuf {
        self.tooling_dir().join("config.json")
    }

    /// Default retention directory (<project>/.stash/backups/)
    pub fn default_backup_dir(&self) -> PathBuf {
        self.tooling_dir().join("backups")
    }

    /// Resolve a configured retention path against the project root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    /// Get the path to the encryption key file
    pub fn key_file(&self, project_name: &str) -> PathBuf {
        if let Some(ref custom) = self.key_file {
            return custom.clone();
        }

        match ProjectDirs::from("", "", "stash") {
            Some(dirs) => dirs
                .config_dir()
                .join("keys")
                .join(format!("{}.key", project_name)),
            None => self.tooling_dir().join("backup.key"),
        }
    }

    /// Check if stash has been initialized for this project
    pub fn is_initialized(&self) -> bool {
        self.config_file().exists()
    }
}
