//! Project settings for stash
//!
//! Loaded from `<project>/.stash/config.json`. Every section has serde
//! defaults so a partial (or missing) file still yields a usable config.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::paths::StashPaths;
use crate::error::StashError;
use crate::storage::file_io::write_json_atomic;

/// Project identity recorded in every manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    /// Project name, compared on restore to prevent cross-project restores
    pub name: String,
    /// Project version string
    #[serde(default = "default_project_version")]
    pub version: String,
}

fn default_project_version() -> String {
    "0.0.0".to_string()
}

/// Include/exclude/encrypt glob patterns, relative to the project root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternConfig {
    #[serde(default = "default_include")]
    pub include: Vec<String>,
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
    #[serde(default = "default_encrypt")]
    pub encrypt: Vec<String>,
}

fn default_include() -> Vec<String> {
    vec!["**/*".to_string()]
}

fn default_exclude() -> Vec<String> {
    vec![
        "**/node_modules/**".to_string(),
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
    ]
}

fn default_encrypt() -> Vec<String> {
    vec![
        "**/.env".to_string(),
        "**/.env.*".to_string(),
        "**/*.env".to_string(),
        "**/*.pem".to_string(),
        "**/*.key".to_string(),
    ]
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            include: default_include(),
            exclude: default_exclude(),
            encrypt: default_encrypt(),
        }
    }
}

/// Route files: regular files that are redacted before entering a backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Category name, used in log output
    #[serde(default = "default_route_name")]
    pub name: String,
    #[serde(default = "default_route_patterns")]
    pub patterns: Vec<String>,
}

fn default_route_name() -> String {
    "routes".to_string()
}

fn default_route_patterns() -> Vec<String> {
    vec!["**/routes/**".to_string()]
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            name: default_route_name(),
            patterns: default_route_patterns(),
        }
    }
}

/// Where backups are kept and how many survive pruning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Retention directory; relative paths resolve against the project root.
    /// Defaults to `<project>/.stash/backups`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
    /// Number of backups kept after pruning
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,
    /// Produce a `.tar.gz` archive instead of a directory
    #[serde(default = "default_true")]
    pub compression: bool,
    /// Leave the staging directory behind when a backup fails
    #[serde(default)]
    pub keep_failed_staging: bool,
}

fn default_max_backups() -> usize {
    5
}

fn default_true() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            local_path: None,
            max_backups: default_max_backups(),
            compression: true,
            keep_failed_staging: false,
        }
    }
}

/// Post-restore setup performed by external collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreConfig {
    /// File whose presence triggers the install command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency_manifest: Option<PathBuf>,
    /// Program and arguments for dependency installation
    #[serde(default)]
    pub install_command: Vec<String>,
    /// Directory whose presence triggers the schema command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_dir: Option<PathBuf>,
    /// Program and arguments for schema/database setup
    #[serde(default)]
    pub schema_command: Vec<String>,
    /// Environment file the restored secret is merged into
    #[serde(default = "default_env_file")]
    pub env_file: PathBuf,
    /// Key of the secret collected after restore (None disables the prompt)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
}

fn default_env_file() -> PathBuf {
    PathBuf::from(".env")
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            dependency_manifest: Some(PathBuf::from("package.json")),
            install_command: vec!["npm".to_string(), "install".to_string()],
            schema_dir: Some(PathBuf::from("prisma")),
            schema_command: vec![
                "npx".to_string(),
                "prisma".to_string(),
                "db".to_string(),
                "push".to_string(),
            ],
            env_file: default_env_file(),
            secret_key: Some("GITHUB_TOKEN".to_string()),
        }
    }
}

/// Project configuration for stash
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StashConfig {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    pub project: ProjectInfo,

    #[serde(default)]
    pub patterns: PatternConfig,

    #[serde(default)]
    pub routes: RouteConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub restore: RestoreConfig,
}

fn default_schema_version() -> u32 {
    1
}

/// The part of the configuration persisted inside a backup manifest
///
/// Fields are listed explicitly; storage and restore settings never leave
/// the machine through a backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub project: ProjectInfo,
    pub patterns: PatternConfig,
    pub routes: RouteConfig,
}

impl StashConfig {
    /// Default configuration for a project with the given name
    pub fn for_project(name: impl Into<String>) -> Self {
        Self {
            schema_version: default_schema_version(),
            project: ProjectInfo {
                name: name.into(),
                version: default_project_version(),
            },
            patterns: PatternConfig::default(),
            routes: RouteConfig::default(),
            storage: StorageConfig::default(),
            restore: RestoreConfig::default(),
        }
    }

    /// Load the config from disk, or fall back to defaults named after the
    /// project directory
    pub fn load_or_default(paths: &StashPaths) -> Result<Self, StashError> {
        let config_path = paths.config_file();

        if !config_path.exists() {
            return Ok(Self::for_project(paths.project_dir_name()));
        }

        let contents = std::fs::read_to_string(&config_path)
            .map_err(|e| StashError::Io(format!("Failed to read config file: {}", e)))?;

        let config: StashConfig = serde_json::from_str(&contents)
            .map_err(|e| StashError::Config(format!("Failed to parse config file: {}", e)))?;

        if config.project.name.trim().is_empty() {
            return Err(StashError::Config("project.name must not be empty".into()));
        }

        if config.storage.max_backups == 0 {
            return Err(StashError::Config(
                "storage.max_backups must be at least 1".into(),
            ));
        }

        Ok(config)
    }

    /// Save config to disk
    pub fn save(&self, paths: &StashPaths) -> Result<(), StashError> {
        write_json_atomic(paths.config_file(), self)
    }

    /// Resolved retention directory
    pub fn backup_dir(&self, paths: &StashPaths) -> PathBuf {
        match self.storage.local_path {
            Some(ref path) => paths.resolve(path),
            None => paths.default_backup_dir(),
        }
    }

    /// Allow-listed snapshot written into manifests
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            project: self.project.clone(),
            patterns: self.patterns.clone(),
            routes: self.routes.clone(),
        }
    }
}
