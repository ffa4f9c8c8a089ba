//! Backup manager for stash
//!
//! Drives one backup run from classification through archiving, and owns
//! listing and retention of the backups kept in the retention directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use zeroize::Zeroizing;

use crate::config::paths::StashPaths;
use crate::config::settings::StashConfig;
use crate::crypto::{encrypt, EncryptionKey};
use crate::error::{StashError, StashResult};
use crate::storage::file_io::{copy_file, ensure_parent, path_size, remove_path};

use super::archive::{create_archive, ARCHIVE_EXTENSION};
use super::classifier::{Classifier, PatternSet};
use super::id::BackupId;
use super::manifest::{BackupManifest, BackupStats};
use super::progress::{BackupStage, LogObserver, ProgressObserver};
use super::redactor::Redactor;
use super::report::BatchReport;

/// Hidden directory inside the retention path used for in-progress work
pub const STAGING_DIR: &str = ".staging";

/// Suffix appended to the relative path of every encrypted file
pub const ENCRYPTED_SUFFIX: &str = ".encrypted";

/// How a backup is stored in the retention directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupKind {
    /// `<id>.tar.gz`
    Archive,
    /// `<id>/`
    Directory,
}

impl BackupKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::Directory => "directory",
        }
    }
}

/// Metadata about a stored backup
#[derive(Debug, Clone)]
pub struct BackupInfo {
    pub id: BackupId,
    /// Full path to the archive file or directory
    pub path: PathBuf,
    pub kind: BackupKind,
    /// Creation time (modification time where unsupported)
    pub created_at: DateTime<Utc>,
    /// Size in bytes
    pub size_bytes: u64,
}

/// Result of a successful backup run
#[derive(Debug)]
pub struct BackupOutcome {
    pub id: BackupId,
    /// Final archive file or directory
    pub location: PathBuf,
    pub kind: BackupKind,
    /// Files that actually made it into the backup
    pub stats: BackupStats,
    /// Files that were skipped, with reasons
    pub report: BatchReport,
}

/// A regular file on its way into staging
#[derive(Debug, Clone)]
struct StagedFile {
    /// Where the bytes are read from (a redacted copy for route files)
    source: PathBuf,
    /// Original path in the working tree
    original: PathBuf,
    /// Path relative to the project root
    relative: PathBuf,
}

/// Exclusive working directory of one run
///
/// Removed when dropped unless the run completed or the caller asked to
/// keep failed staging for inspection.
struct StagingDir {
    path: PathBuf,
    keep_on_failure: bool,
    finished: bool,
}

impl StagingDir {
    fn create(path: PathBuf, keep_on_failure: bool) -> StashResult<Self> {
        remove_path(&path)?;
        fs::create_dir_all(&path).map_err(|e| {
            StashError::Io(format!(
                "Failed to create staging directory {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self {
            path,
            keep_on_failure,
            finished: false,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// The directory has been moved elsewhere; nothing left to clean up
    fn release(mut self) {
        self.finished = true;
    }

    /// Delete the directory now
    fn remove(mut self) -> StashResult<()> {
        self.finished = true;
        remove_path(&self.path)
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if self.keep_on_failure {
            tracing::warn!(path = %self.path.display(), "keeping staging directory of failed run");
        } else if let Err(e) = remove_path(&self.path) {
            tracing::warn!("failed to clean up staging directory: {}", e);
        }
    }
}

/// Manages backup creation and retention
pub struct BackupManager {
    paths: StashPaths,
    config: StashConfig,
    /// Retention directory
    backup_dir: PathBuf,
    key: Option<EncryptionKey>,
    observer: Rc<dyn ProgressObserver>,
}

impl BackupManager {
    /// Create a new BackupManager
    pub fn new(paths: StashPaths, config: StashConfig) -> Self {
        let backup_dir = config.backup_dir(&paths);
        Self {
            paths,
            config,
            backup_dir,
            key: None,
            observer: Rc::new(LogObserver),
        }
    }

    /// Use `key` for files marked for encryption
    pub fn with_key(mut self, key: EncryptionKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Report stage transitions to `observer`
    pub fn with_observer(mut self, observer: Rc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Get backup directory path
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Create a backup, archiving it if compression is configured
    pub fn create_backup(&self) -> StashResult<BackupOutcome> {
        self.create_backup_with(self.config.storage.compression)
    }

    /// Create a backup, choosing archive or directory form explicitly
    pub fn create_backup_with(&self, compress: bool) -> StashResult<BackupOutcome> {
        let stage = BackupStage::Initializing;
        self.observer.backup_stage(stage);

        let id = BackupId::generate(&self.config.project.name, Utc::now());
        let staging_root = self.backup_dir.join(STAGING_DIR);
        let keep = self.config.storage.keep_failed_staging;

        let staging = StagingDir::create(staging_root.join(id.as_str()), keep)
            .map_err(|e| e.at_stage(stage.name()))?;
        let scratch = StagingDir::create(
            staging_root.join(format!("{}.redacted", id.as_str())),
            keep,
        )
        .map_err(|e| e.at_stage(stage.name()))?;

        // Every pattern is compiled before the tree is touched
        let stage = BackupStage::Classifying;
        self.observer.backup_stage(stage);
        let (regular, encrypted) = self.classify().map_err(|e| e.at_stage(stage.name()))?;

        let stage = BackupStage::Redacting;
        self.observer.backup_stage(stage);
        let mut report = BatchReport::default();
        let regular = self
            .redact_route_files(regular, scratch.path(), &mut report)
            .map_err(|e| e.at_stage(stage.name()))?;

        self.observer.backup_stage(BackupStage::Encrypting);
        let encrypted_report = self.encrypt_files(&encrypted, staging.path());

        self.observer.backup_stage(BackupStage::Copying);
        let copied_report = self.copy_files(&regular, staging.path());

        let stats = BackupStats {
            regular: copied_report.success_count(),
            encrypted: encrypted_report.success_count(),
        };
        report.merge(encrypted_report);
        report.merge(copied_report);

        let stage = BackupStage::ManifestWriting;
        self.observer.backup_stage(stage);
        BackupManifest::new(id.clone(), &self.config, stats)
            .write(staging.path())
            .map_err(|e| e.at_stage(stage.name()))?;

        if let Err(e) = scratch.remove() {
            tracing::warn!("failed to remove redaction scratch directory: {}", e);
        }

        let (location, kind) = if compress {
            let stage = BackupStage::Archiving;
            self.observer.backup_stage(stage);

            let dest = self
                .backup_dir
                .join(format!("{}.{}", id.as_str(), ARCHIVE_EXTENSION));
            let size = create_archive(staging.path(), &dest).map_err(|e| e.at_stage(stage.name()))?;
            tracing::debug!(size, "archive written");

            if let Err(e) = staging.remove() {
                tracing::warn!("failed to remove staging directory: {}", e);
            }
            (dest, BackupKind::Archive)
        } else {
            let stage = BackupStage::Moving;
            self.observer.backup_stage(stage);

            let dest = self.backup_dir.join(id.as_str());
            remove_path(&dest).map_err(|e| e.at_stage(stage.name()))?;
            fs::rename(staging.path(), &dest).map_err(|e| {
                StashError::Io(format!(
                    "Failed to move backup into {}: {}",
                    dest.display(),
                    e
                ))
                .at_stage(stage.name())
            })?;
            staging.release();
            (dest, BackupKind::Directory)
        };

        self.observer.backup_stage(BackupStage::Done);
        tracing::info!(
            id = %id,
            regular = stats.regular,
            encrypted = stats.encrypted,
            failed = report.failed.len(),
            "backup complete"
        );

        Ok(BackupOutcome {
            id,
            location,
            kind,
            stats,
            report,
        })
    }

    /// Create a backup and then enforce the retention policy
    ///
    /// A retention failure is logged; the new backup stands regardless.
    pub fn create_backup_with_retention(
        &self,
        compress: bool,
    ) -> StashResult<(BackupOutcome, Vec<PathBuf>)> {
        let outcome = self.create_backup_with(compress)?;
        let deleted = match self.enforce_retention() {
            Ok(deleted) => deleted,
            Err(e) => {
                tracing::warn!("retention pruning failed: {}", e);
                Vec::new()
            }
        };
        Ok((outcome, deleted))
    }

    /// Regular and encrypted file sets of the working tree
    fn classify(&self) -> StashResult<(Vec<StagedFile>, Vec<PathBuf>)> {
        let classifier = Classifier::new(&self.config.patterns)?;
        PatternSet::new(&self.config.routes.patterns)?;

        let root = self.paths.project_root();
        let buckets = classifier.classify(root, &[self.backup_dir.clone()])?;

        let regular = buckets
            .regular()
            .into_iter()
            .map(|path| StagedFile {
                relative: buckets.relative(&path).to_path_buf(),
                source: path.clone(),
                original: path,
            })
            .collect();

        Ok((regular, buckets.encrypted().into_iter().collect()))
    }

    /// Swap route files for redacted copies written under `scratch`
    ///
    /// A route file that cannot be read or redacted is dropped from the
    /// backup; its unredacted original is never used instead.
    fn redact_route_files(
        &self,
        files: Vec<StagedFile>,
        scratch: &Path,
        report: &mut BatchReport,
    ) -> StashResult<Vec<StagedFile>> {
        let routes = PatternSet::new(&self.config.routes.patterns)?;
        if routes.is_empty() {
            return Ok(files);
        }
        let redactor = Redactor::new()?;

        let mut staged = Vec::with_capacity(files.len());
        let mut redacted = 0usize;

        for mut file in files {
            if !routes.is_match(&file.relative) {
                staged.push(file);
                continue;
            }

            let copy = scratch.join(&file.relative);
            match redact_to(&redactor, &file.source, &copy) {
                Ok(()) => {
                    redacted += 1;
                    file.source = copy;
                    staged.push(file);
                }
                Err(e) => {
                    let reason = format!("{} file left out of backup: {}", self.config.routes.name, e);
                    self.observer.file_warning(&file.original, &reason);
                    report.fail(&file.original, reason);
                }
            }
        }

        tracing::debug!(category = %self.config.routes.name, redacted, "route files redacted");
        Ok(staged)
    }

    /// Encrypt each file into `<staging>/<relative>.encrypted`
    fn encrypt_files(&self, files: &[PathBuf], staging: &Path) -> BatchReport {
        let root = self.paths.project_root();
        let mut report = BatchReport::default();

        for path in files {
            let relative = path.strip_prefix(root).unwrap_or(path);
            let dest = staging.join(encrypted_name(relative));
            let result = self.encrypt_file(path, &dest);

            if let Err(ref e) = result {
                self.observer.file_warning(path, &format!("encryption failed: {}", e));
            }
            report.record(path, result);
        }

        report
    }

    fn encrypt_file(&self, source: &Path, dest: &Path) -> StashResult<()> {
        let key = self
            .key
            .as_ref()
            .ok_or_else(|| StashError::Encryption("no encryption key loaded".into()))?;

        let plaintext = Zeroizing::new(fs::read(source)?);
        let envelope = encrypt(&plaintext, key)?;

        ensure_parent(dest)?;
        fs::write(dest, envelope.to_json()?)?;
        Ok(())
    }

    /// Copy each regular file byte-for-byte into staging
    fn copy_files(&self, files: &[StagedFile], staging: &Path) -> BatchReport {
        let mut report = BatchReport::default();

        for file in files {
            let result = copy_file(&file.source, &staging.join(&file.relative)).map(|_| ());
            if let Err(ref e) = result {
                self.observer.file_warning(&file.original, &format!("copy failed: {}", e));
            }
            report.record(&file.original, result);
        }

        report
    }

    /// List all available backups, newest first
    pub fn list_backups(&self) -> StashResult<Vec<BackupInfo>> {
        list_backups_in(&self.backup_dir)
    }

    /// Enforce retention policy by deleting old backups
    ///
    /// The newest backup always survives, whatever `max_backups` says.
    pub fn enforce_retention(&self) -> StashResult<Vec<PathBuf>> {
        self.prune(self.config.storage.max_backups.max(1))
    }

    /// Delete every backup beyond the `keep` newest
    pub fn prune(&self, keep: usize) -> StashResult<Vec<PathBuf>> {
        let backups = self.list_backups()?;
        let mut deleted = Vec::new();

        for backup in backups.into_iter().skip(keep) {
            remove_path(&backup.path).map_err(|e| {
                StashError::Io(format!("Failed to delete old backup {}: {}", backup.id, e))
            })?;
            tracing::info!(id = %backup.id, "pruned backup");
            deleted.push(backup.path);
        }

        Ok(deleted)
    }

    /// Get a specific backup by identifier
    pub fn get_backup(&self, id: &str) -> StashResult<Option<BackupInfo>> {
        let id = id
            .strip_suffix(&format!(".{}", ARCHIVE_EXTENSION))
            .unwrap_or(id);
        Ok(self
            .list_backups()?
            .into_iter()
            .find(|b| b.id.as_str() == id))
    }

    /// Get the most recent backup
    pub fn get_latest_backup(&self) -> StashResult<Option<BackupInfo>> {
        Ok(self.list_backups()?.into_iter().next())
    }
}

/// `<relative>.encrypted`
pub fn encrypted_name(relative: &Path) -> PathBuf {
    let mut name = relative.as_os_str().to_owned();
    name.push(ENCRYPTED_SUFFIX);
    PathBuf::from(name)
}

fn redact_to(redactor: &Redactor, source: &Path, dest: &Path) -> StashResult<()> {
    let content = fs::read(source)?;
    let redacted = redactor.redact(&content);
    ensure_parent(dest)?;
    fs::write(dest, redacted.as_ref())?;
    Ok(())
}

/// List the backups stored in `backup_dir`, newest first
///
/// Directories and `.tar.gz` files both count; hidden entries (staging)
/// and anything else are ignored.
pub fn list_backups_in(backup_dir: &Path) -> StashResult<Vec<BackupInfo>> {
    if !backup_dir.exists() {
        return Ok(Vec::new());
    }

    let mut backups = Vec::new();
    let archive_suffix = format!(".{}", ARCHIVE_EXTENSION);

    for entry in fs::read_dir(backup_dir)
        .map_err(|e| StashError::Io(format!("Failed to read backup directory: {}", e)))?
    {
        let entry =
            entry.map_err(|e| StashError::Io(format!("Failed to read directory entry: {}", e)))?;

        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(entry = %name, "skipping unreadable backup entry: {}", e);
                continue;
            }
        };

        let (id, kind) = if metadata.is_dir() {
            (name.clone(), BackupKind::Directory)
        } else if let Some(stem) = name.strip_suffix(&archive_suffix) {
            (stem.to_string(), BackupKind::Archive)
        } else {
            continue;
        };

        let created_at = metadata
            .created()
            .or_else(|_| metadata.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        let path = entry.path();
        let size_bytes = path_size(&path);

        backups.push(BackupInfo {
            id: BackupId::from_name(id),
            path,
            kind,
            created_at,
            size_bytes,
        });
    }

    // Newest first; identifiers embed the timestamp so they break ties
    backups.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });

    Ok(backups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::manifest::MANIFEST_FILE;
    use crate::backup::progress::RecordingObserver;
    use crate::crypto::{decrypt, Envelope};
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn create_test_manager(max_backups: usize, compression: bool) -> (BackupManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "a.txt", "alpha");
        write(root, "secret.env", "API_KEY=live");
        write(root, "node_modules/x", "dependency");
        write(root, "src/routes/api.js", "const TOKEN = \"abc123\";\nrouter.get('/');\n");

        let paths = StashPaths::with_project_root(root.to_path_buf());
        let mut config = StashConfig::for_project("demo");
        config.storage.max_backups = max_backups;
        config.storage.compression = compression;

        let manager = BackupManager::new(paths, config).with_key(EncryptionKey::generate());
        (manager, temp_dir)
    }

    #[test]
    fn test_directory_backup_contents() {
        let (manager, _temp) = create_test_manager(5, false);

        let outcome = manager.create_backup().unwrap();
        assert_eq!(outcome.kind, BackupKind::Directory);
        assert!(outcome.location.is_dir());

        let dir = &outcome.location;
        assert_eq!(fs::read_to_string(dir.join("a.txt")).unwrap(), "alpha");
        assert!(dir.join(MANIFEST_FILE).exists());
        assert!(!dir.join("node_modules").exists());
        assert!(!dir.join("secret.env").exists());

        let route = fs::read_to_string(dir.join("src/routes/api.js")).unwrap();
        assert!(route.contains("TOKEN=\"\""));
        assert!(!route.contains("abc123"));

        assert_eq!(outcome.stats.regular, 2);
        assert_eq!(outcome.stats.encrypted, 1);
        assert!(!outcome.report.has_failures());
    }

    #[test]
    fn test_encrypted_envelope_decrypts() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "secret.env", "API_KEY=live");

        let key_dir = TempDir::new().unwrap();
        let key_file = key_dir.path().join("demo.key");
        EncryptionKey::generate().save(&key_file).unwrap();

        let paths = StashPaths::with_project_root(temp_dir.path().to_path_buf());
        let mut config = StashConfig::for_project("demo");
        config.storage.compression = false;
        let manager = BackupManager::new(paths, config)
            .with_key(EncryptionKey::load(&key_file).unwrap());

        let outcome = manager.create_backup().unwrap();
        let json = fs::read_to_string(outcome.location.join("secret.env.encrypted")).unwrap();
        let key = EncryptionKey::load(&key_file).unwrap();
        let plaintext = decrypt(&Envelope::from_json(&json).unwrap(), &key).unwrap();
        assert_eq!(plaintext, b"API_KEY=live");
    }

    #[test]
    fn test_original_route_file_untouched() {
        let (manager, temp) = create_test_manager(5, false);
        manager.create_backup().unwrap();

        let original = fs::read_to_string(temp.path().join("src/routes/api.js")).unwrap();
        assert!(original.contains("abc123"));
    }

    #[test]
    fn test_archive_backup_and_staging_cleanup() {
        let (manager, _temp) = create_test_manager(5, true);

        let outcome = manager.create_backup().unwrap();
        assert_eq!(outcome.kind, BackupKind::Archive);
        assert!(outcome.location.is_file());
        assert!(outcome
            .location
            .to_string_lossy()
            .ends_with(&format!("{}.tar.gz", outcome.id)));

        let staging = manager.backup_dir().join(STAGING_DIR);
        let leftovers: Vec<_> = fs::read_dir(&staging).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_missing_key_is_per_file_warning() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "a.txt", "alpha");
        write(temp_dir.path(), "secret.env", "API_KEY=live");

        let paths = StashPaths::with_project_root(temp_dir.path().to_path_buf());
        let mut config = StashConfig::for_project("demo");
        config.storage.compression = false;
        let observer = Rc::new(RecordingObserver::default());
        let manager = BackupManager::new(paths, config).with_observer(observer.clone());

        let outcome = manager.create_backup().unwrap();
        assert_eq!(outcome.stats.encrypted, 0);
        assert_eq!(outcome.stats.regular, 1);
        assert_eq!(outcome.report.failed.len(), 1);
        assert_eq!(observer.warnings.borrow().len(), 1);

        let manifest = BackupManifest::read(&outcome.location).unwrap();
        assert_eq!(manifest.stats, outcome.stats);
    }

    #[test]
    fn test_stage_order() {
        let (manager, _temp) = create_test_manager(5, true);
        let observer = Rc::new(RecordingObserver::default());
        let manager = manager.with_observer(observer.clone());

        manager.create_backup().unwrap();

        assert_eq!(
            *observer.backup.borrow(),
            vec![
                BackupStage::Initializing,
                BackupStage::Classifying,
                BackupStage::Redacting,
                BackupStage::Encrypting,
                BackupStage::Copying,
                BackupStage::ManifestWriting,
                BackupStage::Archiving,
                BackupStage::Done,
            ]
        );
    }

    #[test]
    fn test_invalid_pattern_fails_classifying() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "a.txt", "alpha");

        let paths = StashPaths::with_project_root(temp_dir.path().to_path_buf());
        let mut config = StashConfig::for_project("demo");
        config.patterns.exclude.push("[broken".to_string());
        let manager = BackupManager::new(paths, config);

        let err = manager.create_backup().unwrap_err();
        assert_eq!(err.stage(), Some("Classifying"));
        assert!(matches!(err.root(), StashError::Pattern(_)));

        // Failed staging is cleaned up by default
        let staging = manager.backup_dir().join(STAGING_DIR);
        assert_eq!(fs::read_dir(&staging).unwrap().count(), 0);
    }

    #[test]
    fn test_keep_failed_staging() {
        let temp_dir = TempDir::new().unwrap();
        let paths = StashPaths::with_project_root(temp_dir.path().to_path_buf());
        let mut config = StashConfig::for_project("demo");
        config.patterns.include = vec!["[broken".to_string()];
        config.storage.keep_failed_staging = true;
        let manager = BackupManager::new(paths, config);

        assert!(manager.create_backup().is_err());

        let staging = manager.backup_dir().join(STAGING_DIR);
        assert_eq!(fs::read_dir(&staging).unwrap().count(), 2);
    }

    #[test]
    fn test_list_backups_newest_first() {
        let (manager, _temp) = create_test_manager(5, true);

        let first = manager.create_backup_with(true).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(50));
        let second = manager.create_backup_with(false).unwrap();

        let backups = manager.list_backups().unwrap();
        assert_eq!(backups.len(), 2);
        assert_eq!(backups[0].id, second.id);
        assert_eq!(backups[0].kind, BackupKind::Directory);
        assert_eq!(backups[1].id, first.id);
        assert_eq!(backups[1].kind, BackupKind::Archive);
        assert!(backups[0].created_at >= backups[1].created_at);
    }

    #[test]
    fn test_retention_keeps_newest() {
        let (manager, _temp) = create_test_manager(3, true);

        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(manager.create_backup_with(i % 2 == 0).unwrap().id);
            std::thread::sleep(std::time::Duration::from_millis(50));
        }

        let deleted = manager.enforce_retention().unwrap();
        assert_eq!(deleted.len(), 2);

        let remaining: Vec<BackupId> = manager
            .list_backups()
            .unwrap()
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(remaining, vec![ids[4].clone(), ids[3].clone(), ids[2].clone()]);
    }

    #[test]
    fn test_create_backup_with_retention() {
        let (manager, _temp) = create_test_manager(2, true);

        for _ in 0..2 {
            manager.create_backup().unwrap();
            std::thread::sleep(std::time::Duration::from_millis(50));
        }

        let (outcome, deleted) = manager.create_backup_with_retention(true).unwrap();
        assert!(outcome.location.exists());
        assert_eq!(deleted.len(), 1);
        assert_eq!(manager.list_backups().unwrap().len(), 2);
    }

    #[test]
    fn test_retention_never_removes_new_backup() {
        let (manager, _temp) = create_test_manager(0, true);
        manager.create_backup().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(50));

        let (outcome, deleted) = manager.create_backup_with_retention(true).unwrap();
        assert!(outcome.location.exists());
        assert_eq!(deleted.len(), 1);
        assert_ne!(deleted[0], outcome.location);

        let remaining = manager.list_backups().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, outcome.id);
    }

    #[test]
    fn test_get_backup_and_latest() {
        let (manager, _temp) = create_test_manager(5, true);
        assert!(manager.get_latest_backup().unwrap().is_none());

        let outcome = manager.create_backup().unwrap();

        let latest = manager.get_latest_backup().unwrap().unwrap();
        assert_eq!(latest.path, outcome.location);

        let by_name = format!("{}.tar.gz", outcome.id);
        assert!(manager.get_backup(&by_name).unwrap().is_some());
        assert!(manager.get_backup("nope").unwrap().is_none());
    }

    #[test]
    fn test_unrelated_entries_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::create_dir_all(dir.join(".staging")).unwrap();
        fs::write(dir.join("notes.txt"), "x").unwrap();
        fs::write(dir.join("demo-1.tar.gz.partial"), "x").unwrap();
        fs::write(dir.join("demo-2.tar.gz"), "x").unwrap();

        let backups = list_backups_in(dir).unwrap();
        assert_eq!(backups.len(), 1);
        assert_eq!(backups[0].id.as_str(), "demo-2");
    }

    #[test]
    fn test_encrypted_name() {
        assert_eq!(
            encrypted_name(Path::new("config/prod.env")),
            PathBuf::from("config/prod.env.encrypted")
        );
    }
}
