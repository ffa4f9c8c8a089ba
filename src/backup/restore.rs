//! Backup restoration for stash
//!
//! Locates a backup, unpacks it into a private work area, checks that it
//! belongs to this project and then merges its regular files over the
//! working tree. Encrypted files stay sealed.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::paths::{StashPaths, TOOLING_DIR};
use crate::config::settings::StashConfig;
use crate::error::{StashError, StashResult};
use crate::storage::file_io::{copy_dir_all, copy_file, remove_path};

use super::archive::{extract_archive, ARCHIVE_EXTENSION};
use super::hooks::{
    merge_env_value, CommandRunner, NoSecretProvider, SecretProvider, SystemCommandRunner,
};
use super::id::BackupId;
use super::manager::{list_backups_in, BackupKind, ENCRYPTED_SUFFIX, STAGING_DIR};
use super::manifest::{BackupManifest, MANIFEST_FILE};
use super::progress::{LogObserver, ProgressObserver, RestoreStage};
use super::report::BatchReport;

/// Handles restoring from backups
pub struct RestoreManager {
    paths: StashPaths,
    config: StashConfig,
    backup_dir: PathBuf,
    runner: Rc<dyn CommandRunner>,
    secrets: Rc<dyn SecretProvider>,
    observer: Rc<dyn ProgressObserver>,
    run_hooks: bool,
}

/// Result of a restore operation
#[derive(Debug)]
pub struct RestoreResult {
    pub backup_id: BackupId,
    pub manifest: BackupManifest,
    /// Restored files, relative to the project root
    pub files: BatchReport,
    /// Encrypted files present in the backup but not materialized
    pub skipped_encrypted: Vec<PathBuf>,
    /// Best-effort steps that failed, with guidance
    pub warnings: Vec<String>,
    /// Whether a secret was merged into the env file
    pub secret_configured: bool,
}

impl RestoreResult {
    /// Get a summary of what was restored
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("{} file(s) restored", self.files.success_count())];
        if !self.files.failed.is_empty() {
            parts.push(format!("{} failed", self.files.failed.len()));
        }
        if !self.skipped_encrypted.is_empty() {
            parts.push(format!(
                "{} encrypted file(s) left encrypted",
                self.skipped_encrypted.len()
            ));
        }
        if self.secret_configured {
            parts.push("secret configured".to_string());
        }
        parts.join(", ")
    }

    /// Whether everything went through without warnings
    pub fn is_clean(&self) -> bool {
        !self.files.has_failures() && self.warnings.is_empty()
    }
}

/// An extracted backup waiting to be read
struct Extracted {
    /// Work area to delete afterwards
    work_dir: PathBuf,
    /// Directory holding the manifest (work_dir or one level below)
    content_root: Option<PathBuf>,
}

impl RestoreManager {
    /// Create a new RestoreManager that restores into the project root
    pub fn new(paths: StashPaths, config: StashConfig) -> Self {
        let backup_dir = config.backup_dir(&paths);
        Self {
            paths,
            config,
            backup_dir,
            runner: Rc::new(SystemCommandRunner),
            secrets: Rc::new(NoSecretProvider),
            observer: Rc::new(LogObserver),
            run_hooks: true,
        }
    }

    pub fn with_runner(mut self, runner: Rc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_secret_provider(mut self, secrets: Rc<dyn SecretProvider>) -> Self {
        self.secrets = secrets;
        self
    }

    pub fn with_observer(mut self, observer: Rc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Skip dependency installation and schema setup
    pub fn without_hooks(mut self) -> Self {
        self.run_hooks = false;
        self
    }

    /// Restore the backup named `identifier` into the project root
    ///
    /// Nothing in the working tree is written before the manifest has been
    /// read and the project identity checked.
    pub fn restore(&self, identifier: &str) -> StashResult<RestoreResult> {
        let extracted = self.extract(identifier)?;
        let manifest = self.read_and_validate(&extracted)?;

        let stage = RestoreStage::RestoringFiles;
        self.observer.restore_stage(stage);
        let target = self.paths.project_root();
        let (files, skipped_encrypted) = match extracted.content_root {
            Some(ref root) => self.restore_tree(root, target),
            None => (BatchReport::default(), Vec::new()),
        };

        if let Err(e) = remove_path(&extracted.work_dir) {
            tracing::warn!("failed to remove restore work area: {}", e);
        }

        let mut warnings: Vec<String> = files
            .failed
            .iter()
            .map(|f| format!("{}: {}", f.path.display(), f.reason))
            .collect();

        if self.run_hooks {
            warnings.extend(self.run_setup_hooks(target));
        }

        let secret_configured = match self.configure(target) {
            Ok(configured) => configured,
            Err(e) => {
                let message = format!("could not configure secret: {}", e);
                tracing::warn!("{}", message);
                warnings.push(message);
                false
            }
        };

        self.observer.restore_stage(RestoreStage::Done);
        tracing::info!(
            id = %manifest.id,
            restored = files.success_count(),
            failed = files.failed.len(),
            "restore complete"
        );

        Ok(RestoreResult {
            backup_id: manifest.id.clone(),
            manifest,
            files,
            skipped_encrypted,
            warnings,
            secret_configured,
        })
    }

    /// Read a backup's manifest without touching the working tree
    pub fn inspect(&self, identifier: &str) -> StashResult<BackupManifest> {
        let extracted = self.extract(identifier)?;
        let result = match extracted.content_root {
            Some(ref root) => BackupManifest::read(root),
            None => Err(StashError::InvalidBackup(format!(
                "no {} found in {}",
                MANIFEST_FILE, identifier
            ))),
        };
        if let Err(e) = remove_path(&extracted.work_dir) {
            tracing::warn!("failed to remove inspection work area: {}", e);
        }
        result.map_err(|e| e.at_stage(RestoreStage::ReadingManifest.name()))
    }

    /// Locating and Extracting
    fn extract(&self, identifier: &str) -> StashResult<Extracted> {
        let stage = RestoreStage::Locating;
        self.observer.restore_stage(stage);
        let (source, kind) = self
            .locate(identifier)
            .map_err(|e| e.at_stage(stage.name()))?;

        let stage = RestoreStage::Extracting;
        self.observer.restore_stage(stage);
        let work_dir = self
            .backup_dir
            .join(STAGING_DIR)
            .join(format!("restore-{}", Uuid::new_v4().simple()));

        let unpacked = match kind {
            BackupKind::Archive => extract_archive(&source, &work_dir),
            BackupKind::Directory => copy_dir_all(&source, &work_dir),
        };
        if let Err(e) = unpacked {
            tracing::warn!(path = %work_dir.display(), "extraction left in place for inspection");
            return Err(e.at_stage(stage.name()));
        }

        let content_root = BackupManifest::locate(&work_dir);
        Ok(Extracted {
            work_dir,
            content_root,
        })
    }

    /// ReadingManifest and Validating
    fn read_and_validate(&self, extracted: &Extracted) -> StashResult<BackupManifest> {
        let stage = RestoreStage::ReadingManifest;
        self.observer.restore_stage(stage);
        let root = extracted.content_root.as_ref().ok_or_else(|| {
            StashError::InvalidBackup(format!("no {} found", MANIFEST_FILE)).at_stage(stage.name())
        })?;
        let manifest = BackupManifest::read(root).map_err(|e| e.at_stage(stage.name()))?;

        let stage = RestoreStage::Validating;
        self.observer.restore_stage(stage);
        if manifest.project_name != self.config.project.name {
            return Err(StashError::ProjectMismatch {
                expected: self.config.project.name.clone(),
                found: manifest.project_name,
            }
            .at_stage(stage.name()));
        }

        Ok(manifest)
    }

    /// Find `<id>.tar.gz` or `<id>/` in the retention directory
    fn locate(&self, identifier: &str) -> StashResult<(PathBuf, BackupKind)> {
        let archive_suffix = format!(".{}", ARCHIVE_EXTENSION);
        let id = identifier.strip_suffix(&archive_suffix).unwrap_or(identifier);

        let plausible = !id.is_empty()
            && !id.starts_with('.')
            && !id.contains(&['/', '\\'][..]);

        if plausible {
            let archive = self.backup_dir.join(format!("{}{}", id, archive_suffix));
            if archive.is_file() {
                return Ok((archive, BackupKind::Archive));
            }

            let directory = self.backup_dir.join(id);
            if directory.is_dir() {
                return Ok((directory, BackupKind::Directory));
            }
        }

        match list_backups_in(&self.backup_dir) {
            Ok(available) if !available.is_empty() => {
                for backup in available {
                    tracing::info!(id = %backup.id, kind = backup.kind.label(), "available backup");
                }
            }
            _ => tracing::info!(dir = %self.backup_dir.display(), "no backups available"),
        }

        Err(StashError::backup_not_found(identifier))
    }

    /// Merge the extracted tree over `target`
    fn restore_tree(&self, source: &Path, target: &Path) -> (BatchReport, Vec<PathBuf>) {
        let mut report = BatchReport::default();
        let mut skipped = Vec::new();

        let walker = WalkDir::new(source)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !(e.file_type().is_dir() && e.file_name() == TOOLING_DIR));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(source).to_path_buf();
                    report.fail(&path, e.to_string());
                    continue;
                }
            };

            let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
            if entry.depth() == 1 && entry.file_name() == MANIFEST_FILE {
                continue;
            }

            // Directories are created on demand by the copy below
            if !entry.file_type().is_file() {
                continue;
            }

            if entry.file_name().to_string_lossy().ends_with(ENCRYPTED_SUFFIX) {
                skipped.push(relative.to_path_buf());
                continue;
            }

            let result = copy_with_retry(entry.path(), &target.join(relative));
            if let Err(ref e) = result {
                self.observer.file_warning(relative, &format!("restore failed: {}", e));
            }
            report.record(relative, result);
        }

        (report, skipped)
    }

    /// Dependency installation and schema setup; failures become warnings
    fn run_setup_hooks(&self, target: &Path) -> Vec<String> {
        let restore = &self.config.restore;
        let mut warnings = Vec::new();

        let steps = [
            (
                RestoreStage::InstallingDependencies,
                restore.dependency_manifest.as_ref().filter(|p| target.join(p).is_file()),
                &restore.install_command,
                "dependency installation",
            ),
            (
                RestoreStage::SettingUpSchema,
                restore.schema_dir.as_ref().filter(|p| target.join(p).is_dir()),
                &restore.schema_command,
                "schema setup",
            ),
        ];

        for (stage, trigger, command, label) in steps {
            if trigger.is_none() || command.is_empty() {
                continue;
            }

            self.observer.restore_stage(stage);
            if let Err(e) = self.runner.run(command, target) {
                let message = format!(
                    "{} failed ({}); run `{}` manually",
                    label,
                    e,
                    command.join(" ")
                );
                tracing::warn!("{}", message);
                warnings.push(message);
            }
        }

        warnings
    }

    /// Ask for the configured secret and merge it into the env file
    fn configure(&self, target: &Path) -> StashResult<bool> {
        self.observer.restore_stage(RestoreStage::Configuring);

        let restore = &self.config.restore;
        let key = match restore.secret_key {
            Some(ref key) => key,
            None => return Ok(false),
        };

        let secret = match self.secrets.provide(key)? {
            Some(secret) => secret,
            None => {
                tracing::debug!(key = %key, "secret not provided, skipping");
                return Ok(false);
            }
        };

        merge_env_value(&target.join(&restore.env_file), key, secret.as_str())?;
        Ok(true)
    }
}

/// Copy a file; on failure remove the destination and try once more
fn copy_with_retry(source: &Path, dest: &Path) -> StashResult<()> {
    match copy_file(source, dest) {
        Ok(_) => Ok(()),
        Err(first) => {
            tracing::debug!(path = %dest.display(), "copy failed, retrying: {}", first);
            remove_path(dest)?;
            copy_file(source, dest).map(|_| ())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::archive::create_archive;
    use crate::backup::hooks::StaticSecretProvider;
    use crate::backup::manager::BackupManager;
    use crate::backup::manifest::BackupStats;
    use crate::backup::progress::RecordingObserver;
    use crate::crypto::{EncryptionKey, SecureString};
    use std::cell::RefCell;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingRunner {
        calls: RefCell<Vec<Vec<String>>>,
        fail: bool,
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, command: &[String], _cwd: &Path) -> StashResult<()> {
            self.calls.borrow_mut().push(command.to_vec());
            if self.fail {
                Err(StashError::Hook("exit status 1".into()))
            } else {
                Ok(())
            }
        }
    }

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn create_test_env(compression: bool) -> (StashPaths, StashConfig, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "a.txt", "alpha");
        write(root, "docs/guide.md", "guide");
        write(root, "secret.env", "API_KEY=live");

        let paths = StashPaths::with_project_root(root.to_path_buf());
        let mut config = StashConfig::for_project("demo");
        config.storage.compression = compression;
        (paths, config, temp_dir)
    }

    fn backup(paths: &StashPaths, config: &StashConfig) -> BackupId {
        BackupManager::new(paths.clone(), config.clone())
            .with_key(EncryptionKey::generate())
            .create_backup()
            .unwrap()
            .id
    }

    fn quiet(paths: &StashPaths, config: &StashConfig) -> RestoreManager {
        RestoreManager::new(paths.clone(), config.clone()).without_hooks()
    }

    #[test]
    fn test_restore_archive() {
        let (paths, config, temp) = create_test_env(true);
        let id = backup(&paths, &config);

        fs::remove_file(temp.path().join("a.txt")).unwrap();
        fs::remove_dir_all(temp.path().join("docs")).unwrap();

        let result = quiet(&paths, &config).restore(id.as_str()).unwrap();

        assert_eq!(fs::read_to_string(temp.path().join("a.txt")).unwrap(), "alpha");
        assert_eq!(
            fs::read_to_string(temp.path().join("docs/guide.md")).unwrap(),
            "guide"
        );
        assert_eq!(result.files.success_count(), 2);
        assert_eq!(result.skipped_encrypted, vec![PathBuf::from("secret.env.encrypted")]);
        assert!(!temp.path().join("secret.env.encrypted").exists());
        assert!(!temp.path().join(MANIFEST_FILE).exists());
        assert!(result.is_clean());
    }

    #[test]
    fn test_restore_directory_overwrites() {
        let (paths, config, temp) = create_test_env(false);
        let id = backup(&paths, &config);

        fs::write(temp.path().join("a.txt"), "changed").unwrap();
        quiet(&paths, &config).restore(id.as_str()).unwrap();

        assert_eq!(fs::read_to_string(temp.path().join("a.txt")).unwrap(), "alpha");
    }

    #[test]
    fn test_work_area_cleaned_after_restore() {
        let (paths, config, _temp) = create_test_env(true);
        let id = backup(&paths, &config);

        let manager = quiet(&paths, &config);
        manager.restore(id.as_str()).unwrap();

        let staging = manager.backup_dir.join(STAGING_DIR);
        assert_eq!(fs::read_dir(staging).unwrap().count(), 0);
    }

    #[test]
    fn test_not_found() {
        let (paths, config, _temp) = create_test_env(true);
        backup(&paths, &config);

        let err = quiet(&paths, &config).restore("missing-id").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.stage(), Some("Locating"));

        let err = quiet(&paths, &config).restore("../escape").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_project_mismatch_writes_nothing() {
        let (paths, config, temp) = create_test_env(true);
        let id = backup(&paths, &config);

        fs::remove_file(temp.path().join("a.txt")).unwrap();

        let mut other = config.clone();
        other.project.name = "other".to_string();
        let observer = Rc::new(RecordingObserver::default());
        let err = quiet(&paths, &other)
            .with_observer(observer.clone())
            .restore(id.as_str())
            .unwrap_err();

        assert!(err.is_project_mismatch());
        assert_eq!(err.stage(), Some("Validating"));
        assert!(!temp.path().join("a.txt").exists());
        assert!(!observer.restore.borrow().contains(&RestoreStage::RestoringFiles));
    }

    #[test]
    fn test_backup_without_manifest_is_invalid() {
        let (paths, config, _temp) = create_test_env(false);
        let backup_dir = config.backup_dir(&paths);
        write(&backup_dir, "demo-broken/a.txt", "alpha");

        let err = quiet(&paths, &config).restore("demo-broken").unwrap_err();
        assert!(matches!(err.root(), StashError::InvalidBackup(_)));
        assert_eq!(err.stage(), Some("ReadingManifest"));
    }

    #[test]
    fn test_nested_archive_layout() {
        let (paths, config, temp) = create_test_env(true);
        let backup_dir = config.backup_dir(&paths);

        let build = TempDir::new().unwrap();
        let nested = build.path().join("demo-nested");
        write(&nested, "restored.txt", "from nested");
        BackupManifest::new(BackupId::from_name("demo-nested"), &config, BackupStats::default())
            .write(&nested)
            .unwrap();
        fs::create_dir_all(&backup_dir).unwrap();
        create_archive(build.path(), &backup_dir.join("demo-nested.tar.gz")).unwrap();

        quiet(&paths, &config).restore("demo-nested.tar.gz").unwrap();

        assert_eq!(
            fs::read_to_string(temp.path().join("restored.txt")).unwrap(),
            "from nested"
        );
    }

    #[test]
    fn test_encrypted_only_directory_not_recreated() {
        let (paths, config, temp) = create_test_env(false);
        write(temp.path(), "config/prod.env", "PASSWORD=x");
        let id = backup(&paths, &config);

        fs::remove_dir_all(temp.path().join("config")).unwrap();
        let result = quiet(&paths, &config).restore(id.as_str()).unwrap();

        assert!(result
            .skipped_encrypted
            .contains(&PathBuf::from("config/prod.env.encrypted")));
        assert!(!temp.path().join("config").exists());
        assert!(temp.path().join("docs/guide.md").is_file());
    }

    #[test]
    fn test_tooling_dir_in_backup_skipped() {
        let (paths, config, temp) = create_test_env(false);
        let id = backup(&paths, &config);

        let backup_root = config.backup_dir(&paths).join(id.as_str());
        write(&backup_root, ".stash/config.json", "{\"bogus\": true}");

        quiet(&paths, &config).restore(id.as_str()).unwrap();
        assert!(!temp.path().join(".stash/config.json").exists());
    }

    #[test]
    fn test_hooks_run_when_triggers_present() {
        let (paths, mut config, temp) = create_test_env(true);
        write(temp.path(), "package.json", "{}");
        write(temp.path(), "prisma/schema.prisma", "model X {}");
        config.restore.install_command = vec!["npm".into(), "install".into()];
        let id = backup(&paths, &config);

        let runner = Rc::new(RecordingRunner::default());
        let result = RestoreManager::new(paths.clone(), config.clone())
            .with_runner(runner.clone())
            .restore(id.as_str())
            .unwrap();

        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], vec!["npm".to_string(), "install".to_string()]);
        assert_eq!(calls[1][0], "npx");
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_hook_failure_is_warning() {
        let (paths, config, temp) = create_test_env(true);
        write(temp.path(), "package.json", "{}");
        let id = backup(&paths, &config);

        let runner = Rc::new(RecordingRunner {
            fail: true,
            ..Default::default()
        });
        let result = RestoreManager::new(paths.clone(), config.clone())
            .with_runner(runner.clone())
            .restore(id.as_str())
            .unwrap();

        assert_eq!(runner.calls.borrow().len(), 1);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("manually"));
        assert!(!result.is_clean());
    }

    #[test]
    fn test_secret_merged_into_env_file() {
        let (paths, config, temp) = create_test_env(true);
        let id = backup(&paths, &config);
        write(temp.path(), ".env", "GITHUB_TOKEN=old\nPORT=1\n");

        let secrets = Rc::new(StaticSecretProvider(Some(SecureString::new("ghp_new"))));
        let result = quiet(&paths, &config)
            .with_secret_provider(secrets)
            .restore(id.as_str())
            .unwrap();

        assert!(result.secret_configured);
        assert_eq!(
            fs::read_to_string(temp.path().join(".env")).unwrap(),
            "GITHUB_TOKEN=ghp_new\nPORT=1\n"
        );
    }

    #[test]
    fn test_stage_order() {
        let (paths, config, _temp) = create_test_env(true);
        let id = backup(&paths, &config);

        let observer = Rc::new(RecordingObserver::default());
        quiet(&paths, &config)
            .with_observer(observer.clone())
            .restore(id.as_str())
            .unwrap();

        assert_eq!(
            *observer.restore.borrow(),
            vec![
                RestoreStage::Locating,
                RestoreStage::Extracting,
                RestoreStage::ReadingManifest,
                RestoreStage::Validating,
                RestoreStage::RestoringFiles,
                RestoreStage::Configuring,
                RestoreStage::Done,
            ]
        );
    }

    #[test]
    fn test_inspect() {
        let (paths, config, _temp) = create_test_env(true);
        let id = backup(&paths, &config);

        let manifest = quiet(&paths, &config).inspect(id.as_str()).unwrap();
        assert_eq!(manifest.id, id);
        assert_eq!(manifest.stats.regular, 2);
        assert_eq!(manifest.stats.encrypted, 1);
    }

    #[test]
    fn test_restore_result_summary() {
        let mut files = BatchReport::default();
        files.record(Path::new("a.txt"), Ok(()));
        let result = RestoreResult {
            backup_id: BackupId::from_name("demo-1"),
            manifest: BackupManifest::new(
                BackupId::from_name("demo-1"),
                &StashConfig::for_project("demo"),
                BackupStats::default(),
            ),
            files,
            skipped_encrypted: vec![PathBuf::from("secret.env.encrypted")],
            warnings: Vec::new(),
            secret_configured: false,
        };

        assert_eq!(
            result.summary(),
            "1 file(s) restored, 1 encrypted file(s) left encrypted"
        );
    }
}
