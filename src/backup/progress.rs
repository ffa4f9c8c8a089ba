//! Pipeline stages and progress reporting
//!
//! Both orchestrators announce each stage to a [`ProgressObserver`] before
//! entering it. The order is fixed; `Failed` is implied by the error a run
//! returns, which names the stage it failed in.

use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};

/// Stages of a backup run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupStage {
    Initializing,
    Classifying,
    Redacting,
    Encrypting,
    Copying,
    ManifestWriting,
    Archiving,
    Moving,
    Done,
}

impl BackupStage {
    pub fn name(self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::Classifying => "Classifying",
            Self::Redacting => "Redacting",
            Self::Encrypting => "Encrypting",
            Self::Copying => "Copying",
            Self::ManifestWriting => "ManifestWriting",
            Self::Archiving => "Archiving",
            Self::Moving => "Moving",
            Self::Done => "Done",
        }
    }
}

impl fmt::Display for BackupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stages of a restore run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreStage {
    Locating,
    Extracting,
    ReadingManifest,
    Validating,
    RestoringFiles,
    InstallingDependencies,
    SettingUpSchema,
    Configuring,
    Done,
}

impl RestoreStage {
    pub fn name(self) -> &'static str {
        match self {
            Self::Locating => "Locating",
            Self::Extracting => "Extracting",
            Self::ReadingManifest => "ReadingManifest",
            Self::Validating => "Validating",
            Self::RestoringFiles => "RestoringFiles",
            Self::InstallingDependencies => "InstallingDependencies",
            Self::SettingUpSchema => "SettingUpSchema",
            Self::Configuring => "Configuring",
            Self::Done => "Done",
        }
    }

    /// Whether files in the working tree may already have been overwritten
    /// once this stage has been entered
    pub fn is_destructive(self) -> bool {
        !matches!(
            self,
            Self::Locating | Self::Extracting | Self::ReadingManifest | Self::Validating
        )
    }
}

impl fmt::Display for RestoreStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives stage transitions and per-file warnings
pub trait ProgressObserver {
    fn backup_stage(&self, _stage: BackupStage) {}

    fn restore_stage(&self, _stage: RestoreStage) {}

    fn file_warning(&self, path: &Path, reason: &str) {
        tracing::warn!(path = %path.display(), "{}", reason);
    }
}

/// Logs every transition through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl ProgressObserver for LogObserver {
    fn backup_stage(&self, stage: BackupStage) {
        tracing::info!(stage = stage.name(), "backup");
    }

    fn restore_stage(&self, stage: RestoreStage) {
        tracing::info!(stage = stage.name(), "restore");
    }
}

/// Keeps every transition in memory; handy for assertions
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub backup: RefCell<Vec<BackupStage>>,
    pub restore: RefCell<Vec<RestoreStage>>,
    pub warnings: RefCell<Vec<PathBuf>>,
}

impl ProgressObserver for RecordingObserver {
    fn backup_stage(&self, stage: BackupStage) {
        self.backup.borrow_mut().push(stage);
    }

    fn restore_stage(&self, stage: RestoreStage) {
        self.restore.borrow_mut().push(stage);
    }

    fn file_warning(&self, path: &Path, _reason: &str) {
        self.warnings.borrow_mut().push(path.to_path_buf());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destructive_stages() {
        assert!(!RestoreStage::Validating.is_destructive());
        assert!(RestoreStage::RestoringFiles.is_destructive());
        assert!(RestoreStage::Configuring.is_destructive());
    }

    #[test]
    fn test_recording_observer() {
        let observer = RecordingObserver::default();
        observer.backup_stage(BackupStage::Initializing);
        observer.restore_stage(RestoreStage::Locating);
        observer.file_warning(Path::new("a.txt"), "boom");

        assert_eq!(*observer.backup.borrow(), vec![BackupStage::Initializing]);
        assert_eq!(*observer.restore.borrow(), vec![RestoreStage::Locating]);
        assert_eq!(observer.warnings.borrow().len(), 1);
    }
}
