//! Per-file outcome collection
//!
//! Bulk phases never stop on a single bad file. Each file operation yields a
//! `StashResult<()>` that is folded into a [`BatchReport`].

use std::path::{Path, PathBuf};

use crate::error::StashResult;

/// A file that could not be processed, and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Successes and failures of one batch
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<FileFailure>,
}

impl BatchReport {
    /// Fold one file's result into the report
    pub fn record(&mut self, path: &Path, result: StashResult<()>) {
        match result {
            Ok(()) => self.succeeded.push(path.to_path_buf()),
            Err(e) => self.fail(path, e.to_string()),
        }
    }

    /// Record a failure directly
    pub fn fail(&mut self, path: &Path, reason: impl Into<String>) {
        self.failed.push(FileFailure {
            path: path.to_path_buf(),
            reason: reason.into(),
        });
    }

    /// Absorb another report
    pub fn merge(&mut self, other: BatchReport) {
        self.succeeded.extend(other.succeeded);
        self.failed.extend(other.failed);
    }

    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}
