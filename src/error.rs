//! Custom error types for stash
//!
//! Fatal errors abort a whole backup or restore run and carry the name of
//! the stage that failed. Per-file problems never become a `StashError`
//! that crosses a batch boundary; they are collected into a
//! [`BatchReport`](crate::backup::BatchReport) instead.

use thiserror::Error;

/// The main error type for stash operations
#[derive(Error, Debug)]
pub enum StashError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// A glob pattern failed to compile
    #[error("Invalid pattern: {0}")]
    Pattern(String),

    /// Encryption errors
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Envelope names an algorithm this build cannot decrypt
    #[error("Unsupported encryption algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Authentication tag did not verify
    #[error("Authentication failed: wrong key or tampered envelope")]
    Authentication,

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Backup is missing a readable manifest
    #[error("Invalid backup: {0}")]
    InvalidBackup(String),

    /// Backup belongs to a different project
    #[error("Project mismatch: backup belongs to '{found}', current project is '{expected}'")]
    ProjectMismatch { expected: String, found: String },

    /// Archive creation or extraction errors
    #[error("Archive error: {0}")]
    Archive(String),

    /// External collaborator (installer, schema setup) failed
    #[error("Command failed: {0}")]
    Hook(String),

    /// A fatal error annotated with the pipeline stage it happened in
    #[error("{stage} failed")]
    StageFailed {
        stage: &'static str,
        #[source]
        source: Box<StashError>,
    },
}

impl StashError {
    /// Create a "not found" error for backups
    pub fn backup_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Backup",
            identifier: identifier.into(),
        }
    }

    /// Wrap this error with the stage it occurred in
    pub fn at_stage(self, stage: &'static str) -> Self {
        match self {
            already @ Self::StageFailed { .. } => already,
            other => Self::StageFailed {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage this error was raised in, if known
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            Self::StageFailed { stage, .. } => Some(stage),
            _ => None,
        }
    }

    /// The underlying error with any stage annotation removed
    pub fn root(&self) -> &StashError {
        match self {
            Self::StageFailed { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::NotFound { .. })
    }

    /// Check if this is a project identity mismatch
    pub fn is_project_mismatch(&self) -> bool {
        matches!(self.root(), Self::ProjectMismatch { .. })
    }
}

impl From<std::io::Error> for StashError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StashError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for stash operations
pub type StashResult<T> = Result<T, StashError>;
