//! File I/O utilities with atomic writes
//!
//! Provides safe file operations that won't leave half-written manifests,
//! configs or archives behind on failure.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::StashError;

/// Read JSON from a file, returning an error if file doesn't exist
pub fn read_json_required<T, P>(path: P) -> Result<T, StashError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if !path.exists() {
        return Err(StashError::Io(format!("File not found: {}", path.display())));
    }

    let file = File::open(path)
        .map_err(|e| StashError::Io(format!("Failed to open {}: {}", path.display(), e)))?;

    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .map_err(|e| StashError::Json(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Write JSON to a file atomically (write to temp, then rename)
///
/// The file is either completely written or not modified at all.
pub fn write_json_atomic<T, P>(path: P, data: &T) -> Result<(), StashError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    ensure_parent(path)?;

    // Same directory as the target so the rename stays on one filesystem
    let temp_path = path.with_extension("json.tmp");

    let file = File::create(&temp_path)
        .map_err(|e| StashError::Io(format!("Failed to create temp file: {}", e)))?;

    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, data)
        .map_err(|e| StashError::Json(format!("Failed to serialize data: {}", e)))?;

    writer
        .flush()
        .map_err(|e| StashError::Io(format!("Failed to flush data: {}", e)))?;

    writer
        .get_ref()
        .sync_all()
        .map_err(|e| StashError::Io(format!("Failed to sync data: {}", e)))?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        StashError::Io(format!("Failed to rename temp file: {}", e))
    })?;

    Ok(())
}

/// Create the parent directory of `path` if it is missing
pub fn ensure_parent(path: &Path) -> Result<(), StashError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            StashError::Io(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }
    Ok(())
}

/// Copy one file byte-for-byte, creating parent directories as needed
pub fn copy_file(from: &Path, to: &Path) -> Result<u64, StashError> {
    ensure_parent(to)?;
    fs::copy(from, to).map_err(|e| {
        StashError::Io(format!(
            "Failed to copy {} to {}: {}",
            from.display(),
            to.display(),
            e
        ))
    })
}

/// Recursively copy a directory tree
pub fn copy_dir_all(from: &Path, to: &Path) -> Result<(), StashError> {
    fs::create_dir_all(to)
        .map_err(|e| StashError::Io(format!("Failed to create {}: {}", to.display(), e)))?;

    for entry in walkdir::WalkDir::new(from).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|e| StashError::Io(format!("Failed to walk tree: {}", e)))?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| StashError::Io(e.to_string()))?;
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| {
                StashError::Io(format!("Failed to create {}: {}", target.display(), e))
            })?;
        } else if entry.file_type().is_file() {
            copy_file(entry.path(), &target)?;
        }
    }

    Ok(())
}

/// Remove a file or directory tree, ignoring a missing target
pub fn remove_path(path: &Path) -> Result<(), StashError> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StashError::Io(format!(
            "Failed to remove {}: {}",
            path.display(),
            e
        ))),
    }
}

/// Total size of a file, or of every file under a directory
pub fn path_size(path: &Path) -> u64 {
    if path.is_file() {
        return fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    }

    walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}
