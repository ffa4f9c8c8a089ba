//! Gzipped tarball packing and unpacking of backup trees

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use tar::{Archive, Builder};
use walkdir::WalkDir;

use crate::error::{StashError, StashResult};
use crate::storage::file_io::remove_path;

/// Extension of archive-style backups
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// Version-control metadata never packed into an archive
const VCS_DIR: &str = ".git";

/// Pack the contents of `source` into a gzipped tarball at `dest`
///
/// Entries are stored relative to `source`. The archive is written to a
/// `.partial` sibling and renamed into place once complete. Returns the
/// archive size in bytes.
pub fn create_archive(source: &Path, dest: &Path) -> StashResult<u64> {
    let mut partial = dest.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    if let Err(e) = write_tarball(source, &partial) {
        let _ = remove_path(&partial);
        return Err(e);
    }

    fs::rename(&partial, dest).map_err(|e| {
        let _ = remove_path(&partial);
        StashError::Archive(format!("Failed to finalize {}: {}", dest.display(), e))
    })?;

    let size = fs::metadata(dest).map(|m| m.len()).unwrap_or(0);
    Ok(size)
}

fn write_tarball(source: &Path, output: &Path) -> StashResult<()> {
    let file = File::create(output)
        .map_err(|e| StashError::Archive(format!("Failed to create archive file: {}", e)))?;

    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = Builder::new(encoder);

    let walker = WalkDir::new(source)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && e.file_name() == VCS_DIR));

    for entry in walker {
        let entry = entry.map_err(|e| StashError::Archive(format!("Failed to walk staging: {}", e)))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| StashError::Archive(e.to_string()))?;

        if entry.file_type().is_dir() {
            builder.append_dir(relative, entry.path()).map_err(|e| {
                StashError::Archive(format!("Failed to add {}: {}", relative.display(), e))
            })?;
        } else if entry.file_type().is_file() {
            builder
                .append_path_with_name(entry.path(), relative)
                .map_err(|e| {
                    StashError::Archive(format!("Failed to add {}: {}", relative.display(), e))
                })?;
        }
    }

    builder
        .into_inner()
        .map_err(|e| StashError::Archive(format!("Failed to finish archive: {}", e)))?
        .finish()
        .map_err(|e| StashError::Archive(format!("Failed to finish compression: {}", e)))?;

    Ok(())
}

/// Unpack a gzipped tarball into `dest`
pub fn extract_archive(archive: &Path, dest: &Path) -> StashResult<()> {
    let file = File::open(archive)
        .map_err(|e| StashError::Archive(format!("Failed to open {}: {}", archive.display(), e)))?;

    fs::create_dir_all(dest)
        .map_err(|e| StashError::Archive(format!("Failed to create {}: {}", dest.display(), e)))?;

    Archive::new(GzDecoder::new(file))
        .unpack(dest)
        .map_err(|e| StashError::Archive(format!("Failed to extract {}: {}", archive.display(), e)))
}
