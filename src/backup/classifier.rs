//! Pattern classification of a working tree
//!
//! Splits every file under a root into the include/exclude/encrypt buckets.
//! Patterns are matched against the path relative to the root, with `/` as
//! separator, so `**/*.env` and `*.env` both match files at any depth.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::config::paths::TOOLING_DIR;
use crate::config::settings::PatternConfig;
use crate::error::{StashError, StashResult};

/// A compiled list of glob patterns
#[derive(Debug, Clone)]
pub struct PatternSet {
    set: GlobSet,
    len: usize,
}

impl PatternSet {
    /// Compile a list of patterns, failing on the first invalid one
    pub fn new(patterns: &[String]) -> StashResult<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern)
                .map_err(|e| StashError::Pattern(format!("'{}': {}", pattern, e)))?;
            builder.add(glob);
        }

        let set = builder
            .build()
            .map_err(|e| StashError::Pattern(e.to_string()))?;

        Ok(Self {
            set,
            len: patterns.len(),
        })
    }

    /// Check a root-relative path against the set
    pub fn is_match(&self, relative: &Path) -> bool {
        self.len > 0 && self.set.is_match(normalize(relative))
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Render a relative path with `/` separators regardless of platform
fn normalize(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Result of classifying a tree
#[derive(Debug, Clone, Default)]
pub struct FileBuckets {
    root: PathBuf,
    /// Files matching at least one include pattern
    pub included: BTreeSet<PathBuf>,
    /// Files matching at least one exclude pattern
    pub excluded: BTreeSet<PathBuf>,
    /// Files matching at least one encrypt pattern
    pub encrypt_marked: BTreeSet<PathBuf>,
}

impl FileBuckets {
    /// Root the buckets were computed against
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `included ∩ encrypt_marked \ excluded`
    pub fn encrypted(&self) -> BTreeSet<PathBuf> {
        self.included
            .iter()
            .filter(|p| self.encrypt_marked.contains(*p) && !self.excluded.contains(*p))
            .cloned()
            .collect()
    }

    /// `included \ encrypt_marked \ excluded`
    pub fn regular(&self) -> BTreeSet<PathBuf> {
        self.included
            .iter()
            .filter(|p| !self.encrypt_marked.contains(*p) && !self.excluded.contains(*p))
            .cloned()
            .collect()
    }

    /// Path of `path` relative to the classified root
    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }
}

/// Matches a working tree against the configured pattern sets
#[derive(Debug, Clone)]
pub struct Classifier {
    include: PatternSet,
    exclude: PatternSet,
    encrypt: PatternSet,
}

impl Classifier {
    /// Compile all three pattern lists up front
    ///
    /// Any invalid pattern fails here, before a single file is visited.
    pub fn new(patterns: &PatternConfig) -> StashResult<Self> {
        Ok(Self {
            include: PatternSet::new(&patterns.include)?,
            exclude: PatternSet::new(&patterns.exclude)?,
            encrypt: PatternSet::new(&patterns.encrypt)?,
        })
    }

    /// Walk `root` and sort every file into buckets
    ///
    /// The tooling directory and any directory in `skip` are never entered.
    /// Unreadable entries are logged and skipped.
    pub fn classify(&self, root: &Path, skip: &[PathBuf]) -> StashResult<FileBuckets> {
        let mut buckets = FileBuckets {
            root: root.to_path_buf(),
            ..Default::default()
        };

        let tooling = root.join(TOOLING_DIR);
        let walker = WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                let path = entry.path();
                path != tooling && !skip.iter().any(|s| s == path)
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);

            if self.include.is_match(relative) {
                buckets.included.insert(path.to_path_buf());
            }
            if self.exclude.is_match(relative) {
                buckets.excluded.insert(path.to_path_buf());
            }
            if self.encrypt.is_match(relative) {
                buckets.encrypt_marked.insert(path.to_path_buf());
            }
        }

        tracing::debug!(
            included = buckets.included.len(),
            excluded = buckets.excluded.len(),
            encrypt_marked = buckets.encrypt_marked.len(),
            "classified working tree"
        );

        Ok(buckets)
    }
}
