//! Storage helpers for stash
//!
//! Atomic JSON writes and the small set of tree copy/remove primitives the
//! backup and restore pipelines are built on.

pub mod file_io;

pub use file_io::{copy_dir_all, copy_file, read_json_required, remove_path, write_json_atomic};
