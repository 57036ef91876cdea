//! Partitioning of schema files against the current version

use crate::migration::{MigrationFile, Version};

/// Split version-sorted apply files into `(applied, pending)`.
///
/// A file is applied when its version is at or below `current`, pending
/// otherwise. With no current version every file is pending. Input order is
/// preserved within both halves.
pub fn split(
    current: Option<&Version>,
    files: Vec<MigrationFile>,
) -> (Vec<MigrationFile>, Vec<MigrationFile>) {
    files
        .into_iter()
        .partition(|file| current.is_some_and(|current| file.version <= *current))
}

/// Undo files whose version equals `current` exactly.
///
/// Several matches are all returned; the caller reports the ambiguity.
pub fn select_undo_for_version(current: &Version, undo_files: Vec<MigrationFile>) -> Vec<MigrationFile> {
    undo_files
        .into_iter()
        .filter(|file| file.version == *current)
        .collect()
}
