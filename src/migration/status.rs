//! Migration status tracking

use crate::migration::{MigrationFile, Version};

/// Result of `check`: where the database stands against the schema directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Current version; `None` when nothing has been applied
    pub current: Option<Version>,

    /// Apply files at or below the current version
    pub applied: Vec<MigrationFile>,

    /// Apply files above the current version, oldest first
    pub pending: Vec<MigrationFile>,

    /// All undo files in the schema directory
    pub undo: Vec<MigrationFile>,

    /// Versions claimed by more than one apply file
    pub duplicate_apply: Vec<Version>,

    /// Versions claimed by more than one undo file
    pub duplicate_undo: Vec<Version>,
}

impl MigrationStatus {
    #[must_use]
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Total number of apply files (applied + pending)
    #[must_use]
    pub fn total(&self) -> usize {
        self.applied.len() + self.pending.len()
    }

    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }

    #[must_use]
    pub fn next_pending_version(&self) -> Option<&Version> {
        self.pending.first().map(|m| &m.version)
    }

    /// Whether an undo file exists for `version`
    #[must_use]
    pub fn has_undo(&self, version: &Version) -> bool {
        self.undo.iter().any(|u| u.version == *version)
    }

    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        !self.duplicate_apply.is_empty() || !self.duplicate_undo.is_empty()
    }
}
