//! `VersionRecord` - Represents rows of the version table

use crate::migration::{MigrationError, MigrationFile, MigrationKind, Version};
use crate::row::Row;

/// A row of the version table
///
/// One row is written for every applied file and for every undo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    /// Identity assigned by the table; `None` until the row is inserted
    pub id: Option<i64>,

    pub version: Version,

    /// Description copied from the file name
    pub description: Option<String>,

    /// Free-text reference to the source revision the change came from
    pub commit: Option<String>,

    /// Set when the row records an undo
    pub revert: bool,
}

impl VersionRecord {
    /// Build the record for a file that was just submitted.
    ///
    /// The file name is parsed again rather than trusting the listing, so a
    /// file whose name does not follow the grammar is reported instead of
    /// being recorded under a guessed version. Undo files produce a
    /// `revert` row.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::SchemaFilename` if the name cannot be parsed.
    pub fn for_file(file: &MigrationFile, commit: Option<String>) -> Result<Self, MigrationError> {
        let parsed = MigrationFile::parse(file.path.clone(), file.kind)?;
        Ok(Self {
            id: None,
            version: parsed.version,
            description: Some(parsed.description).filter(|d| !d.is_empty()),
            commit,
            revert: parsed.kind == MigrationKind::Undo,
        })
    }

    /// Create a `VersionRecord` from a decoded result row
    ///
    /// Expected columns: `id`, `version`, `description`, `commit`, `revert`
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::NoValueFound` if `id` or `version` is missing
    /// or unreadable, and `MigrationError::InvalidVersion` if the stored
    /// version is not a timestamp.
    pub fn from_row(row: &Row) -> Result<Self, MigrationError> {
        let id = row
            .get("id")
            .and_then(|v| v.trim().parse::<i64>().ok())
            .ok_or_else(|| MigrationError::NoValueFound("id".to_string()))?;
        let version = row
            .get("version")
            .ok_or_else(|| MigrationError::NoValueFound("version".to_string()))?
            .parse()?;

        // BOOLEAN columns print as 0/1
        let revert = matches!(row.get("revert").map(str::trim), Some("1" | "true" | "TRUE"));

        Ok(Self {
            id: Some(id),
            version,
            description: row.get("description").map(str::to_string),
            commit: row.get("commit").map(|c| c.trim().to_string()),
            revert,
        })
    }
}
