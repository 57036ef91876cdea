//! Version table management
//!
//! The version table stores one row per applied file and one per undo:
//! - `id` - identity, assigned by the database
//! - `version` - 14-character timestamp of the schema file
//! - `description` - description token from the file name
//! - `commit` - optional source revision reference
//! - `revert` - set on rows written by an undo

use crate::executor::SqlExecutor;
use crate::migration::{MigrationError, VersionRecord};
use crate::task::Task;
use log::debug;
use std::fmt;
use std::sync::Arc;

/// Validated name of the version table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTable(String);

impl VersionTable {
    /// Validate `name` as a plain SQL identifier.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::InvalidTableName` unless the name is made of
    /// ASCII letters, digits and underscores only.
    pub fn new(name: impl Into<String>) -> Result<Self, MigrationError> {
        let name = name.into();
        let valid = !name.is_empty()
            && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_');
        if valid {
            Ok(Self(name))
        } else {
            Err(MigrationError::InvalidTableName(name))
        }
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this table
    pub fn create_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS `{}` (\n  \
               id INT AUTO_INCREMENT PRIMARY KEY,\n  \
               version CHAR(14) NOT NULL,\n  \
               description TEXT NULL,\n  \
               `commit` CHAR(40) NULL,\n  \
               revert BOOLEAN NOT NULL DEFAULT FALSE\n\
             );\n",
            self.0
        )
    }

    /// `INSERT` statement recording `record`
    pub fn insert_sql(&self, record: &VersionRecord) -> String {
        format!(
            "INSERT INTO `{}` (version, description, `commit`, revert) VALUES ({}, {}, {}, {});\n",
            self.0,
            quote(Some(record.version.as_str())),
            quote(record.description.as_deref()),
            quote(record.commit.as_deref()),
            u8::from(record.revert),
        )
    }

    /// Query selecting the latest non-reverted version
    pub fn current_version_sql(&self) -> String {
        format!(
            "SELECT version FROM `{table}` WHERE id = (SELECT MAX(id) FROM `{table}` WHERE revert = 0);\n",
            table = self.0
        )
    }

    /// Query listing every row, oldest first
    pub fn history_sql(&self) -> String {
        format!(
            "SELECT id, version, description, `commit`, revert FROM `{}` ORDER BY id;\n",
            self.0
        )
    }
}

impl Default for VersionTable {
    fn default() -> Self {
        Self("_version_".to_string())
    }
}

impl fmt::Display for VersionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// SQL string literal, or `NULL`
fn quote(value: Option<&str>) -> String {
    match value {
        None => "NULL".to_string(),
        Some(v) => format!("'{}'", v.replace('\\', "\\\\").replace('\'', "''")),
    }
}

/// Create the version table if it does not exist yet.
pub fn initialize_state_table(
    executor: Arc<dyn SqlExecutor>,
    table: VersionTable,
) -> Task<String, MigrationError> {
    Task::new(move || Ok(executor.execute(&table.create_sql())?))
}

/// Insert `record` into the version table.
pub fn insert_version(
    executor: Arc<dyn SqlExecutor>,
    table: VersionTable,
    record: VersionRecord,
) -> Task<String, MigrationError> {
    Task::new(move || {
        debug!(
            "recording version {} (revert={}) in {table}",
            record.version, record.revert
        );
        Ok(executor.execute(&table.insert_sql(&record))?)
    })
}

/// Every row of the version table, oldest first.
pub fn query_history(
    executor: Arc<dyn SqlExecutor>,
    table: VersionTable,
) -> Task<Vec<VersionRecord>, MigrationError> {
    Task::new(move || {
        executor
            .query_all(&table.history_sql())?
            .iter()
            .map(VersionRecord::from_row)
            .collect()
    })
}
