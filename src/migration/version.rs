//! Current version lookup

use crate::executor::SqlExecutor;
use crate::migration::{MigrationError, Version, VersionTable};
use crate::task::Task;
use log::info;
use std::sync::Arc;

/// The version of the most recent row with `revert = 0`.
///
/// Undo rows are ignored, so an undo leaves the current version where it
/// was until a newer apply row is written.
///
/// # Errors
///
/// - `MigrationError::NoData` if the table holds no applied rows
/// - `MigrationError::NoValueFound("version")` if the row lacks a `version` column
pub fn current_version(
    executor: Arc<dyn SqlExecutor>,
    table: VersionTable,
) -> Task<Version, MigrationError> {
    Task::new(move || {
        let sql = table.current_version_sql();
        let rows = executor.query_all(&sql)?;
        let row = rows.first().ok_or_else(|| MigrationError::NoData {
            query: sql.trim().to_string(),
        })?;
        let version: Version = row
            .get("version")
            .ok_or_else(|| MigrationError::NoValueFound("version".to_string()))?
            .parse()?;

        info!("current version: {version}");
        Ok(version)
    })
}

/// Like [`current_version`], but an empty table reads as `None`.
///
/// Used by the planner: a fresh database has nothing applied, so every
/// apply file is pending.
pub fn current_version_if_any(
    executor: Arc<dyn SqlExecutor>,
    table: VersionTable,
) -> Task<Option<Version>, MigrationError> {
    Task::new(move || match current_version(executor, table).run() {
        Ok(version) => Ok(Some(version)),
        Err(MigrationError::NoData { .. }) => {
            info!("current version: none applied");
            Ok(None)
        }
        Err(e) => Err(e),
    })
}
