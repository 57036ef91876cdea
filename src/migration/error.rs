//! Migration-specific error types

use crate::executor::ExecutorError;
use std::path::PathBuf;
use thiserror::Error;

/// Migration-specific errors
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The database client failed
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    /// A query expected to return at least one row returned none
    #[error("query returned no rows: {query}")]
    NoData { query: String },

    /// A row came back without the expected column
    #[error("no value found for column `{0}`")]
    NoValueFound(String),

    /// A file that had to be parsed does not follow the naming grammar
    #[error(
        "schema file name '{0}' does not match <YYYYMMDDHHMMSS>-do-<description>.sql \
         or <YYYYMMDDHHMMSS>-undo[-<description>].sql"
    )]
    SchemaFilename(String),

    /// Reading or listing the schema directory failed
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The version table name is not a plain identifier
    #[error("invalid version table name '{0}': use letters, digits and underscores only")]
    InvalidTableName(String),

    /// A version value is not a 14-digit timestamp
    #[error("invalid migration version '{0}': expected 14 digits (YYYYMMDDHHMMSS)")]
    InvalidVersion(String),
}

impl MigrationError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MigrationError::Io {
            path: path.into(),
            source,
        }
    }
}
