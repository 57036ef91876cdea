//! # Tidemark
//!
//! Schema migration runner for MySQL-dialect databases that are only
//! reachable through their command-line client (`mysql --batch`, `mariadb
//! --batch`).
//!
//! Every operation is expressed as a [`Task`]: a deferred, fallible step that
//! is composed with `map`/`bind`/`bimap` and only runs when forked. The
//! [`migration::Migrator`] builds the `init`, `check`, `do` and `undo` chains
//! out of those steps.

pub mod config;
pub mod executor;
pub mod migration;
pub mod row;
pub mod task;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use executor::{CommandExecutor, ExecutorError, SqlExecutor};
pub use row::Row;
pub use task::{Join, Task};
