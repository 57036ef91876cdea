//! Migration system for Tidemark
//!
//! This module provides:
//! - Schema file discovery (`<version>-do-<description>.sql` / `<version>-undo[-<description>].sql`)
//! - Version table bookkeeping
//! - Current version lookup and applied/pending planning
//! - Forward (`do`) and undo execution
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tidemark::CommandExecutor;
//! use tidemark::migration::{Migrator, VersionTable};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = Arc::new(CommandExecutor::parse("mysql --batch -u deploy app")?);
//! let migrator = Migrator::new(executor, "./schema")
//!     .with_table(VersionTable::new("_version_")?);
//!
//! let status = migrator.check().run()?;
//! println!("{} pending", status.pending_count());
//!
//! migrator.apply().run()?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod file;
#[allow(clippy::module_inception)]
pub mod migration;
pub mod migrator;
pub mod planner;
pub mod record;
pub mod state_table;
pub mod status;
pub mod version;

pub use error::MigrationError;
pub use file::{
    list_apply_files, list_undo_files, parse_apply_filename, parse_undo_filename, MigrationFile,
};
pub use migration::{MigrationKind, Version};
pub use migrator::Migrator;
pub use planner::{select_undo_for_version, split};
pub use record::VersionRecord;
pub use state_table::{initialize_state_table, insert_version, VersionTable};
pub use status::MigrationStatus;
pub use version::current_version;
