//! Migrator - Core migration execution engine

use crate::executor::SqlExecutor;
use crate::migration::file::{duplicate_versions, list_apply_files, list_undo_files};
use crate::migration::planner::{select_undo_for_version, split};
use crate::migration::state_table::{initialize_state_table, insert_version, query_history};
use crate::migration::version::{current_version, current_version_if_any};
use crate::migration::{
    MigrationError, MigrationFile, MigrationStatus, Version, VersionRecord, VersionTable,
};
use crate::task::Task;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Core migration execution engine
///
/// Every operation returns a [`Task`]; nothing touches the database or the
/// schema directory until the task is run. All durable state lives in the
/// version table and the schema directory, so a `Migrator` can be rebuilt
/// freely between invocations.
///
/// ```no_run
/// use std::sync::Arc;
/// use tidemark::CommandExecutor;
/// use tidemark::migration::Migrator;
///
/// let executor = Arc::new(CommandExecutor::parse("mysql --batch app_dev")?);
/// let migrator = Migrator::new(executor, "schema");
/// let outputs = migrator.apply().run()?;
/// println!("applied {} file(s)", outputs.len());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone)]
pub struct Migrator {
    executor: Arc<dyn SqlExecutor>,
    schema_dir: PathBuf,
    table: VersionTable,
    commit: Option<String>,
}

impl Migrator {
    /// Create a Migrator over `schema_dir` using the default `_version_` table
    pub fn new(executor: Arc<dyn SqlExecutor>, schema_dir: impl AsRef<Path>) -> Self {
        Self {
            executor,
            schema_dir: schema_dir.as_ref().to_path_buf(),
            table: VersionTable::default(),
            commit: None,
        }
    }

    #[must_use]
    pub fn with_table(mut self, table: VersionTable) -> Self {
        self.table = table;
        self
    }

    /// Source revision stored in the `commit` column of every row written
    #[must_use]
    pub fn with_commit(mut self, commit: Option<String>) -> Self {
        self.commit = commit;
        self
    }

    pub fn schema_dir(&self) -> &Path {
        &self.schema_dir
    }

    pub fn table(&self) -> &VersionTable {
        &self.table
    }

    /// Create the version table if it does not exist
    pub fn init(&self) -> Task<String, MigrationError> {
        initialize_state_table(Arc::clone(&self.executor), self.table.clone())
            .logged(format!("init {}", self.table))
    }

    /// Current version of the database
    pub fn current_version(&self) -> Task<Version, MigrationError> {
        current_version(Arc::clone(&self.executor), self.table.clone())
    }

    /// Compare the schema directory with the version table
    ///
    /// Reads the current version, then lists apply and undo files
    /// concurrently. Nothing is modified.
    pub fn check(&self) -> Task<MigrationStatus, MigrationError> {
        let catalog = Task::all(vec![
            list_apply_files(&self.schema_dir),
            list_undo_files(&self.schema_dir),
        ]);

        current_version_if_any(Arc::clone(&self.executor), self.table.clone())
            .bind(move |current| {
                catalog.map(move |mut lists| {
                    let undo = lists.pop().unwrap_or_default();
                    let apply = lists.pop().unwrap_or_default();
                    build_status(current, apply, undo)
                })
            })
            .inspect(|status| {
                info!(
                    "{} applied, {} pending",
                    status.applied_count(),
                    status.pending_count()
                );
                for file in &status.pending {
                    info!("pending: {}", file.file_name());
                }
            })
            .logged("check")
    }

    /// Apply every pending file in version order
    ///
    /// Ensures the version table exists, recomputes the plan, then for each
    /// pending file submits its SQL and records a version row. The first
    /// failure stops the run; files applied before it stay applied, and the
    /// next run picks up from there.
    ///
    /// Resolves with the client output of each applied file.
    pub fn apply(&self) -> Task<Vec<String>, MigrationError> {
        let check = self.check();
        let executor = Arc::clone(&self.executor);
        let table = self.table.clone();
        let commit = self.commit.clone();

        self.init()
            .bind(move |_| check)
            .bind(move |status| {
                if status.pending.is_empty() {
                    info!("no pending migrations");
                }
                let steps = status
                    .pending
                    .into_iter()
                    .map(|file| run_file(Arc::clone(&executor), table.clone(), file, commit.clone()))
                    .collect();
                Task::sequence(steps)
            })
            .logged("do")
    }

    /// Undo files matching the current version exactly
    pub fn plan_undo(&self) -> Task<Vec<MigrationFile>, MigrationError> {
        let listing = list_undo_files(&self.schema_dir);

        self.current_version().bind(move |current| {
            listing.map(move |undo_files| {
                let selected = select_undo_for_version(&current, undo_files);
                match selected.len() {
                    0 => info!("no undo migrations found for version {current}"),
                    1 => {}
                    n => warn!("{n} undo files match version {current}; all of them will run"),
                }
                selected
            })
        })
    }

    /// Revert the current version
    ///
    /// Runs the undo file(s) for the current version and records each with
    /// `revert = 1`. Having no undo file for the current version is not an
    /// error: the task resolves with an empty list.
    pub fn undo(&self) -> Task<Vec<String>, MigrationError> {
        let executor = Arc::clone(&self.executor);
        let table = self.table.clone();
        let commit = self.commit.clone();

        self.plan_undo()
            .bind(move |files| {
                let steps = files
                    .into_iter()
                    .map(|file| run_file(Arc::clone(&executor), table.clone(), file, commit.clone()))
                    .collect();
                Task::sequence(steps)
            })
            .logged("undo")
    }

    /// Every version table row, oldest first
    pub fn history(&self) -> Task<Vec<VersionRecord>, MigrationError> {
        query_history(Arc::clone(&self.executor), self.table.clone()).logged("history")
    }
}

fn build_status(
    current: Option<Version>,
    apply: Vec<MigrationFile>,
    undo: Vec<MigrationFile>,
) -> MigrationStatus {
    let duplicate_apply = duplicate_versions(&apply);
    let duplicate_undo = duplicate_versions(&undo);
    for version in &duplicate_apply {
        warn!("several apply files share version {version}; they run in file name order");
    }
    for version in &duplicate_undo {
        warn!("several undo files share version {version}");
    }

    let (applied, pending) = split(current.as_ref(), apply);
    MigrationStatus {
        current,
        applied,
        pending,
        undo,
        duplicate_apply,
        duplicate_undo,
    }
}

/// Submit SQL text, turning client failures into migration errors
fn submit(executor: Arc<dyn SqlExecutor>, sql: String) -> Task<String, MigrationError> {
    Task::new(move || executor.execute(&sql)).bimap(
        MigrationError::from,
        |output| {
            debug!("client output: {}", output.trim_end());
            output
        },
    )
}

/// Read one schema file, submit it, then record it in the version table
fn run_file(
    executor: Arc<dyn SqlExecutor>,
    table: VersionTable,
    file: MigrationFile,
    commit: Option<String>,
) -> Task<String, MigrationError> {
    let step = format!("{} {}", file.kind, file.file_name());
    Task::new(move || {
        let sql = file.read_sql()?;
        let output = submit(Arc::clone(&executor), sql).run()?;
        let record = VersionRecord::for_file(&file, commit)?;
        insert_version(executor, table, record).run()?;
        Ok(output)
    })
    .logged(step)
}
