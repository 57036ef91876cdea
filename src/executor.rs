//! `SqlExecutor` - runs SQL text through the database's command-line client.
//!
//! There is no native driver. Each statement is written to a fresh temporary
//! file, the client command is spawned with that file as standard input, and
//! the captured output is returned. A non-zero exit status becomes
//! [`ExecutorError::Exit`] carrying the exit code and the combined output.

use crate::row::{parse_tsv, Row};
use log::debug;
use std::io::{self, Seek, SeekFrom, Write};
use std::process::{Command, Stdio};
use thiserror::Error;

/// Errors raised while running the database client.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The client ran and exited with a non-zero status.
    #[error("`{command}` exited with {}: {output}", exit_status(.code))]
    Exit {
        command: String,
        code: Option<i32>,
        /// Standard output followed by standard error.
        output: String,
    },
    /// The client could not be started.
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    /// The temporary input file could not be prepared.
    #[error("failed to prepare SQL input: {0}")]
    Io(#[from] io::Error),
    /// The client output could not be read as tab-separated records.
    #[error("failed to decode client output: {0}")]
    Decode(#[from] csv::Error),
    /// The configured command line is empty or not shell-parsable.
    #[error("invalid database command: {0:?}")]
    InvalidCommand(String),
}

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "a signal".to_string(),
    }
}

/// Trait for running SQL against the target database.
///
/// Implementations must be shareable across threads so that tasks built on
/// top of them can be fanned out with [`crate::Task::all`].
pub trait SqlExecutor: Send + Sync {
    /// Submit `sql` verbatim and return the client's standard output.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError` if the client cannot be started or exits with
    /// a non-zero status.
    fn execute(&self, sql: &str) -> Result<String, ExecutorError>;

    /// Submit a `SELECT`-shaped statement and decode its tab-separated output.
    ///
    /// # Errors
    ///
    /// Same as [`SqlExecutor::execute`], plus `ExecutorError::Decode` when
    /// the output is not tab-separated records.
    fn query_all(&self, sql: &str) -> Result<Vec<Row>, ExecutorError> {
        let output = self.execute(sql)?;
        Ok(parse_tsv(&output)?)
    }
}

/// Executor that spawns an external client process per statement.
///
/// # Examples
///
/// ```no_run
/// use tidemark::{CommandExecutor, SqlExecutor};
///
/// let executor = CommandExecutor::parse("mysql --batch -u root app_dev")?;
/// let rows = executor.query_all("SELECT version FROM _version_")?;
/// # Ok::<(), tidemark::ExecutorError>(())
/// ```
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    program: String,
    args: Vec<String>,
}

impl CommandExecutor {
    /// Build an executor from an argument vector. The first element is the program.
    pub fn new(argv: Vec<String>) -> Result<Self, ExecutorError> {
        let mut argv = argv.into_iter();
        let program = argv
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ExecutorError::InvalidCommand(String::new()))?;
        Ok(Self {
            program,
            args: argv.collect(),
        })
    }

    /// Tokenize a shell-style command line (quotes are honoured, nothing is expanded).
    pub fn parse(command: &str) -> Result<Self, ExecutorError> {
        let argv = shlex::split(command)
            .ok_or_else(|| ExecutorError::InvalidCommand(command.to_string()))?;
        Self::new(argv).map_err(|_| ExecutorError::InvalidCommand(command.to_string()))
    }

    /// The command line as it would be typed.
    pub fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl SqlExecutor for CommandExecutor {
    fn execute(&self, sql: &str) -> Result<String, ExecutorError> {
        let command = self.command_line();
        debug!("executing via `{command}`:\n{sql}");

        let mut input = tempfile::tempfile()?;
        input.write_all(sql.as_bytes())?;
        input.flush()?;
        input.seek(SeekFrom::Start(0))?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::from(input))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| ExecutorError::Spawn {
                command: command.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            debug!("`{command}` returned {} bytes", stdout.len());
            return Ok(stdout);
        }

        let mut combined = stdout;
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Err(ExecutorError::Exit {
            command,
            code: output.status.code(),
            output: combined.trim_end().to_string(),
        })
    }
}
