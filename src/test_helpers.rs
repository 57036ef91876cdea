//! Test doubles for [`SqlExecutor`].
//!
//! [`MockExecutor`] understands the handful of statements the migrator emits
//! against the version table and keeps that table in memory. Every other
//! statement is treated as a migration body: it is logged and succeeds,
//! unless it contains a fragment registered with [`MockExecutor::fail_on`].

use crate::executor::{ExecutorError, SqlExecutor};
use std::collections::VecDeque;
use std::sync::Mutex;

/// In-memory row of the mocked version table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockRow {
    pub id: i64,
    pub version: String,
    pub description: Option<String>,
    pub commit: Option<String>,
    pub revert: bool,
}

#[derive(Debug, Default)]
struct MockState {
    table_exists: bool,
    rows: Vec<MockRow>,
    /// Migration bodies, in submission order
    scripts: Vec<String>,
    fail_on: Vec<String>,
}

#[derive(Debug, Default)]
pub struct MockExecutor {
    state: Mutex<MockState>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row directly, creating the table if needed.
    pub fn seed(&self, version: &str, revert: bool) {
        let mut state = self.lock();
        state.table_exists = true;
        let id = state.rows.len() as i64 + 1;
        state.rows.push(MockRow {
            id,
            version: version.to_string(),
            description: None,
            commit: None,
            revert,
        });
    }

    /// Make any statement containing `fragment` fail with exit status 1.
    pub fn fail_on(&self, fragment: &str) {
        self.lock().fail_on.push(fragment.to_string());
    }

    pub fn clear_failures(&self) {
        self.lock().fail_on.clear();
    }

    pub fn rows(&self) -> Vec<MockRow> {
        self.lock().rows.clone()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.lock().scripts.clone()
    }

    pub fn table_exists(&self) -> bool {
        self.lock().table_exists
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn exit_error(output: impl Into<String>) -> ExecutorError {
    ExecutorError::Exit {
        command: "mock".to_string(),
        code: Some(1),
        output: output.into(),
    }
}

impl SqlExecutor for MockExecutor {
    fn execute(&self, sql: &str) -> Result<String, ExecutorError> {
        let mut state = self.lock();
        if let Some(fragment) = state.fail_on.iter().find(|f| sql.contains(f.as_str())) {
            return Err(exit_error(format!("ERROR: statement failed near '{fragment}'")));
        }

        let trimmed = sql.trim_start();
        if trimmed.starts_with("CREATE TABLE IF NOT EXISTS") {
            state.table_exists = true;
            return Ok(String::new());
        }

        let touches_table = trimmed.starts_with("INSERT INTO") || trimmed.starts_with("SELECT");
        if touches_table && !state.table_exists {
            return Err(exit_error("ERROR 1146 (42S02): Table doesn't exist"));
        }

        if trimmed.starts_with("INSERT INTO") {
            let values = parse_values(trimmed)
                .ok_or_else(|| exit_error(format!("ERROR: cannot parse insert: {trimmed}")))?;
            let [version, description, commit, revert] = <[Option<String>; 4]>::try_from(values)
                .map_err(|_| exit_error("ERROR: column count doesn't match value count"))?;
            let id = state.rows.len() as i64 + 1;
            state.rows.push(MockRow {
                id,
                version: version.unwrap_or_default(),
                description,
                commit,
                revert: revert.as_deref() == Some("1"),
            });
            return Ok(String::new());
        }

        if trimmed.starts_with("SELECT version FROM") {
            let current = state
                .rows
                .iter()
                .filter(|r| !r.revert)
                .max_by_key(|r| r.id)
                .map(|r| format!("{}\n", r.version))
                .unwrap_or_default();
            return Ok(format!("version\n{current}"));
        }

        if trimmed.starts_with("SELECT id, version") {
            let mut out = String::from("id\tversion\tdescription\tcommit\trevert\n");
            for r in &state.rows {
                out.push_str(&format!(
                    "{}\t{}\t{}\t{}\t{}\n",
                    r.id,
                    r.version,
                    r.description.as_deref().unwrap_or("NULL"),
                    r.commit.as_deref().unwrap_or("NULL"),
                    u8::from(r.revert)
                ));
            }
            return Ok(out);
        }

        state.scripts.push(sql.to_string());
        Ok(format!("applied {} bytes", sql.len()))
    }
}

/// Values of `INSERT ... VALUES (...)`: quoted strings, `NULL` or bare numbers.
fn parse_values(sql: &str) -> Option<Vec<Option<String>>> {
    let start = sql.find("VALUES (")? + "VALUES (".len();
    let mut chars = sql[start..].chars().peekable();
    let mut values = Vec::new();

    loop {
        while chars.peek() == Some(&' ') {
            chars.next();
        }
        match chars.peek()? {
            '\'' => {
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next()? {
                        '\'' if chars.peek() == Some(&'\'') => {
                            chars.next();
                            value.push('\'');
                        }
                        '\'' => break,
                        '\\' => value.push(chars.next()?),
                        c => value.push(c),
                    }
                }
                values.push(Some(value));
            }
            _ => {
                let mut token = String::new();
                while let Some(&c) = chars.peek() {
                    if c == ',' || c == ')' {
                        break;
                    }
                    token.push(c);
                    chars.next();
                }
                let token = token.trim();
                values.push((token != "NULL").then(|| token.to_string()));
            }
        }
        while chars.peek() == Some(&' ') {
            chars.next();
        }
        match chars.next()? {
            ',' => continue,
            ')' => return Some(values),
            _ => return None,
        }
    }
}

/// Executor that replays canned responses in order and records every statement.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    responses: Mutex<VecDeque<Result<String, ExecutorError>>>,
    seen: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new(responses: Vec<Result<String, ExecutorError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl SqlExecutor for ScriptedExecutor {
    fn execute(&self, sql: &str) -> Result<String, ExecutorError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(sql.to_string());
        }
        self.responses
            .lock()
            .ok()
            .and_then(|mut r| r.pop_front())
            .unwrap_or_else(|| Err(exit_error("ScriptedExecutor: no response left")))
    }
}
