//! Tabular results decoded from the database client's standard output.
//!
//! `mysql --batch` (and MariaDB's client) print one header line followed by
//! one line per row, with cells separated by tabs. Tabs, newlines and
//! backslashes inside a value are escaped as `\t`, `\n` and `\\`, and SQL
//! `NULL` is printed as the bare word `NULL`.

use csv::{ReaderBuilder, StringRecord, Terminator};
use std::iter;
use std::sync::Arc;

/// One decoded result row.
///
/// Columns are looked up by name; a `NULL` cell reads as `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Option<String>>,
}

impl Row {
    fn new(columns: &Arc<[String]>, mut values: Vec<Option<String>>) -> Self {
        values.resize(columns.len(), None);
        Self {
            columns: Arc::clone(columns),
            values,
        }
    }

    /// Value of `column`, or `None` when the column is missing or `NULL`.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
            .and_then(|v| v.as_deref())
    }

    /// Whether the result set had a column with this name.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// Parse tab-separated client output into rows.
///
/// Empty output, or output holding only a header, yields no rows. Rows with
/// fewer cells than the header are padded with `NULL`. An empty line after
/// the header is a row whose first cell is the empty string.
///
/// # Errors
///
/// Returns `csv::Error` if the output cannot be read as records.
pub fn parse_tsv(output: &str) -> Result<Vec<Row>, csv::Error> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        .has_headers(false)
        .terminator(Terminator::Any(b'\n'))
        .from_reader(output.as_bytes());

    let mut record = StringRecord::new();
    if !reader.read_record(&mut record)? {
        return Ok(Vec::new());
    }
    let columns: Arc<[String]> = record.iter().map(|c| c.trim().to_string()).collect();

    // The reader skips empty lines; they are recovered from the line count.
    let mut rows = Vec::new();
    loop {
        let start = reader.position().line();
        if !reader.read_record(&mut record)? {
            rows.extend(blank_rows(&columns, reader.position().line().saturating_sub(start)));
            break;
        }
        let skipped = reader.position().line().saturating_sub(start + 1);
        rows.extend(blank_rows(&columns, skipped));
        rows.push(Row::new(&columns, record.iter().map(decode_cell).collect()));
    }
    Ok(rows)
}

fn blank_rows(columns: &Arc<[String]>, count: u64) -> impl Iterator<Item = Row> + '_ {
    iter::repeat_with(move || Row::new(columns, vec![Some(String::new())])).take(count as usize)
}

fn decode_cell(cell: &str) -> Option<String> {
    if cell == "NULL" {
        return None;
    }

    let mut out = String::with_capacity(cell.len());
    let mut chars = cell.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    Some(out)
}
