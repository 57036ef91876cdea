//! Core value types shared by the catalog, planner and version table

use crate::migration::MigrationError;
use std::fmt;
use std::str::FromStr;

/// Migration version: a 14-digit `YYYYMMDDHHMMSS` timestamp.
///
/// Versions are fixed width, so ordering the digit strings orders the
/// timestamps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(String);

impl Version {
    pub const WIDTH: usize = 14;

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Version {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() == Self::WIDTH && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Version(s.to_string()))
        } else {
            Err(MigrationError::InvalidVersion(s.to_string()))
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a schema file moves the database forward or reverts a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MigrationKind {
    Apply,
    Undo,
}

impl fmt::Display for MigrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationKind::Apply => f.write_str("do"),
            MigrationKind::Undo => f.write_str("undo"),
        }
    }
}
