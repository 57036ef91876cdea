//! Migration file discovery and parsing
//!
//! Schema files live flat in one directory and follow two naming patterns:
//!
//! - `<YYYYMMDDHHMMSS>-do-<description>.sql` moves the database forward
//! - `<YYYYMMDDHHMMSS>-undo[-<description>].sql` reverts that version
//!
//! `description` is limited to ASCII letters, digits, `-` and `_`. Entries
//! that match neither pattern are ignored by the listings.

use crate::migration::{MigrationError, MigrationKind, Version};
use crate::task::Task;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

static APPLY_FILENAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{14})-do-([A-Za-z0-9_-]*)\.sql$").expect("apply filename pattern is valid")
});

static UNDO_FILENAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{14})-undo(?:-([A-Za-z0-9_-]*))?\.sql$")
        .expect("undo filename pattern is valid")
});

/// A schema file found in the schema directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// Path as listed (schema directory joined with the file name)
    pub path: PathBuf,

    pub version: Version,

    /// Description token from the file name; empty for a bare undo file
    pub description: String,

    pub kind: MigrationKind,
}

impl MigrationFile {
    /// Parse `path` as a schema file of the given kind.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::SchemaFilename` when the file name does not
    /// follow the pattern for `kind`.
    pub fn parse(path: impl Into<PathBuf>, kind: MigrationKind) -> Result<Self, MigrationError> {
        let path = path.into();
        let name = path.to_string_lossy();
        let parsed = match kind {
            MigrationKind::Apply => parse_apply_filename(&name),
            MigrationKind::Undo => parse_undo_filename(&name),
        };
        match parsed {
            Some((version, description)) => Ok(Self {
                path,
                version,
                description,
                kind,
            }),
            None => Err(MigrationError::SchemaFilename(name.into_owned())),
        }
    }

    /// The file name without its directory.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Read the SQL text of this file.
    pub fn read_sql(&self) -> Result<String, MigrationError> {
        fs::read_to_string(&self.path).map_err(|e| MigrationError::io(&self.path, e))
    }
}

/// Build the file name for an apply file.
pub fn apply_filename(version: &Version, description: &str) -> String {
    format!("{version}-do-{description}.sql")
}

/// Build the file name for an undo file; an empty description gives `<version>-undo.sql`.
pub fn undo_filename(version: &Version, description: &str) -> String {
    if description.is_empty() {
        format!("{version}-undo.sql")
    } else {
        format!("{version}-undo-{description}.sql")
    }
}

/// Whether `description` can be used in a schema file name.
pub fn is_valid_description(description: &str) -> bool {
    description
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Parse an apply file name into `(version, description)`.
///
/// Directory prefixes are ignored. Returns `None` for anything outside the
/// grammar.
///
/// # Example
/// - `schema/20240120120000-do-create_users.sql` → (`20240120120000`, `create_users`)
pub fn parse_apply_filename(name: &str) -> Option<(Version, String)> {
    parse_with(&APPLY_FILENAME, name)
}

/// Parse an undo file name into `(version, description)`.
///
/// The description is optional and comes back empty when absent.
pub fn parse_undo_filename(name: &str) -> Option<(Version, String)> {
    parse_with(&UNDO_FILENAME, name)
}

fn parse_with(pattern: &Regex, name: &str) -> Option<(Version, String)> {
    let caps = pattern.captures(basename(name))?;
    let version = caps.get(1)?.as_str().parse().ok()?;
    let description = caps.get(2).map_or("", |m| m.as_str()).to_string();
    Some((version, description))
}

fn basename(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// List apply files in `dir`, sorted by version (oldest first).
pub fn list_apply_files(dir: impl AsRef<Path>) -> Task<Vec<MigrationFile>, MigrationError> {
    list_files(dir.as_ref().to_path_buf(), MigrationKind::Apply)
}

/// List undo files in `dir`, sorted by version (oldest first).
pub fn list_undo_files(dir: impl AsRef<Path>) -> Task<Vec<MigrationFile>, MigrationError> {
    list_files(dir.as_ref().to_path_buf(), MigrationKind::Undo)
}

fn list_files(dir: PathBuf, kind: MigrationKind) -> Task<Vec<MigrationFile>, MigrationError> {
    Task::new(move || {
        let mut files: Vec<MigrationFile> = list_dir(&dir)?
            .into_iter()
            .filter_map(|path| MigrationFile::parse(path, kind).ok())
            .collect();

        files.sort_by(|a, b| a.version.cmp(&b.version).then_with(|| a.path.cmp(&b.path)));
        Ok(files)
    })
}

/// Regular files in `dir`, joined with the directory path.
fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, MigrationError> {
    let entries = fs::read_dir(dir).map_err(|e| MigrationError::io(dir, e))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| MigrationError::io(dir, e))?;
        let is_file = entry
            .file_type()
            .map_err(|e| MigrationError::io(entry.path(), e))?
            .is_file();
        if is_file {
            paths.push(entry.path());
        }
    }
    Ok(paths)
}

/// Versions that more than one file in `files` claims, in ascending order.
pub fn duplicate_versions(files: &[MigrationFile]) -> Vec<Version> {
    let mut versions: Vec<&Version> = files.iter().map(|f| &f.version).collect();
    versions.sort();

    let mut duplicates: Vec<Version> = versions
        .windows(2)
        .filter(|pair| pair[0] == pair[1])
        .map(|pair| pair[0].clone())
        .collect();
    duplicates.dedup();
    duplicates
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_apply_filename() {
        assert_eq!(
            parse_apply_filename("20240120120000-do-create_users.sql"),
            Some((v("20240120120000"), "create_users".to_string()))
        );
        assert_eq!(
            parse_apply_filename("schema/nested/20240120120000-do-add-col.sql"),
            Some((v("20240120120000"), "add-col".to_string()))
        );
    }

    #[test]
    fn test_parse_apply_rejects_outside_grammar() {
        for name in [
            "20240120120000-undo-create_users.sql",
            "2024012012000-do-short.sql",
            "20240120120000-do-create users.sql",
            "20240120120000-do-x.sql.bak",
            "20240120120000_do_x.sql",
            "README.md",
            "",
        ] {
            assert_eq!(parse_apply_filename(name), None, "{name:?}");
        }
    }

    #[test]
    fn test_parse_undo_filename_optional_description() {
        assert_eq!(
            parse_undo_filename("20230102000000-undo.sql"),
            Some((v("20230102000000"), String::new()))
        );
        assert_eq!(
            parse_undo_filename("/tmp/schema/20230102000000-undo-addcol.sql"),
            Some((v("20230102000000"), "addcol".to_string()))
        );
        assert_eq!(parse_undo_filename("20230102000000-do-addcol.sql"), None);
    }

    #[test]
    fn test_filename_round_trip() {
        let version = v("20230101000000");
        for description in ["init", "add_users-table", "X9"] {
            let name = apply_filename(&version, description);
            assert_eq!(
                parse_apply_filename(&name),
                Some((version.clone(), description.to_string()))
            );

            let name = undo_filename(&version, description);
            assert_eq!(
                parse_undo_filename(&name),
                Some((version.clone(), description.to_string()))
            );
        }
    }

    #[test]
    fn test_parse_strict_reports_schema_filename_error() {
        let err = MigrationFile::parse("schema/notes.txt", MigrationKind::Apply).unwrap_err();
        assert!(matches!(err, MigrationError::SchemaFilename(name) if name == "schema/notes.txt"));
    }

    #[test]
    fn test_listing_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "20230102000000-do-addcol.sql",
            "20230101000000-do-init.sql",
            "20230102000000-undo.sql",
            "notes.md",
        ] {
            fs::write(dir.path().join(name), "SELECT 1;").unwrap();
        }
        fs::create_dir(dir.path().join("20230103000000-do-dir.sql")).unwrap();

        let apply = list_apply_files(dir.path()).run().unwrap();
        let names: Vec<String> = apply.iter().map(MigrationFile::file_name).collect();
        assert_eq!(names, vec!["20230101000000-do-init.sql", "20230102000000-do-addcol.sql"]);
        assert!(apply.iter().all(|f| f.path.starts_with(dir.path())));

        let undo = list_undo_files(dir.path()).run().unwrap();
        assert_eq!(undo.len(), 1);
        assert_eq!(undo[0].version, v("20230102000000"));
        assert_eq!(undo[0].kind, MigrationKind::Undo);
    }

    #[test]
    fn test_listing_missing_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            list_apply_files(&missing).run(),
            Err(MigrationError::Io { .. })
        ));
    }

    #[test]
    fn test_duplicate_versions() {
        let files: Vec<MigrationFile> = [
            "20230101000000-do-a.sql",
            "20230101000000-do-b.sql",
            "20230101000000-do-c.sql",
            "20230102000000-do-d.sql",
        ]
        .iter()
        .map(|n| MigrationFile::parse(*n, MigrationKind::Apply).unwrap())
        .collect();

        assert_eq!(duplicate_versions(&files), vec![v("20230101000000")]);
        assert!(duplicate_versions(&files[3..]).is_empty());
    }

    proptest! {
        #[test]
        fn prop_filename_round_trip(
            version in "[0-9]{14}",
            description in "[A-Za-z0-9_-]{0,24}",
        ) {
            let version = v(&version);

            let apply = apply_filename(&version, &description);
            prop_assert_eq!(
                parse_apply_filename(&apply),
                Some((version.clone(), description.clone()))
            );

            let undo = undo_filename(&version, &description);
            prop_assert_eq!(parse_undo_filename(&undo), Some((version, description)));
        }

        #[test]
        fn prop_parsing_arbitrary_names_never_panics(name in any::<String>()) {
            for parsed in [parse_apply_filename(&name), parse_undo_filename(&name)] {
                if let Some((version, description)) = parsed {
                    prop_assert_eq!(version.as_str().len(), Version::WIDTH);
                    prop_assert!(is_valid_description(&description));
                }
            }
        }
    }
}
