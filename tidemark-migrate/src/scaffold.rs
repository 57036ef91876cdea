//! Generation of new schema file pairs

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tidemark::migration::file::{apply_filename, is_valid_description, undo_filename};
use tidemark::migration::Version;

/// Paths of a freshly generated apply/undo pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedPair {
    pub version: Version,
    pub apply: PathBuf,
    pub undo: PathBuf,
}

/// Create `<now>-do-<description>.sql` and `<now>-undo-<description>.sql` in `schema_dir`.
///
/// The directory is created if needed. Existing files are never overwritten,
/// and either both files are written or neither is.
pub fn create_migration_pair(
    schema_dir: &Path,
    description: &str,
    now: DateTime<Utc>,
) -> Result<GeneratedPair> {
    if description.is_empty() || !is_valid_description(description) {
        bail!(
            "invalid description '{description}': use letters, digits, '-' and '_' only"
        );
    }

    let version: Version = now.format("%Y%m%d%H%M%S").to_string().parse()?;

    fs::create_dir_all(schema_dir)
        .with_context(|| format!("failed to create schema directory {}", schema_dir.display()))?;

    let apply = schema_dir.join(apply_filename(&version, description));
    let undo = schema_dir.join(undo_filename(&version, description));
    for path in [&apply, &undo] {
        if path.exists() {
            bail!("{} already exists", path.display());
        }
    }
    let generated = now.format("%Y-%m-%d %H:%M:%S UTC");

    write_new(
        &apply,
        &format!("-- {description}\n-- Version: {version}\n-- Generated: {generated}\n\n"),
    )?;
    if let Err(e) = write_new(
        &undo,
        &format!("-- Revert {description}\n-- Version: {version}\n-- Generated: {generated}\n\n"),
    ) {
        // Never leave an apply file without its undo
        let _ = fs::remove_file(&apply);
        return Err(e);
    }

    Ok(GeneratedPair {
        version,
        apply,
        undo,
    })
}

fn write_new(path: &Path, contents: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    file.write_all(contents.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
