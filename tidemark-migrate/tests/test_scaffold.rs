//! Tests for scaffold module

use chrono::{TimeZone, Utc};
use std::fs;
use tempfile::TempDir;
use tidemark::migration::{parse_apply_filename, parse_undo_filename};
use tidemark_migrate::scaffold::create_migration_pair;

#[test]
fn test_create_pair_uses_timestamp_version() {
    let temp_dir = TempDir::new().unwrap();
    let schema_dir = temp_dir.path().join("schema");
    let now = Utc.with_ymd_and_hms(2024, 1, 20, 12, 0, 0).unwrap();

    let pair = create_migration_pair(&schema_dir, "create_users", now).unwrap();

    assert_eq!(pair.version.as_str(), "20240120120000");
    assert_eq!(
        pair.apply.file_name().unwrap().to_str().unwrap(),
        "20240120120000-do-create_users.sql"
    );
    assert_eq!(
        pair.undo.file_name().unwrap().to_str().unwrap(),
        "20240120120000-undo-create_users.sql"
    );

    let (version, description) = parse_apply_filename(pair.apply.to_str().unwrap()).unwrap();
    assert_eq!(version, pair.version);
    assert_eq!(description, "create_users");
    assert!(parse_undo_filename(pair.undo.to_str().unwrap()).is_some());

    let contents = fs::read_to_string(&pair.apply).unwrap();
    assert!(contents.contains("Version: 20240120120000"));
}

#[test]
fn test_create_pair_refuses_to_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    let now = Utc.with_ymd_and_hms(2024, 1, 20, 12, 0, 0).unwrap();

    create_migration_pair(temp_dir.path(), "init", now).unwrap();
    assert!(create_migration_pair(temp_dir.path(), "init", now).is_err());
}

#[test]
fn test_create_pair_leaves_no_lone_apply_file() {
    let temp_dir = TempDir::new().unwrap();
    let now = Utc.with_ymd_and_hms(2024, 1, 20, 12, 0, 0).unwrap();
    let existing = temp_dir.path().join("20240120120000-undo-init.sql");
    fs::write(&existing, "DROP TABLE users;").unwrap();

    assert!(create_migration_pair(temp_dir.path(), "init", now).is_err());

    let names: Vec<String> = fs::read_dir(temp_dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["20240120120000-undo-init.sql"]);
    assert_eq!(fs::read_to_string(&existing).unwrap(), "DROP TABLE users;");
}

#[test]
fn test_create_pair_rejects_bad_description() {
    let temp_dir = TempDir::new().unwrap();
    let now = Utc.with_ymd_and_hms(2024, 1, 20, 12, 0, 0).unwrap();

    for bad in ["", "add users", "drop;table", "ünïcode"] {
        assert!(create_migration_pair(temp_dir.path(), bad, now).is_err(), "{bad:?}");
    }
    assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}
