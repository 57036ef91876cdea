use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

/// Settings shared by every migration command.
///
/// Loaded from the `[migrate]` section of `tidemark.toml` (optional), then
/// overridden by `TIDEMARK__MIGRATE__*` environment variables.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MigrateConfig {
    /// Database client command line, e.g. `mysql --batch -u root app_dev`.
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default = "default_schema_dir")]
    pub schema_dir: PathBuf,
    #[serde(default = "default_table")]
    pub table: String,
}

pub const DEFAULT_CONFIG_FILE: &str = "tidemark.toml";

fn default_schema_dir() -> PathBuf {
    PathBuf::from("schema")
}

fn default_table() -> String {
    "_version_".to_string()
}

impl MigrateConfig {
    /// Load from the given file (optional), then environment variables.
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("migrate.schema_dir", "schema")?
            .set_default("migrate.table", default_table())?
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("TIDEMARK").separator("__"))
            .build()?;

        settings.get::<MigrateConfig>("migrate").map_err(|e| {
            ConfigError::Message(format!(
                "migration configuration could not be loaded from {path} or environment: {e}"
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use std::sync::Mutex;

    // Loading reads the process environment, which the override test mutates
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_defaults_without_file() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let cfg = MigrateConfig::load_from(missing.to_str().unwrap()).unwrap();

        assert_eq!(cfg.table, "_version_");
        assert_eq!(cfg.schema_dir, PathBuf::from("schema"));
    }

    #[test]
    fn test_reads_migrate_section() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tidemark.toml");
        fs::write(
            &path,
            "[migrate]\ncommand = \"mysql --batch app\"\nschema_dir = \"db/schema\"\ntable = \"schema_versions\"\n",
        )
        .unwrap();

        let cfg = MigrateConfig::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.command.as_deref(), Some("mysql --batch app"));
        assert_eq!(cfg.schema_dir, PathBuf::from("db/schema"));
        assert_eq!(cfg.table, "schema_versions");
    }

    #[test]
    fn test_environment_overrides_file() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tidemark.toml");
        fs::write(&path, "[migrate]\ntable = \"from_file\"\nschema_dir = \"db\"\n").unwrap();

        env::set_var("TIDEMARK__MIGRATE__TABLE", "from_env");
        let cfg = MigrateConfig::load_from(path.to_str().unwrap());
        env::remove_var("TIDEMARK__MIGRATE__TABLE");

        let cfg = cfg.unwrap();
        assert_eq!(cfg.table, "from_env");
        assert_eq!(cfg.schema_dir, PathBuf::from("db"));
    }
}
