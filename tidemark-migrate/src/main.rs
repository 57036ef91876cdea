//! Tidemark Migration CLI Tool
//!
//! Applies and reverts SQL schema files through a database command-line
//! client. Every command exits non-zero on failure.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use log::debug;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tidemark::config::{MigrateConfig, DEFAULT_CONFIG_FILE};
use tidemark::migration::{MigrationStatus, Migrator, VersionTable};
use tidemark::CommandExecutor;
use tidemark_migrate::scaffold::create_migration_pair;

#[derive(Parser)]
#[command(name = "tidemark-migrate")]
#[command(about = "Schema migration tool driving a database command-line client")]
#[command(version)]
struct Cli {
    /// Database client command, e.g. "mysql --batch -u root app_dev"
    #[arg(long, env = "TIDEMARK_DB_COMMAND")]
    command: Option<String>,

    /// Schema files directory
    #[arg(long)]
    schema_dir: Option<PathBuf>,

    /// Version table name (default: _version_)
    #[arg(long)]
    table: Option<String>,

    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: String,

    /// Source revision recorded with every version row
    #[arg(long)]
    commit: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Create the version table if it does not exist
    Init,

    /// Show applied and pending schema files
    Check,

    /// Apply pending schema files
    Do {
        /// Show what would be applied without running anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Revert the current version
    Undo {
        /// Show what would be reverted without running anything
        #[arg(long)]
        dry_run: bool,
    },

    /// List every row of the version table
    History,

    /// Generate a new apply/undo file pair
    New {
        /// Description, e.g. "create_users"
        description: String,
    },
}

fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    match run(cli) {
        Ok(()) => process::exit(0),
        Err(e) => {
            eprintln!("{} {e:#}", "❌ Error:".red().bold());
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = MigrateConfig::load_from(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config))?;
    let schema_dir = cli.schema_dir.clone().unwrap_or(config.schema_dir.clone());

    if let Action::New { description } = &cli.action {
        return handle_new(&schema_dir, description);
    }

    let command = cli
        .command
        .clone()
        .or(config.command.clone())
        .ok_or_else(|| {
            anyhow!("database command not provided: use --command, TIDEMARK_DB_COMMAND or `command` in {}", cli.config)
        })?;
    let table = VersionTable::new(cli.table.clone().unwrap_or(config.table.clone()))?;
    let executor = CommandExecutor::parse(&command)?;
    debug!(
        "client `{}`, schema dir {}, table {table}",
        executor.command_line(),
        schema_dir.display()
    );

    let migrator = Migrator::new(Arc::new(executor), &schema_dir)
        .with_table(table)
        .with_commit(cli.commit.clone());

    match cli.action {
        Action::Init => handle_init(&migrator),
        Action::Check => handle_check(&migrator),
        Action::Do { dry_run } => handle_do(&migrator, dry_run),
        Action::Undo { dry_run } => handle_undo(&migrator, dry_run),
        Action::History => handle_history(&migrator),
        Action::New { .. } => Ok(()),
    }
}

fn handle_init(migrator: &Migrator) -> Result<()> {
    migrator.init().run()?;
    println!("{} version table `{}` is ready", "✅".green(), migrator.table());
    Ok(())
}

fn handle_check(migrator: &Migrator) -> Result<()> {
    let status = migrator.check().run()?;
    print_status(&status);
    Ok(())
}

fn print_status(status: &MigrationStatus) {
    println!("\n📊 Migration Status\n");
    match &status.current {
        Some(version) => println!("Current version: {}", version.to_string().bold()),
        None => println!("Current version: {}", "none".dimmed()),
    }
    println!();

    if status.applied.is_empty() {
        println!("✅ Applied: None");
    } else {
        println!("✅ Applied ({}):", status.applied_count());
        for file in &status.applied {
            println!("  ✓ {}", file.file_name());
        }
    }
    println!();

    if status.pending.is_empty() {
        println!("⏳ Pending: None");
    } else {
        println!("⏳ Pending ({}):", status.pending_count());
        for file in &status.pending {
            let undo = if status.has_undo(&file.version) {
                "undo available".dimmed()
            } else {
                "no undo file".yellow()
            };
            println!("  ⏳ {} ({undo})", file.file_name());
        }
    }

    if status.has_duplicates() {
        println!();
        for version in &status.duplicate_apply {
            println!("{} several apply files share version {version}", "⚠".yellow());
        }
        for version in &status.duplicate_undo {
            println!("{} several undo files share version {version}", "⚠".yellow());
        }
    }

    println!(
        "\n📈 Summary: {} applied, {} pending, {} total",
        status.applied_count(),
        status.pending_count(),
        status.total()
    );
    if status.is_up_to_date() {
        println!("{} Database is up to date", "✅".green());
    } else if let Some(version) = status.next_pending_version() {
        println!("Next version to apply: {}", version.to_string().bold());
    }
}

fn handle_do(migrator: &Migrator, dry_run: bool) -> Result<()> {
    if dry_run {
        let status = migrator.check().run()?;
        if status.pending.is_empty() {
            println!("No pending migrations to apply");
            return Ok(());
        }
        println!("Would apply {} migration(s):", status.pending_count());
        for (i, file) in status.pending.iter().enumerate() {
            println!("  {}. {}", i + 1, file.file_name());
        }
        return Ok(());
    }

    println!("Applying migrations...");
    let applied = migrator.apply().run()?;
    if applied.is_empty() {
        println!("{} No migrations to apply", "✅".green());
    } else {
        println!("{} Successfully applied {} migration(s)", "✅".green(), applied.len());
    }
    Ok(())
}

fn handle_undo(migrator: &Migrator, dry_run: bool) -> Result<()> {
    if dry_run {
        let files = migrator.plan_undo().run()?;
        if files.is_empty() {
            println!("No undo migrations found for the current version");
            return Ok(());
        }
        println!("Would run {} undo migration(s):", files.len());
        for (i, file) in files.iter().enumerate() {
            println!("  {}. {}", i + 1, file.file_name());
        }
        return Ok(());
    }

    println!("Reverting current version...");
    let reverted = migrator.undo().run()?;
    if reverted.is_empty() {
        println!("{} No undo migrations found for the current version", "✅".green());
    } else {
        println!("{} Successfully ran {} undo migration(s)", "✅".green(), reverted.len());
    }
    Ok(())
}

fn handle_history(migrator: &Migrator) -> Result<()> {
    let records = migrator.history().run()?;
    if records.is_empty() {
        println!("Version table `{}` is empty", migrator.table());
        return Ok(());
    }

    println!("\n📋 Version History\n");
    for record in &records {
        let id = record.id.map(|id| id.to_string()).unwrap_or_default();
        let marker = if record.revert { "undo".red() } else { "do".green() };
        println!(
            "  {id:>5}  {}  {marker}  {}{}",
            record.version,
            record.description.as_deref().unwrap_or("-"),
            record
                .commit
                .as_deref()
                .map(|c| format!("  ({c})"))
                .unwrap_or_default()
        );
    }
    Ok(())
}

fn handle_new(schema_dir: &std::path::Path, description: &str) -> Result<()> {
    let pair = create_migration_pair(schema_dir, description, chrono::Utc::now())?;
    println!("{} Generated version {}", "✅".green(), pair.version);
    println!("   {}", pair.apply.display());
    println!("   {}", pair.undo.display());
    Ok(())
}
