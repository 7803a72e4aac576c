//! Library module for sqlite2pg
//!
//! This module exposes the command-line surface for testing purposes.
//! The main binary functionality is in main.rs.

use clap::{Args, Parser, Subcommand};
use sqlite2pg_core::{
    MigrateError, MigrationConfig, PreflightMode, Result, TlsMode,
    adapters::config::DEFAULT_SQLITE_PATH,
    order::{default_table_order, parse_table_order},
    passwords::{BCRYPT_COST, DEFAULT_DB_PATH},
};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Loads `KEY=value` pairs from a `.env` file into the process environment,
/// so the `env` fallbacks below see them. Variables already set are kept.
///
/// With no path, `.env` is searched for from the working directory upwards.
/// Returns the file that was loaded, if any.
pub fn load_env_file(path: Option<&Path>) -> Option<PathBuf> {
    match path {
        Some(path) => dotenvy::from_path(path).ok().map(|()| path.to_path_buf()),
        None => dotenvy::dotenv().ok(),
    }
}

/// First line `migrate` prints, naming the source file.
pub fn source_line(path: &Path) -> String {
    format!("SQLite source: {}", path.display())
}

/// CLI argument structure
#[derive(Debug, Parser)]
#[command(name = "sqlite2pg")]
#[command(about = "Copy a SQLite database into PostgreSQL, idempotently")]
#[command(version)]
#[command(long_about = "
sqlite2pg - Idempotent SQLite to PostgreSQL data migration

Copies every table of a SQLite database into an existing PostgreSQL schema,
parents before children, one row at a time. Rows the destination already
has are skipped, so re-running never duplicates data.

SAFETY:
- The SQLite source is opened read-only
- Credentials in DATABASE_URL are redacted in all output

COMMANDS:
  migrate           Copy all tables (default when no command is given)
  check             Verify the destination schema without copying
  plan              Show the table order and column counts
  rehash-passwords  Replace plaintext users.password values with bcrypt hashes

Settings are read from flags, then the environment, then a .env file in
the working directory or one of its parents.

EXAMPLES:
  DATABASE_URL=postgres://app@localhost/school sqlite2pg
  sqlite2pg migrate --sqlite-path backup.db --report report.json
  TABLE_ORDER=users,posts sqlite2pg plan
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(flatten)]
    pub migration: MigrationArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Returns the selected command, defaulting to `migrate`.
    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Migrate(MigrateArgs::default()))
    }
}

/// Available CLI commands
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Copy every table into the destination
    Migrate(MigrateArgs),
    /// Check the destination schema without copying any row
    Check,
    /// Print the resolved table order
    Plan,
    /// Hash plaintext passwords in the users table
    RehashPasswords(RehashArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct MigrateArgs {
    /// Write the migration report as JSON
    #[arg(long, value_name = "FILE", help = "Write a JSON migration report")]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct RehashArgs {
    /// SQLite database holding the users table
    #[arg(
        long,
        env = "DB_PATH",
        default_value = DEFAULT_DB_PATH,
        help = "SQLite database to rewrite in place"
    )]
    pub db_path: PathBuf,

    /// bcrypt work factor
    #[arg(
        long,
        default_value_t = BCRYPT_COST,
        value_parser = clap::value_parser!(u32).range(4..=31),
        help = "bcrypt cost (4-31)"
    )]
    pub cost: u32,
}

#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all output except errors")]
    pub quiet: bool,
}

/// Source, destination and run settings shared by `migrate`, `check` and `plan`.
#[derive(Debug, Clone, Args)]
pub struct MigrationArgs {
    /// Destination connection URL
    #[arg(
        long,
        global = true,
        env = "DATABASE_URL",
        hide_env_values = true,
        help = "Destination connection string (credentials will be sanitized in logs)"
    )]
    pub database_url: Option<String>,

    /// SQLite file to copy from
    #[arg(
        long,
        global = true,
        env = "SQLITE_PATH",
        default_value = DEFAULT_SQLITE_PATH,
        help = "SQLite source database (opened read-only)"
    )]
    pub sqlite_path: PathBuf,

    #[arg(long, global = true, env = "PGSSL", help = "Set to 'true' to require TLS")]
    pub pgssl: Option<String>,

    #[arg(
        long,
        global = true,
        env = "PGSSL_REJECT_UNAUTHORIZED",
        help = "Set to 'false' to accept unverified server certificates"
    )]
    pub pgssl_reject_unauthorized: Option<String>,

    /// Preferred parent-before-child order
    #[arg(
        long,
        global = true,
        env = "TABLE_ORDER",
        help = "Comma-separated preferred table order (parents first)"
    )]
    pub table_order: Option<String>,

    #[arg(
        long,
        global = true,
        default_value_t = 30,
        help = "Connection timeout in seconds"
    )]
    pub connect_timeout: u64,

    #[arg(
        long,
        global = true,
        conflicts_with = "require_conflict_key",
        help = "Do not check the destination schema before copying"
    )]
    pub skip_preflight: bool,

    #[arg(
        long,
        global = true,
        help = "Fail when a destination table has no primary key or unique constraint"
    )]
    pub require_conflict_key: bool,
}

impl MigrationArgs {
    /// Preferred order from `--table-order` / `TABLE_ORDER`, or the built-in
    /// default when unset or blank.
    pub fn table_order(&self) -> Vec<String> {
        let parsed = self
            .table_order
            .as_deref()
            .map(parse_table_order)
            .unwrap_or_default();

        if parsed.is_empty() {
            default_table_order()
        } else {
            parsed
        }
    }

    pub fn preflight_mode(&self) -> PreflightMode {
        if self.skip_preflight {
            PreflightMode::Skip
        } else if self.require_conflict_key {
            PreflightMode::Strict
        } else {
            PreflightMode::Warn
        }
    }

    pub fn tls_mode(&self) -> TlsMode {
        TlsMode::from_flags(
            self.pgssl.as_deref(),
            self.pgssl_reject_unauthorized.as_deref(),
        )
    }

    /// Builds the run configuration.
    ///
    /// # Errors
    /// Returns a configuration error if no destination URL was given.
    pub fn to_config(&self) -> Result<MigrationConfig> {
        let database_url = self
            .database_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                MigrateError::configuration(
                    "DATABASE_URL is required (PostgreSQL connection string)",
                )
            })?;

        Ok(MigrationConfig::new(&self.sqlite_path, database_url)
            .with_table_order(self.table_order())
            .with_tls(self.tls_mode())
            .with_preflight(self.preflight_mode())
            .with_connect_timeout(Duration::from_secs(self.connect_timeout)))
    }
}
