//! SQLite to PostgreSQL migration tool.
//!
//! This binary copies every table of a SQLite database into an existing
//! destination schema in parent-before-child order. Each row is inserted
//! with `ON CONFLICT DO NOTHING`, so an interrupted run is resumed by
//! running it again.
//!
//! # Security Guarantees
//! - The SQLite source is opened read-only
//! - Credentials are redacted in every log line and error message
//! - No credentials are written to the JSON report

use anyhow::Context;
use clap::Parser;
use sqlite2pg::{
    Cli, Command, MigrateArgs, MigrationArgs, RehashArgs, load_env_file, source_line,
};
use sqlite2pg_core::{
    ConnectionConfig, MigrateError, MigrationReport, PreflightMode, Result, SourceStore,
    adapters::{create_destination, redact_database_url, sqlite::SqliteSource},
    check_destination, init_logging, migrate_sqlite_to_url,
    passwords::{open_read_write, rehash_plaintext_passwords},
    resolve_order,
};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_file = load_env_file(None);
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.global.verbose, cli.global.quiet)?;
    if let Some(path) = env_file {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    match cli.command() {
        Command::Migrate(args) => migrate(&cli.migration, &args)
            .await
            .context("Migration failed"),
        Command::Check => check(&cli.migration)
            .await
            .context("Destination check failed"),
        Command::Plan => plan(&cli.migration).await.context("Planning failed"),
        Command::RehashPasswords(args) => rehash_passwords(&args)
            .await
            .context("Password rehash failed"),
    }
}

/// Runs the full migration and prints one progress line per table.
async fn migrate(args: &MigrationArgs, migrate_args: &MigrateArgs) -> Result<()> {
    let config = args.to_config()?;
    println!("{}", source_line(&config.sqlite_path));
    info!("Migrating into {}", redact_database_url(&config.database_url));

    let report = migrate_sqlite_to_url(&config, |table| println!("{}", table)).await?;
    println!("Migration complete.");

    if !report.empty_tables.is_empty() {
        warn!(
            "Skipped tables without columns: {}",
            report.empty_tables.join(", ")
        );
    }

    if let Some(path) = &migrate_args.report {
        save_report(&report, path).await?;
    }

    Ok(())
}

/// Checks the destination schema against the source without copying.
async fn check(args: &MigrationArgs) -> Result<()> {
    let mut config = args.to_config()?;
    if config.preflight == PreflightMode::Skip {
        config.preflight = PreflightMode::Warn;
    }
    config.validate()?;

    let source = open_source(&config.sqlite_path, config.connect_timeout).await?;
    let connection = ConnectionConfig::default()
        .with_connect_timeout(config.connect_timeout)
        .with_tls(config.tls);

    let outcome = async {
        let destination = create_destination(&config.database_url, &connection).await?;
        let order = resolve_order(&source.list_tables().await?, &config.table_order);
        let report =
            check_destination(&source, destination.as_ref(), &order, config.preflight).await?;
        Ok::<_, MigrateError>(report)
    }
    .await;
    source.close().await;
    let report = outcome?;

    for table in &report.empty_tables {
        println!("{}: no columns, skipped", table);
    }
    for table in &report.without_conflict_key {
        println!(
            "{}: no primary key or unique constraint, re-runs will duplicate rows",
            table
        );
    }
    if report.is_clean() {
        println!(
            "Destination schema ready for {} table(s).",
            report.checked.len()
        );
    } else {
        println!(
            "Destination schema ready for {} table(s), {} without a conflict key.",
            report.checked.len(),
            report.without_conflict_key.len()
        );
    }

    Ok(())
}

/// Prints the resolved copy order with each table's column count.
async fn plan(args: &MigrationArgs) -> Result<()> {
    let preferred = args.table_order();
    let source = open_source(&args.sqlite_path, Duration::from_secs(args.connect_timeout)).await?;

    let outcome = async {
        let order = resolve_order(&source.list_tables().await?, &preferred);
        let mut lines = Vec::with_capacity(order.len());
        for (index, table) in order.iter().enumerate() {
            let columns = source.columns_of(table).await?;
            let origin = if preferred.contains(table) {
                ""
            } else {
                " (not in table order)"
            };
            lines.push(format!(
                "{:>3}. {} ({} columns){}",
                index.saturating_add(1),
                table,
                columns.len(),
                origin
            ));
        }
        Ok::<_, MigrateError>(lines)
    }
    .await;
    source.close().await;

    for line in outcome? {
        println!("{}", line);
    }

    Ok(())
}

/// Replaces plaintext `users.password` values with bcrypt hashes in place.
async fn rehash_passwords(args: &RehashArgs) -> Result<()> {
    info!("Rehashing plaintext passwords in {}", args.db_path.display());

    let pool = open_read_write(&args.db_path).await?;
    let updated = rehash_plaintext_passwords(&pool, args.cost).await;
    pool.close().await;

    println!("Done. Updated {} user password(s).", updated?);
    Ok(())
}

async fn open_source(path: &Path, timeout: Duration) -> Result<SqliteSource> {
    if !path.is_file() {
        return Err(MigrateError::configuration(format!(
            "SQLite source not found: {}",
            path.display()
        )));
    }

    SqliteSource::open(
        path,
        ConnectionConfig::default().with_connect_timeout(timeout),
    )
    .await
}

/// Saves the migration report as pretty-printed JSON.
async fn save_report(report: &MigrationReport, output_path: &Path) -> Result<()> {
    let json_data = serde_json::to_string_pretty(report).map_err(|e| MigrateError::Serialization {
        context: "Failed to serialize migration report".to_string(),
        source: e,
    })?;

    tokio::fs::write(output_path, json_data)
        .await
        .map_err(|e| MigrateError::Io {
            context: format!("Failed to write report to {}", output_path.display()),
            source: e,
        })?;

    info!("Saved migration report to {}", output_path.display());
    Ok(())
}
