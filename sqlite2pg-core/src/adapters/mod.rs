//! Store traits and factory for the migration source and destination.
//!
//! The run controller only talks to [`SourceStore`] and [`DestinationStore`];
//! SQL dialect, placeholders and identifier quoting stay inside the adapters.
//!
//! # Module Structure
//! - `config`: Connection and run configuration
//! - `helpers`: Identifier quoting and statement builders
//! - `sqlite`: Read-only SQLite source and SQLite destination
//! - `postgres`: PostgreSQL destination (feature `postgresql`)

use crate::{
    Result,
    models::{ConflictKey, DatabaseType, Row, SqlValue},
};
use async_trait::async_trait;

pub mod config;
pub mod helpers;
pub mod sqlite;

#[cfg(feature = "postgresql")]
pub mod postgres;

pub use config::{
    ConnectionConfig, DEFAULT_SQLITE_PATH, MigrationConfig, PreflightMode, TlsMode,
};

/// Result of a single idempotent insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    /// `false` when a uniqueness conflict suppressed the insert
    pub inserted: bool,
}

impl InsertOutcome {
    pub const INSERTED: Self = Self { inserted: true };
    pub const SKIPPED: Self = Self { inserted: false };

    /// Interprets a rows-affected count from `INSERT ... ON CONFLICT DO NOTHING`.
    pub fn from_rows_affected(rows: u64) -> Self {
        Self {
            inserted: rows > 0,
        }
    }
}

/// Read-only access to the database being migrated from.
///
/// # Object Safety
/// This trait is object-safe, allowing dynamic dispatch through
/// `Box<dyn SourceStore>`.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Lists data tables in catalog order, excluding internal tables.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Returns column names in declaration order.
    ///
    /// # Errors
    /// Returns [`crate::error::MigrateError::TableNotFound`] if the table is
    /// not in the catalog. An existing table may still report zero columns.
    async fn columns_of(&self, table: &str) -> Result<Vec<String>>;

    /// Reads every row of `table`, each aligned to `columns`.
    async fn read_all(&self, table: &str, columns: &[String]) -> Result<Vec<Row>>;

    /// Releases the underlying connections.
    async fn close(&self);

    /// Returns the database type this store reads.
    fn database_type(&self) -> DatabaseType;
}

/// Write access to the database being migrated to.
///
/// The destination is owned by the caller; the run controller never closes it.
#[async_trait]
pub trait DestinationStore: Send + Sync {
    /// Inserts one row, skipping it silently on any uniqueness conflict.
    ///
    /// # Errors
    /// Any failure other than a conflict is returned as
    /// [`crate::error::MigrateError::Write`].
    async fn insert_row(
        &self,
        table: &str,
        columns: &[String],
        values: &[SqlValue],
    ) -> Result<InsertOutcome>;

    /// Returns the destination's columns for `table`, or `None` if the
    /// table does not exist.
    async fn columns_of(&self, table: &str) -> Result<Option<Vec<String>>>;

    /// Returns the primary key and unique constraints of `table`.
    async fn conflict_keys(&self, table: &str) -> Result<Vec<ConflictKey>>;

    /// Returns the database type this store writes.
    fn database_type(&self) -> DatabaseType;
}

/// Opens a destination store for `connection_string`.
///
/// # Errors
/// Returns error if the URL format is unrecognized, the matching adapter is
/// not compiled in, or the connection cannot be configured.
pub async fn create_destination(
    connection_string: &str,
    config: &ConnectionConfig,
) -> Result<Box<dyn DestinationStore>> {
    match detect_database_type(connection_string)? {
        #[cfg(feature = "postgresql")]
        DatabaseType::PostgreSQL => {
            let store =
                postgres::PostgresDestination::connect(connection_string, config.clone()).await?;
            Ok(Box::new(store))
        }
        #[cfg(not(feature = "postgresql"))]
        DatabaseType::PostgreSQL => Err(crate::error::MigrateError::configuration(
            "PostgreSQL support not compiled in. Use --features postgresql",
        )),
        DatabaseType::SQLite => {
            let store = sqlite::SqliteDestination::open(connection_string, config.clone()).await?;
            Ok(Box::new(store))
        }
    }
}

/// Safely redacts credentials from database connection URLs.
///
/// Delegates to [`crate::error::redact_database_url`].
#[inline]
pub fn redact_database_url(url: &str) -> String {
    crate::error::redact_database_url(url)
}

/// Detects database type from connection string.
///
/// # Errors
/// Returns error if connection string format is unrecognized
pub fn detect_database_type(connection_string: &str) -> Result<DatabaseType> {
    if connection_string.starts_with("postgres://")
        || connection_string.starts_with("postgresql://")
    {
        Ok(DatabaseType::PostgreSQL)
    } else if connection_string.starts_with("sqlite:")
        || connection_string == ":memory:"
        || connection_string.ends_with(".db")
        || connection_string.ends_with(".sqlite")
        || connection_string.ends_with(".sqlite3")
    {
        Ok(DatabaseType::SQLite)
    } else {
        Err(crate::error::MigrateError::configuration(
            "Unrecognized destination connection string format: expected postgres://, postgresql://, sqlite: or a .db file",
        ))
    }
}
