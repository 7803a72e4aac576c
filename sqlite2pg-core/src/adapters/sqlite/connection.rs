//! SQLite connection handling.
//!
//! # Connection Modes
//! - File path: `/srv/backup/school.db`
//! - URL: `sqlite:///srv/backup/school.db` or `sqlite://./relative.db`
//! - In-memory: `sqlite::memory:` or `:memory:` (destination only; useful in tests)
//!
//! The source is always opened read-only and never created; a destination
//! file must also exist already, since the migrator does not create schemas.

use super::{SqliteDestination, SqliteSource};
use crate::adapters::ConnectionConfig;
use crate::{Result, error::MigrateError};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use url::Url;

impl SqliteSource {
    /// Opens a SQLite file read-only as the migration source.
    ///
    /// # Errors
    /// Returns error if the file does not exist or cannot be opened
    pub async fn open(path: &Path, config: ConnectionConfig) -> Result<Self> {
        config.validate()?;

        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .create_if_missing(false);

        let pool = create_sqlite_pool(options, &config, 1).await.map_err(|e| {
            MigrateError::Connection {
                context: format!("Failed to open SQLite source {}", path.display()),
                source: Box::new(e),
            }
        })?;

        tracing::debug!("Opened SQLite source {} read-only", path.display());

        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    /// Wraps an existing pool; used by tests that build fixtures in place.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            path: Default::default(),
        }
    }
}

impl SqliteDestination {
    /// Opens a SQLite destination from a URL or file path.
    ///
    /// # Errors
    /// Returns error if the connection string is invalid or the database
    /// cannot be opened
    pub async fn open(connection_string: &str, config: ConnectionConfig) -> Result<Self> {
        validate_sqlite_connection_string(connection_string)?;
        config.validate()?;

        let normalized = normalize_connection_string(connection_string);
        let options = SqliteConnectOptions::from_str(&normalized)
            .map_err(|e| {
                MigrateError::configuration(format!("Invalid SQLite connection string: {}", e))
            })?
            .create_if_missing(false)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        // In-memory databases live per connection; keep a single one.
        let max_connections = if is_in_memory(connection_string) {
            1
        } else {
            config.max_connections
        };

        let pool = create_sqlite_pool(options, &config, max_connections)
            .await
            .map_err(|e| MigrateError::connection_to(connection_string, e))?;

        Ok(Self { pool })
    }

    /// Wraps an existing pool; used by tests that build fixtures in place.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

async fn create_sqlite_pool(
    options: SqliteConnectOptions,
    config: &ConnectionConfig,
    max_connections: u32,
) -> std::result::Result<SqlitePool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(config.connect_timeout)
        .connect_with(options)
        .await
}

/// Validates SQLite connection string format.
///
/// # Errors
/// Returns error if connection string is invalid
pub fn validate_sqlite_connection_string(connection_string: &str) -> Result<()> {
    if connection_string == ":memory:" {
        return Ok(());
    }

    if connection_string.ends_with(".db")
        || connection_string.ends_with(".sqlite")
        || connection_string.ends_with(".sqlite3")
    {
        return Ok(());
    }

    if connection_string.starts_with("sqlite:") {
        if is_in_memory(connection_string) {
            return Ok(());
        }

        if let Ok(url) = Url::parse(connection_string) {
            if url.scheme() != "sqlite" {
                return Err(MigrateError::configuration(
                    "Connection string must use sqlite:// scheme",
                ));
            }
            return Ok(());
        }

        if connection_string.starts_with("sqlite://") {
            return Ok(());
        }
    }

    Err(MigrateError::configuration(
        "Invalid SQLite connection string format: expected sqlite:// URL, file path, or :memory:",
    ))
}

fn is_in_memory(connection_string: &str) -> bool {
    connection_string.contains(":memory:") || connection_string.contains("mode=memory")
}

/// Normalizes connection string to SQLite URL format.
fn normalize_connection_string(connection_string: &str) -> String {
    if connection_string == ":memory:" {
        return "sqlite::memory:".to_string();
    }

    if connection_string.starts_with("sqlite:") {
        return connection_string.to_string();
    }

    format!("sqlite://{}", connection_string)
}
