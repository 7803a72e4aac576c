//! Run-level configuration for a migration.

use super::connection::TlsMode;
use crate::error::MigrateError;
use crate::order::default_table_order;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default location of the SQLite backup taken before the PostgreSQL switch.
pub const DEFAULT_SQLITE_PATH: &str = "sqlite_backup/school.db";

/// What to do when the destination cannot detect conflicting rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PreflightMode {
    /// Do not inspect the destination before copying.
    Skip,
    /// Fail on missing tables or columns; warn on missing conflict keys.
    #[default]
    Warn,
    /// Like `Warn`, but a missing conflict key is fatal too.
    Strict,
}

/// Everything a migration run needs, resolved from flags and environment.
///
/// # Example
/// ```rust
/// use sqlite2pg_core::adapters::MigrationConfig;
///
/// let config = MigrationConfig::new("school.db", "postgres://app@localhost/school")
///     .with_table_order(vec!["users".to_string(), "posts".to_string()]);
///
/// assert_eq!(config.table_order, vec!["users", "posts"]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// SQLite file to copy from
    pub sqlite_path: PathBuf,
    /// Destination connection URL (contains credentials; never log unredacted)
    pub database_url: String,
    /// Preferred parent-before-child table order
    pub table_order: Vec<String>,
    /// Pool acquire timeout for both stores
    pub connect_timeout: Duration,
    /// TLS policy for a PostgreSQL destination
    pub tls: TlsMode,
    /// Destination schema check before copying
    pub preflight: PreflightMode,
}

impl MigrationConfig {
    /// Creates a config with the default table order and preflight.
    pub fn new(sqlite_path: impl Into<PathBuf>, database_url: impl Into<String>) -> Self {
        Self {
            sqlite_path: sqlite_path.into(),
            database_url: database_url.into(),
            table_order: default_table_order(),
            connect_timeout: Duration::from_secs(30),
            tls: TlsMode::FromUrl,
            preflight: PreflightMode::Warn,
        }
    }

    /// Builder method to override the preferred table order.
    pub fn with_table_order(mut self, table_order: Vec<String>) -> Self {
        self.table_order = table_order;
        self
    }

    /// Builder method to set the TLS policy.
    pub fn with_tls(mut self, tls: TlsMode) -> Self {
        self.tls = tls;
        self
    }

    /// Builder method to set the preflight mode.
    pub fn with_preflight(mut self, preflight: PreflightMode) -> Self {
        self.preflight = preflight;
        self
    }

    /// Builder method to set the pool acquire timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Validates the configuration before any store is opened.
    ///
    /// # Errors
    /// Returns a configuration error if the destination URL is missing or
    /// the SQLite file does not exist.
    pub fn validate(&self) -> crate::Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(MigrateError::configuration(
                "DATABASE_URL is required (PostgreSQL connection string)",
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err(MigrateError::configuration(
                "connect_timeout must be greater than 0",
            ));
        }

        if !self.sqlite_path.is_file() {
            return Err(MigrateError::configuration(format!(
                "SQLite source not found: {}",
                self.sqlite_path.display()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MigrationConfig::new(DEFAULT_SQLITE_PATH, "postgres://localhost/school");
        assert_eq!(config.table_order.first().map(String::as_str), Some("users"));
        assert_eq!(config.table_order.len(), 13);
        assert_eq!(config.preflight, PreflightMode::Warn);
        assert_eq!(config.tls, TlsMode::FromUrl);
    }

    #[test]
    fn test_missing_database_url_is_configuration_error() {
        let config = MigrationConfig::new("school.db", "  ");
        let err = config.validate().unwrap_err();
        assert!(matches!(err, MigrateError::Configuration { .. }));
        assert!(err.to_string().contains("DATABASE_URL is required"));
    }

    #[test]
    fn test_missing_sqlite_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = MigrationConfig::new(
            dir.path().join("absent.db"),
            "postgres://localhost/school",
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("SQLite source not found"));
    }

    #[test]
    fn test_existing_sqlite_file_validates() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = MigrationConfig::new(file.path(), "postgres://localhost/school");
        assert!(config.validate().is_ok());
    }
}
