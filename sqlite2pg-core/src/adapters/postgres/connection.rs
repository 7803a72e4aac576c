//! PostgreSQL connection pool management and validation.
//!
//! # Security Features
//! - Validates connection string format before any network access
//! - Never logs or stores the password; errors carry a redacted URL
//! - Applies the `PGSSL` TLS policy on top of the URL's own `sslmode`

use super::PostgresDestination;
use crate::adapters::{ConnectionConfig, TlsMode, redact_database_url};
use crate::{Result, error::MigrateError};
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

impl PostgresDestination {
    /// Opens a pool to the destination and verifies it answers.
    ///
    /// # Arguments
    /// * `connection_string` - PostgreSQL connection URL (credentials sanitized in errors)
    /// * `config` - Pool limits, timeouts and TLS policy
    ///
    /// # Errors
    /// Returns error if:
    /// - Connection string format is invalid
    /// - The server cannot be reached within the acquire timeout
    pub async fn connect(connection_string: &str, config: ConnectionConfig) -> Result<Self> {
        let config = Self::parse_connection_config(connection_string, config)?;

        tracing::debug!("Connecting to PostgreSQL destination {}", config);

        let pool = Self::create_connection_pool(connection_string, &config)?;
        let destination = Self {
            pool,
            config,
            inserts: Mutex::new(HashMap::new()),
        };

        destination
            .test_connection()
            .await
            .map_err(|e| MigrateError::connection_to(connection_string, e))?;

        Ok(destination)
    }

    async fn test_connection(&self) -> std::result::Result<(), sqlx::Error> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| ())
    }

    /// Merges host, port, database and user from the URL into `base`.
    ///
    /// # Errors
    /// Returns error if the connection string is malformed
    pub fn parse_connection_config(
        connection_string: &str,
        base: ConnectionConfig,
    ) -> Result<ConnectionConfig> {
        Self::validate_connection_string(connection_string)?;

        let url = Url::parse(connection_string).map_err(|e| {
            MigrateError::configuration(format!(
                "Invalid PostgreSQL connection string format: {}",
                e
            ))
        })?;

        let mut config = ConnectionConfig {
            host: url.host_str().unwrap_or("localhost").to_string(),
            ..base
        };
        config = config.with_port(url.port().unwrap_or(5432));

        let database = url.path().trim_start_matches('/');
        if !database.is_empty() {
            config = config.with_database(database.to_string());
        }

        if !url.username().is_empty() {
            config = config.with_username(url.username().to_string());
        }

        for (key, value) in url.query_pairs() {
            if key == "connect_timeout"
                && let Ok(timeout_secs) = value.parse::<u64>()
                && timeout_secs > 0
                && timeout_secs <= 300
            {
                config.connect_timeout = Duration::from_secs(timeout_secs);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Builds connect options with the configured TLS policy applied.
    pub(crate) fn connect_options(
        connection_string: &str,
        config: &ConnectionConfig,
    ) -> Result<PgConnectOptions> {
        let options = PgConnectOptions::from_str(connection_string).map_err(|e| {
            MigrateError::configuration(format!(
                "Invalid PostgreSQL connection string {}: {}",
                redact_database_url(connection_string),
                e
            ))
        })?;

        let options = match config.tls {
            TlsMode::FromUrl => options,
            TlsMode::Require => options.ssl_mode(PgSslMode::Require),
            TlsMode::VerifyFull => options.ssl_mode(PgSslMode::VerifyFull),
        };

        Ok(options.application_name(&format!("sqlite2pg-{}", env!("CARGO_PKG_VERSION"))))
    }

    /// Creates a lazily connecting pool.
    ///
    /// # Connection Pool Configuration
    /// - Max connections: from config (default 2; inserts are sequential)
    /// - Acquire timeout: `connect_timeout`
    /// - No ping before acquire; [`Self::connect`] already probes the server
    ///   and every insert would otherwise pay an extra round trip
    pub(crate) fn create_connection_pool(
        connection_string: &str,
        config: &ConnectionConfig,
    ) -> Result<PgPool> {
        let options = Self::connect_options(connection_string, config)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections.min(100))
            .acquire_timeout(config.connect_timeout)
            .test_before_acquire(false)
            .connect_lazy_with(options);

        Ok(pool)
    }

    /// Validates connection string format.
    ///
    /// # Errors
    /// Returns error if the string is not a postgres:// or postgresql:// URL
    pub fn validate_connection_string(connection_string: &str) -> Result<()> {
        let url = Url::parse(connection_string).map_err(|e| {
            MigrateError::configuration(format!(
                "Invalid PostgreSQL connection string format: {}",
                e
            ))
        })?;

        if !matches!(url.scheme(), "postgres" | "postgresql") {
            return Err(MigrateError::configuration(
                "Connection string must use postgres:// or postgresql:// scheme",
            ));
        }

        Ok(())
    }
}
