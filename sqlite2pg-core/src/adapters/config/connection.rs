//! Database connection configuration.
//!
//! This module provides the `ConnectionConfig` struct used to open the
//! source and destination stores.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// TLS policy for PostgreSQL destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TlsMode {
    /// Use whatever `sslmode` the connection URL specifies.
    #[default]
    FromUrl,
    /// Encrypt, but accept any server certificate.
    Require,
    /// Encrypt and verify the certificate chain and host name.
    VerifyFull,
}

impl TlsMode {
    /// Interprets the `PGSSL` / `PGSSL_REJECT_UNAUTHORIZED` pair.
    ///
    /// TLS is enabled only when `pgssl` is `true` (case-insensitive);
    /// certificate verification stays on unless `reject_unauthorized`
    /// is `false`.
    ///
    /// ```rust
    /// use sqlite2pg_core::adapters::TlsMode;
    ///
    /// assert_eq!(TlsMode::from_flags(None, None), TlsMode::FromUrl);
    /// assert_eq!(TlsMode::from_flags(Some("TRUE"), None), TlsMode::VerifyFull);
    /// assert_eq!(TlsMode::from_flags(Some("true"), Some("false")), TlsMode::Require);
    /// ```
    pub fn from_flags(pgssl: Option<&str>, reject_unauthorized: Option<&str>) -> Self {
        let enabled = pgssl.is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
        if !enabled {
            return Self::FromUrl;
        }

        let reject = !reject_unauthorized.is_some_and(|v| v.trim().eq_ignore_ascii_case("false"));
        if reject { Self::VerifyFull } else { Self::Require }
    }
}

/// Configuration for database connections.
///
/// # Security
/// This struct intentionally does NOT store passwords. The password stays in
/// the connection URL, which is only ever logged in redacted form.
///
/// # Example
/// ```rust
/// use sqlite2pg_core::adapters::ConnectionConfig;
///
/// let config = ConnectionConfig::new("localhost".to_string())
///     .with_port(5432)
///     .with_database("school".to_string())
///     .with_username("app".to_string());
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database host address
    pub host: String,
    /// Optional port number
    pub port: Option<u16>,
    /// Optional database name
    pub database: Option<String>,
    /// Optional username (password handled separately)
    pub username: Option<String>,
    /// Pool acquire timeout
    pub connect_timeout: Duration,
    /// Maximum number of connections in pool
    pub max_connections: u32,
    /// TLS policy (PostgreSQL only)
    pub tls: TlsMode,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: None,
            database: None,
            username: None,
            connect_timeout: Duration::from_secs(30),
            // Writes are issued one at a time; a second connection is
            // only used for catalog lookups.
            max_connections: 2,
            tls: TlsMode::FromUrl,
        }
    }
}

impl std::fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ConnectionConfig({}{}{})",
            self.host,
            self.port.map_or_else(String::new, |p| format!(":{}", p)),
            self.database
                .as_ref()
                .map_or_else(String::new, |db| format!("/{}", db))
        )
        // Intentionally omit username and never include credentials
    }
}

impl ConnectionConfig {
    /// Validates connection configuration parameters.
    ///
    /// # Errors
    /// Returns a configuration error if any value is out of range
    pub fn validate(&self) -> crate::Result<()> {
        if self.host.is_empty() {
            return Err(crate::error::MigrateError::configuration(
                "host cannot be empty",
            ));
        }

        if self.port == Some(0) {
            return Err(crate::error::MigrateError::configuration(
                "port must be greater than 0",
            ));
        }

        if self.max_connections == 0 {
            return Err(crate::error::MigrateError::configuration(
                "max_connections must be greater than 0",
            ));
        }

        if self.max_connections > 100 {
            return Err(crate::error::MigrateError::configuration(
                "max_connections should not exceed 100",
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err(crate::error::MigrateError::configuration(
                "connect_timeout must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Creates a new connection config with defaults.
    pub fn new(host: String) -> Self {
        Self {
            host,
            ..Default::default()
        }
    }

    /// Builder method to set port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Builder method to set database.
    pub fn with_database(mut self, database: String) -> Self {
        self.database = Some(database);
        self
    }

    /// Builder method to set username.
    pub fn with_username(mut self, username: String) -> Self {
        self.username = Some(username);
        self
    }

    /// Builder method to set the pool acquire timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Builder method to set the TLS policy.
    pub fn with_tls(mut self, tls: TlsMode) -> Self {
        self.tls = tls;
        self
    }
}
