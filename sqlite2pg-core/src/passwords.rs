//! One-off rehash of plaintext user passwords in a SQLite database.
//!
//! Older deployments stored `users.password` in clear text. Before the data
//! is copied to PostgreSQL, every value that is not already a bcrypt hash
//! (bcrypt hashes start with `$2`) is replaced by its bcrypt hash.
//!
//! bcrypt is CPU-bound, so each hash runs on the blocking thread pool.

use crate::adapters::sqlite::{rows::decode_value, writer::bind_value};
use crate::models::SqlValue;
use crate::{Result, error::MigrateError};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::path::Path;

/// Database file used when `DB_PATH` is not set.
pub const DEFAULT_DB_PATH: &str = "school.db";

/// bcrypt work factor for rehashed passwords.
pub const BCRYPT_COST: u32 = 12;

/// Returns true if `password` is already a bcrypt hash.
///
/// ```rust
/// use sqlite2pg_core::passwords::is_bcrypt_hash;
///
/// assert!(is_bcrypt_hash("$2b$12$abcdefghijklmnopqrstuv"));
/// assert!(!is_bcrypt_hash("hunter2"));
/// ```
pub fn is_bcrypt_hash(password: &str) -> bool {
    password.starts_with("$2")
}

/// Opens an existing SQLite file read-write in WAL journal mode.
///
/// # Errors
/// Returns a connection error if the file is missing or cannot be opened
pub async fn open_read_write(path: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(false)
        .journal_mode(SqliteJournalMode::Wal);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(|e| MigrateError::Connection {
            context: format!("Failed to open SQLite database {}", path.display()),
            source: Box::new(e),
        })
}

/// Hashes `password` with bcrypt on the blocking thread pool.
///
/// # Errors
/// Returns [`MigrateError::Password`] if hashing fails
pub async fn hash_password(password: &str, cost: u32) -> Result<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| MigrateError::Password {
            context: "hashing task failed".to_string(),
            source: Box::new(e),
        })?
        .map_err(|e| MigrateError::Password {
            context: format!("bcrypt hash with cost {} failed", cost),
            source: Box::new(e),
        })
}

/// Replaces every plaintext `users.password` with its bcrypt hash.
///
/// NULL passwords and existing bcrypt hashes are left alone. Returns the
/// number of rows updated.
///
/// # Errors
/// Returns error if the `users` table cannot be read, a hash fails, or an
/// update is rejected
pub async fn rehash_plaintext_passwords(pool: &SqlitePool, cost: u32) -> Result<u64> {
    let rows = sqlx::query("SELECT id, password FROM users")
        .fetch_all(pool)
        .await
        .map_err(|e| MigrateError::read_failed("users", e))?;

    let mut updated: u64 = 0;

    for row in &rows {
        let id = decode_value(row, 0).map_err(|e| MigrateError::read_failed("users", e))?;
        let stored = decode_value(row, 1).map_err(|e| MigrateError::read_failed("users", e))?;
        let password = match stored {
            SqlValue::Text(password) => password,
            SqlValue::Null => continue,
            other => {
                tracing::warn!(
                    "User {:?} has a non-text password ({}); skipped",
                    id,
                    other.kind()
                );
                continue;
            }
        };

        if is_bcrypt_hash(&password) {
            continue;
        }

        let hashed = hash_password(&password, cost).await?;

        bind_value(sqlx::query("UPDATE users SET password = ? WHERE id = ?").bind(hashed), &id)
            .execute(pool)
            .await
            .map_err(|e| MigrateError::write_failed("users", updated.saturating_add(1), e))?;

        updated = updated.saturating_add(1);
        tracing::debug!("Rehashed password for user {:?}", id);
    }

    tracing::info!("Rehashed {} of {} user passwords", updated, rows.len());
    Ok(updated)
}
