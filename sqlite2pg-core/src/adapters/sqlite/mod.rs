//! SQLite source and destination adapters.
//!
//! # Module Structure
//! - `connection`: Opening read-only sources and writable destinations
//! - `catalog`: Table, column and conflict-key lookup via `sqlite_master` and PRAGMA
//! - `rows`: Full-table reads decoded by storage class
//! - `writer`: Idempotent single-row inserts
//!
//! # SQLite-Specific Behavior
//! - Values are decoded by their runtime storage class, not the declared
//!   column type, so loosely typed columns survive unchanged.
//! - `INTEGER PRIMARY KEY` columns are rowid aliases and never show up in
//!   `PRAGMA index_list`; conflict keys take the primary key from
//!   `PRAGMA table_info` instead.

pub mod catalog;
pub mod connection;
pub mod rows;
pub mod writer;


use super::{DestinationStore, InsertOutcome, SourceStore};
use crate::Result;
use crate::models::{ConflictKey, DatabaseType, Row, SqlValue};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::path::PathBuf;

pub use connection::validate_sqlite_connection_string;

/// Read-only SQLite store the migration copies from.
pub struct SqliteSource {
    pub(crate) pool: SqlitePool,
    pub(crate) path: PathBuf,
}

impl std::fmt::Debug for SqliteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSource")
            .field("path", &self.path)
            .field("closed", &self.pool.is_closed())
            .finish()
    }
}

impl SqliteSource {
    /// Returns true once [`SourceStore::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

#[async_trait]
impl SourceStore for SqliteSource {
    async fn list_tables(&self) -> Result<Vec<String>> {
        catalog::list_tables(&self.pool).await
    }

    async fn columns_of(&self, table: &str) -> Result<Vec<String>> {
        if !catalog::table_exists(&self.pool, table).await? {
            return Err(crate::error::MigrateError::table_not_found(
                table,
                DatabaseType::SQLite.to_string(),
            ));
        }
        catalog::table_columns(&self.pool, table).await
    }

    async fn read_all(&self, table: &str, columns: &[String]) -> Result<Vec<Row>> {
        rows::read_all(&self.pool, table, columns).await
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::debug!("Closed SQLite source {}", self.path.display());
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::SQLite
    }
}

/// SQLite store used as a migration destination.
///
/// Mostly exercised by tests and dry runs against a scratch copy of the
/// target schema; production runs write to PostgreSQL.
pub struct SqliteDestination {
    pub(crate) pool: SqlitePool,
}

impl std::fmt::Debug for SqliteDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDestination")
            .field("closed", &self.pool.is_closed())
            .finish_non_exhaustive()
    }
}

impl SqliteDestination {
    /// Underlying pool, for callers that own the destination's lifecycle.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DestinationStore for SqliteDestination {
    async fn insert_row(
        &self,
        table: &str,
        columns: &[String],
        values: &[SqlValue],
    ) -> Result<InsertOutcome> {
        writer::insert_row(&self.pool, table, columns, values).await
    }

    async fn columns_of(&self, table: &str) -> Result<Option<Vec<String>>> {
        if !catalog::table_exists(&self.pool, table).await? {
            return Ok(None);
        }
        catalog::table_columns(&self.pool, table).await.map(Some)
    }

    async fn conflict_keys(&self, table: &str) -> Result<Vec<ConflictKey>> {
        catalog::conflict_keys(&self.pool, table).await
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::SQLite
    }
}
