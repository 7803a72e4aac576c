//! PostgreSQL destination adapter.
//!
//! # Module Structure
//! - `connection`: Pool creation, TLS policy and URL validation
//! - `catalog`: Column types and conflict keys from `pg_attribute` / `pg_index`
//! - `writer`: Idempotent single-row inserts
//!
//! # Value Binding
//! Every value is sent as a text parameter and cast to the destination
//! base type of the destination column (`CAST($1 AS timestamp with time zone)`).
//! The server's input functions then parse it exactly as they would a literal,
//! so loosely typed SQLite values (integer booleans, text timestamps) land
//! in strictly typed columns without per-type conversion code.
//!
//! The cast never carries a type modifier: an explicit cast to `varchar(n)`
//! silently truncates, while assignment to the column rejects over-length
//! values with an error.

pub mod catalog;
pub mod connection;
pub mod writer;


use super::{ConnectionConfig, DestinationStore, InsertOutcome};
use crate::Result;
use crate::models::{ConflictKey, DatabaseType, SqlValue};
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Insert statement prepared for one table and column list.
#[derive(Debug, Clone)]
pub(crate) struct PreparedInsert {
    pub columns: Vec<String>,
    pub sql: Arc<str>,
}

/// PostgreSQL store used as the migration destination.
pub struct PostgresDestination {
    pub(crate) pool: PgPool,
    pub(crate) config: ConnectionConfig,
    pub(crate) inserts: Mutex<HashMap<String, PreparedInsert>>,
}

impl std::fmt::Debug for PostgresDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresDestination")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PostgresDestination {
    /// Connection configuration parsed from the URL (no credentials).
    pub fn connection_config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Underlying pool, for callers that own the destination's lifecycle.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Closes the pool. The migrator never calls this; the owner does.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl DestinationStore for PostgresDestination {
    async fn insert_row(
        &self,
        table: &str,
        columns: &[String],
        values: &[SqlValue],
    ) -> Result<InsertOutcome> {
        writer::insert_row(self, table, columns, values).await
    }

    async fn columns_of(&self, table: &str) -> Result<Option<Vec<String>>> {
        let types = catalog::column_types(&self.pool, table).await?;
        Ok(types.map(|columns| columns.into_iter().map(|(name, _)| name).collect()))
    }

    async fn conflict_keys(&self, table: &str) -> Result<Vec<ConflictKey>> {
        catalog::conflict_keys(&self.pool, table).await
    }

    fn database_type(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }
}
