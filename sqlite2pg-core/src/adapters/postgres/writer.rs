//! Idempotent row inserts into PostgreSQL.

use super::{PostgresDestination, PreparedInsert, catalog};
use crate::adapters::InsertOutcome;
use crate::adapters::helpers::insert_ignore_sql;
use crate::models::SqlValue;
use crate::{Result, error::MigrateError};
use std::collections::HashMap;
use std::sync::Arc;

/// Inserts one row with `ON CONFLICT DO NOTHING`.
///
/// The returned write error carries row 0; the copier attaches the real
/// position.
pub async fn insert_row(
    destination: &PostgresDestination,
    table: &str,
    columns: &[String],
    values: &[SqlValue],
) -> Result<InsertOutcome> {
    if columns.len() != values.len() {
        return Err(MigrateError::schema(format!(
            "insert into '{}' has {} values for {} columns",
            table,
            values.len(),
            columns.len()
        )));
    }

    let sql = prepared_insert(destination, table, columns).await?;

    let query = values
        .iter()
        .fold(sqlx::query(&sql), |query, value| query.bind(value.to_pg_text()));

    let result = query
        .execute(&destination.pool)
        .await
        .map_err(|e| MigrateError::write_failed(table, 0, e))?;

    Ok(InsertOutcome::from_rows_affected(result.rows_affected()))
}

/// Returns the cached insert for `table`, building it on first use or when
/// the column list changes.
async fn prepared_insert(
    destination: &PostgresDestination,
    table: &str,
    columns: &[String],
) -> Result<Arc<str>> {
    let mut inserts = destination.inserts.lock().await;

    if let Some(prepared) = inserts.get(table)
        && prepared.columns == columns
    {
        return Ok(Arc::clone(&prepared.sql));
    }

    let types = catalog::column_types(&destination.pool, table)
        .await?
        .ok_or_else(|| {
            MigrateError::schema(format!("destination table '{}' does not exist", table))
        })?;
    let types: HashMap<String, String> = types.into_iter().collect();
    let sql: Arc<str> = build_insert_sql(table, columns, &types)?.into();

    tracing::trace!("Prepared insert for '{}': {}", table, sql);

    inserts.insert(
        table.to_string(),
        PreparedInsert {
            columns: columns.to_vec(),
            sql: Arc::clone(&sql),
        },
    );

    Ok(sql)
}

/// Builds an insert whose text parameters are cast to each column's type.
pub(crate) fn build_insert_sql(
    table: &str,
    columns: &[String],
    types: &HashMap<String, String>,
) -> Result<String> {
    let placeholders = columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let data_type = types.get(column).ok_or_else(|| {
                MigrateError::schema(format!(
                    "destination table '{}' has no column '{}'",
                    table, column
                ))
            })?;
            Ok(format!("CAST(${} AS {})", idx.saturating_add(1), data_type))
        })
        .collect::<Result<Vec<_>>>()?;

    insert_ignore_sql(table, columns, placeholders)
}
