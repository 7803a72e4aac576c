//! Idempotent row inserts into a SQLite destination.

use crate::adapters::InsertOutcome;
use crate::adapters::helpers::insert_ignore_sql;
use crate::models::SqlValue;
use crate::{Result, error::MigrateError};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};
use sqlx::SqlitePool;

/// Inserts one row with `ON CONFLICT DO NOTHING`.
///
/// The returned write error carries row 0; the copier attaches the real
/// position.
pub async fn insert_row(
    pool: &SqlitePool,
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

    let sql = insert_ignore_sql(table, columns, columns.iter().map(|_| "?".to_string()))?;

    let query = values
        .iter()
        .fold(sqlx::query(&sql), |query, value| bind_value(query, value));

    let result = query
        .execute(pool)
        .await
        .map_err(|e| MigrateError::write_failed(table, 0, e))?;

    Ok(InsertOutcome::from_rows_affected(result.rows_affected()))
}

pub(crate) fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &SqlValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Integer(v) => query.bind(*v),
        SqlValue::Real(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.clone()),
        SqlValue::Boolean(v) => query.bind(*v),
        SqlValue::Timestamp(v) => query.bind(*v),
        SqlValue::Blob(v) => query.bind(v.clone()),
    }
}
