//! Full-table reads from a SQLite source.
//!
//! SQLite stores each value with its own storage class regardless of the
//! declared column type, so decoding goes by the value, not the column.

use crate::adapters::helpers::select_all_sql;
use crate::models::{Row, SqlValue};
use crate::{Result, error::MigrateError};
use futures::TryStreamExt;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row as _, SqlitePool, TypeInfo, ValueRef};
use std::sync::Arc;

/// Reads every row of `table`, selecting exactly `columns` in that order.
pub async fn read_all(pool: &SqlitePool, table: &str, columns: &[String]) -> Result<Vec<Row>> {
    let sql = select_all_sql(table, columns)?;
    let shared: Arc<[String]> = columns.iter().cloned().collect();

    let mut stream = sqlx::query(&sql).fetch(pool);
    let mut rows = Vec::new();

    while let Some(row) = stream
        .try_next()
        .await
        .map_err(|e| MigrateError::read_failed(table, e))?
    {
        rows.push(decode_row(&row, &shared, table)?);
    }

    tracing::trace!("Read {} rows from '{}'", rows.len(), table);
    Ok(rows)
}

fn decode_row(row: &SqliteRow, columns: &Arc<[String]>, table: &str) -> Result<Row> {
    let values = (0..columns.len())
        .map(|idx| decode_value(row, idx).map_err(|e| MigrateError::read_failed(table, e)))
        .collect::<Result<Vec<_>>>()?;

    Row::new(Arc::clone(columns), values)
}

/// Decodes one value by its runtime storage class.
pub(crate) fn decode_value(
    row: &SqliteRow,
    idx: usize,
) -> std::result::Result<SqlValue, sqlx::Error> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }

    let storage_class = raw.type_info().name().to_string();
    let value = match storage_class.as_str() {
        "INTEGER" => SqlValue::Integer(row.try_get::<i64, _>(idx)?),
        "REAL" => SqlValue::Real(row.try_get::<f64, _>(idx)?),
        "BLOB" => SqlValue::Blob(row.try_get::<Vec<u8>, _>(idx)?),
        _ => SqlValue::Text(row.try_get::<String, _>(idx)?),
    };

    Ok(value)
}
