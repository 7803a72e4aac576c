//! PostgreSQL catalog lookups for the destination.
//!
//! Tables are resolved with `to_regclass`, so an unqualified name follows the
//! session `search_path` exactly like the insert statements do.

use crate::adapters::helpers::quote_ident;
use crate::models::ConflictKey;
use crate::{Result, error::MigrateError};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// Returns `(column, base type)` pairs in column order, or `None` if the
/// table does not exist.
///
/// Types carry no modifier: `varchar(5)` reads as `character varying` and
/// `char(3)` as `bpchar`. An explicit typmod of -1 keeps `char` and `bit` from
/// being rendered as their one-character SQL defaults.
pub async fn column_types(pool: &PgPool, table: &str) -> Result<Option<Vec<(String, String)>>> {
    let regclass = quote_ident(table)?;

    let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
        .bind(&regclass)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            MigrateError::catalog_query(format!("Failed to look up table '{}'", table), e)
        })?;

    if !exists {
        return Ok(None);
    }

    let rows = sqlx::query(
        r#"
        SELECT
            a.attname::text AS column_name,
            format_type(a.atttypid, -1) AS data_type
        FROM pg_attribute a
        WHERE a.attrelid = to_regclass($1)
        AND a.attnum > 0
        AND NOT a.attisdropped
        ORDER BY a.attnum
        "#,
    )
    .bind(&regclass)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        MigrateError::catalog_query(format!("Failed to read columns of '{}'", table), e)
    })?;

    let columns = rows
        .iter()
        .map(decode_column)
        .collect::<std::result::Result<Vec<_>, sqlx::Error>>()
        .map_err(|e| {
            MigrateError::catalog_query(format!("Failed to decode columns of '{}'", table), e)
        })?;

    Ok(Some(columns))
}

/// Returns the primary key and unique indexes of `table`, primary key first.
pub async fn conflict_keys(pool: &PgPool, table: &str) -> Result<Vec<ConflictKey>> {
    let regclass = quote_ident(table)?;

    let rows = sqlx::query(
        r#"
        SELECT
            ic.relname::text AS index_name,
            i.indisprimary AS is_primary,
            ARRAY(
                SELECT a.attname::text
                FROM unnest(i.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord)
                JOIN pg_attribute a
                    ON a.attrelid = i.indrelid
                    AND a.attnum = k.attnum
                ORDER BY k.ord
            ) AS columns
        FROM pg_index i
        JOIN pg_class ic ON ic.oid = i.indexrelid
        WHERE i.indrelid = to_regclass($1)
        AND (i.indisunique OR i.indisprimary)
        ORDER BY i.indisprimary DESC, ic.relname
        "#,
    )
    .bind(&regclass)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        MigrateError::catalog_query(format!("Failed to read constraints of '{}'", table), e)
    })?;

    let mut keys = Vec::with_capacity(rows.len());
    for row in &rows {
        let key = decode_conflict_key(row).map_err(|e| {
            MigrateError::catalog_query(format!("Failed to decode constraints of '{}'", table), e)
        })?;

        // Pure expression indexes have no plain columns to report.
        if !key.columns.is_empty() {
            keys.push(key);
        }
    }

    Ok(keys)
}

fn decode_column(row: &PgRow) -> std::result::Result<(String, String), sqlx::Error> {
    Ok((row.try_get("column_name")?, row.try_get("data_type")?))
}

fn decode_conflict_key(row: &PgRow) -> std::result::Result<ConflictKey, sqlx::Error> {
    Ok(ConflictKey {
        name: Some(row.try_get("index_name")?),
        columns: row.try_get("columns")?,
        is_primary: row.try_get("is_primary")?,
    })
}
