//! SQLite catalog lookups.
//!
//! # SQLite System Tables
//! - `sqlite_master`: Table names, in catalog (creation) order
//! - `PRAGMA table_info()`: Column names in declaration order, plus primary key position
//! - `PRAGMA index_list()`: Indexes and their uniqueness
//! - `PRAGMA index_info()`: Columns in an index

use crate::adapters::helpers::quote_literal;
use crate::models::ConflictKey;
use crate::{Result, error::MigrateError};
use sqlx::{Row, SqlitePool};

/// Lists user tables in catalog order, excluding SQLite's internal `sqlite_*` tables.
pub async fn list_tables(pool: &SqlitePool) -> Result<Vec<String>> {
    let rows = sqlx::query(
        r#"
        SELECT name
        FROM sqlite_master
        WHERE type = 'table'
        AND name NOT LIKE 'sqlite_%'
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(|e| MigrateError::catalog_query("Failed to list SQLite tables", e))?;

    rows.iter()
        .map(|row| {
            row.try_get::<String, _>("name")
                .map_err(|e| MigrateError::catalog_query("Failed to read table name", e))
        })
        .collect()
}

/// Checks whether `table` is an ordinary table in `sqlite_master`.
pub async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
    )
    .bind(table)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        MigrateError::catalog_query(format!("Failed to look up table '{}'", table), e)
    })?;

    Ok(count > 0)
}

/// Returns column names of `table` in declaration order.
///
/// Returns an empty list for a table PRAGMA cannot describe; callers decide
/// whether that is an error.
pub async fn table_columns(pool: &SqlitePool, table: &str) -> Result<Vec<String>> {
    let query = format!("PRAGMA table_info({})", quote_literal(table));
    let rows = sqlx::query(&query).fetch_all(pool).await.map_err(|e| {
        MigrateError::catalog_query(format!("Failed to read columns of '{}'", table), e)
    })?;

    rows.iter()
        .map(|row| {
            row.try_get::<String, _>("name").map_err(|e| {
                MigrateError::catalog_query(format!("Failed to read column of '{}'", table), e)
            })
        })
        .collect()
}

/// Returns the primary key and every unique index of `table`.
pub async fn conflict_keys(pool: &SqlitePool, table: &str) -> Result<Vec<ConflictKey>> {
    let mut keys = Vec::new();

    let info_query = format!("PRAGMA table_info({})", quote_literal(table));
    let info_rows = sqlx::query(&info_query)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            MigrateError::catalog_query(format!("Failed to read primary key of '{}'", table), e)
        })?;

    let mut pk_columns: Vec<(i64, String)> = info_rows
        .iter()
        .filter_map(|row| {
            let pk: i64 = row.try_get("pk").unwrap_or(0);
            let name: String = row.try_get("name").ok()?;
            (pk > 0).then_some((pk, name))
        })
        .collect();
    pk_columns.sort_by_key(|(position, _)| *position);

    if !pk_columns.is_empty() {
        keys.push(ConflictKey {
            name: None,
            columns: pk_columns.into_iter().map(|(_, name)| name).collect(),
            is_primary: true,
        });
    }

    let list_query = format!("PRAGMA index_list({})", quote_literal(table));
    let index_rows = sqlx::query(&list_query)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            MigrateError::catalog_query(format!("Failed to read indexes of '{}'", table), e)
        })?;

    for row in &index_rows {
        let unique: i64 = row.try_get("unique").unwrap_or(0);
        let origin: String = row.try_get("origin").unwrap_or_default();
        // The primary key was already taken from table_info.
        if unique == 0 || origin == "pk" {
            continue;
        }

        let index_name: String = row.try_get("name").map_err(|e| {
            MigrateError::catalog_query(format!("Failed to read index name of '{}'", table), e)
        })?;

        let columns = index_columns(pool, &index_name).await?;
        // Expression indexes report NULL column names.
        if columns.is_empty() {
            continue;
        }

        keys.push(ConflictKey {
            name: Some(index_name),
            columns,
            is_primary: false,
        });
    }

    Ok(keys)
}

async fn index_columns(pool: &SqlitePool, index_name: &str) -> Result<Vec<String>> {
    let query = format!("PRAGMA index_info({})", quote_literal(index_name));
    let rows = sqlx::query(&query).fetch_all(pool).await.map_err(|e| {
        MigrateError::catalog_query(format!("Failed to read index '{}'", index_name), e)
    })?;

    let names: Option<Vec<String>> = rows
        .iter()
        .map(|row| row.try_get::<Option<String>, _>("name").ok().flatten())
        .collect();

    Ok(names.unwrap_or_default())
}
