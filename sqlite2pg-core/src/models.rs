//! Core data models for schema-agnostic row transfer.
//!
//! Table and column metadata is discovered from the source catalog at run
//! time, so nothing here is generated per table: a [`Row`] is an ordered
//! mapping from column name to a tagged [`SqlValue`].

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Supported database types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatabaseType {
    PostgreSQL,
    SQLite,
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseType::PostgreSQL => write!(f, "PostgreSQL"),
            DatabaseType::SQLite => write!(f, "SQLite"),
        }
    }
}

/// A single scalar read from the source and written verbatim to the
/// destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Boolean(bool),
    Timestamp(NaiveDateTime),
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Short name of the variant, used in trace logs and error context.
    pub fn kind(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Integer(_) => "integer",
            SqlValue::Real(_) => "real",
            SqlValue::Text(_) => "text",
            SqlValue::Boolean(_) => "boolean",
            SqlValue::Timestamp(_) => "timestamp",
            SqlValue::Blob(_) => "blob",
        }
    }

    /// Renders the value in PostgreSQL's text input format.
    ///
    /// `None` means SQL NULL. Blobs use the `\x` hex form accepted by `bytea`.
    pub fn to_pg_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Integer(v) => Some(v.to_string()),
            SqlValue::Real(v) => Some(if v.is_nan() {
                "NaN".to_string()
            } else if v.is_infinite() {
                if v.is_sign_positive() {
                    "Infinity".to_string()
                } else {
                    "-Infinity".to_string()
                }
            } else {
                v.to_string()
            }),
            SqlValue::Text(v) => Some(v.clone()),
            SqlValue::Boolean(v) => Some(if *v { "true" } else { "false" }.to_string()),
            SqlValue::Timestamp(v) => Some(v.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            SqlValue::Blob(bytes) => {
                let mut hex = String::with_capacity(bytes.len().saturating_mul(2).saturating_add(2));
                hex.push_str("\\x");
                for byte in bytes {
                    hex.push_str(&format!("{:02x}", byte));
                }
                Some(hex)
            }
        }
    }
}

/// One source row: values aligned to a shared, ordered column list.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<SqlValue>,
}

impl Row {
    /// Builds a row, rejecting a value count that does not match the columns.
    pub fn new(columns: Arc<[String]>, values: Vec<SqlValue>) -> crate::Result<Self> {
        if columns.len() != values.len() {
            return Err(crate::error::MigrateError::schema(format!(
                "row has {} values for {} columns",
                values.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, values })
    }

    /// Column names in source declaration order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in the same order as [`Row::columns`].
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    /// Looks up a value by column name.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|idx| self.values.get(idx))
    }

    /// Iterates `(column, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A table name with its column names, as reported by the source catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<String>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Zero-column tables are catalog artifacts and are never copied.
    pub fn has_columns(&self) -> bool {
        !self.columns.is_empty()
    }
}

/// Primary key or unique constraint used by the destination to detect
/// conflicting rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictKey {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub is_primary: bool,
}

/// Outcome of copying one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReport {
    pub table: String,
    pub inserted: u64,
    pub total: u64,
}

impl TableReport {
    /// Rows that already existed at the destination.
    pub fn skipped(&self) -> u64 {
        self.total.saturating_sub(self.inserted)
    }
}

impl std::fmt::Display for TableReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: inserted {} / {}", self.table, self.inserted, self.total)
    }
}

/// Summary of a complete run, serializable for `--report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Copied tables in the order they were processed
    pub tables: Vec<TableReport>,
    /// Tables skipped because the source reported no columns
    pub empty_tables: Vec<String>,
    pub tool_version: String,
}

impl MigrationReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            duration_ms: 0,
            tables: Vec::new(),
            empty_tables: Vec::new(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn total_inserted(&self) -> u64 {
        self.tables
            .iter()
            .fold(0u64, |acc, t| acc.saturating_add(t.inserted))
    }

    pub fn total_rows(&self) -> u64 {
        self.tables
            .iter()
            .fold(0u64, |acc, t| acc.saturating_add(t.total))
    }

    /// Finds the report for a table by name.
    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn columns(names: &[&str]) -> Arc<[String]> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_table_report_display() {
        let report = TableReport {
            table: "users".to_string(),
            inserted: 0,
            total: 2,
        };
        assert_eq!(report.to_string(), "users: inserted 0 / 2");
        assert_eq!(report.skipped(), 2);
    }

    #[test]
    fn test_row_lookup_by_column() {
        let row = Row::new(
            columns(&["id", "name", "bio"]),
            vec![
                SqlValue::Integer(7),
                SqlValue::Text("Ada".to_string()),
                SqlValue::Null,
            ],
        )
        .unwrap();

        assert_eq!(row.get("name"), Some(&SqlValue::Text("Ada".to_string())));
        assert_eq!(row.get("bio"), Some(&SqlValue::Null));
        assert_eq!(row.get("missing"), None);
        assert_eq!(
            row.iter().map(|(c, _)| c).collect::<Vec<_>>(),
            vec!["id", "name", "bio"]
        );
    }

    #[test]
    fn test_row_rejects_misaligned_values() {
        let result = Row::new(columns(&["id", "name"]), vec![SqlValue::Integer(1)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_pg_text_rendering() {
        assert_eq!(SqlValue::Null.to_pg_text(), None);
        assert_eq!(SqlValue::Integer(-42).to_pg_text().as_deref(), Some("-42"));
        assert_eq!(SqlValue::Real(1.5).to_pg_text().as_deref(), Some("1.5"));
        assert_eq!(
            SqlValue::Real(f64::NEG_INFINITY).to_pg_text().as_deref(),
            Some("-Infinity")
        );
        assert_eq!(SqlValue::Boolean(true).to_pg_text().as_deref(), Some("true"));
        assert_eq!(
            SqlValue::Blob(vec![0x00, 0xab, 0x10]).to_pg_text().as_deref(),
            Some("\\x00ab10")
        );

        let ts = NaiveDate::from_ymd_opt(2024, 9, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        assert_eq!(
            SqlValue::Timestamp(ts).to_pg_text().as_deref(),
            Some("2024-09-01 08:30:00")
        );
    }

    #[test]
    fn test_report_totals() {
        let mut report = MigrationReport::new(Utc::now());
        report.tables.push(TableReport {
            table: "users".to_string(),
            inserted: 2,
            total: 2,
        });
        report.tables.push(TableReport {
            table: "posts".to_string(),
            inserted: 0,
            total: 1,
        });

        assert_eq!(report.total_inserted(), 2);
        assert_eq!(report.total_rows(), 3);
        assert_eq!(report.table("posts").map(TableReport::skipped), Some(1));
    }
}
