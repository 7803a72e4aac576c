//! SQL text helpers shared by the store adapters.
//!
//! Identifiers cannot be bound as parameters, so table and column names
//! discovered from the catalog are validated and double-quoted here. Both
//! SQLite and PostgreSQL use ANSI double-quote quoting.

use crate::{Result, error::MigrateError};

/// Maximum identifier length accepted from a catalog.
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Rejects empty, oversized, or NUL-containing identifiers.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::schema("identifier cannot be empty"));
    }

    if name.contains('\0') {
        return Err(MigrateError::schema(format!(
            "identifier contains a NUL byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::schema(format!(
            "identifier exceeds {} bytes: {:?}",
            MAX_IDENTIFIER_LENGTH, name
        )));
    }

    Ok(())
}

/// Quotes an identifier, doubling embedded double quotes.
///
/// ```rust
/// use sqlite2pg_core::adapters::helpers::quote_ident;
///
/// assert_eq!(quote_ident("users").unwrap(), "\"users\"");
/// assert_eq!(quote_ident("odd\"name").unwrap(), "\"odd\"\"name\"");
/// ```
pub fn quote_ident(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quotes a string literal for catalog statements that cannot take
/// parameters, such as `PRAGMA table_info('...')`.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Quotes and joins a column list: `"a", "b", "c"`.
pub fn quoted_column_list(columns: &[String]) -> Result<String> {
    let quoted = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Result<Vec<_>>>()?;
    Ok(quoted.join(", "))
}

/// Builds `SELECT "c1", ... FROM "table"`.
pub fn select_all_sql(table: &str, columns: &[String]) -> Result<String> {
    Ok(format!(
        "SELECT {} FROM {}",
        quoted_column_list(columns)?,
        quote_ident(table)?
    ))
}

/// Builds an idempotent insert: any uniqueness conflict skips the row.
///
/// `placeholders` yields one parameter expression per column.
pub fn insert_ignore_sql<I>(table: &str, columns: &[String], placeholders: I) -> Result<String>
where
    I: IntoIterator<Item = String>,
{
    if columns.is_empty() {
        return Err(MigrateError::schema(format!(
            "cannot build an insert for table '{}' without columns",
            table
        )));
    }

    let placeholders: Vec<String> = placeholders.into_iter().collect();
    if placeholders.len() != columns.len() {
        return Err(MigrateError::schema(format!(
            "insert for table '{}' has {} placeholders for {} columns",
            table,
            placeholders.len(),
            columns.len()
        )));
    }

    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT DO NOTHING",
        quote_ident(table)?,
        quoted_column_list(columns)?,
        placeholders.join(", ")
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("users").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("bad\0name").is_err());
        assert!(validate_identifier(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("users"), "'users'");
        assert_eq!(quote_literal("o'brien"), "'o''brien'");
    }

    #[test]
    fn test_select_all_sql() {
        let sql = select_all_sql("posts", &cols(&["id", "user_id", "body"])).unwrap();
        assert_eq!(sql, "SELECT \"id\", \"user_id\", \"body\" FROM \"posts\"");
    }

    #[test]
    fn test_insert_ignore_sql() {
        let columns = cols(&["id", "name"]);
        let sql = insert_ignore_sql("users", &columns, columns.iter().map(|_| "?".to_string()))
            .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"users\" (\"id\", \"name\") VALUES (?, ?) ON CONFLICT DO NOTHING"
        );
    }

    #[test]
    fn test_insert_ignore_sql_rejects_mismatch() {
        let columns = cols(&["id", "name"]);
        assert!(insert_ignore_sql("users", &columns, vec!["?".to_string()]).is_err());
        assert!(insert_ignore_sql("users", &[], Vec::new()).is_err());
    }
}
