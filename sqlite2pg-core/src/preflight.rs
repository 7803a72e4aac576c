//! Destination schema check run before any row is copied.
//!
//! Idempotent re-runs rely on the destination rejecting duplicates, which
//! only happens if each table has a primary key or unique constraint. A
//! missing table or column would otherwise surface as a write error halfway
//! through the run, after earlier tables were already committed.

use crate::adapters::{DestinationStore, PreflightMode, SourceStore};
use crate::models::TableDescriptor;
use crate::{Result, error::MigrateError};
use serde::{Deserialize, Serialize};

/// Outcome of a successful preflight.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreflightReport {
    /// Tables whose destination schema was checked, in run order
    pub checked: Vec<String>,
    /// Tables without a primary key or unique constraint
    pub without_conflict_key: Vec<String>,
    /// Tables skipped because the source reports no columns
    pub empty_tables: Vec<String>,
}

impl PreflightReport {
    /// True when every checked table has a conflict key.
    pub fn is_clean(&self) -> bool {
        self.without_conflict_key.is_empty()
    }
}

/// Checks every table in `order` against the destination.
///
/// # Errors
/// - [`MigrateError::Schema`] if a destination table or column is missing
/// - [`MigrateError::MissingConflictKey`] in [`PreflightMode::Strict`] when a
///   table has no primary key or unique constraint
pub async fn check_destination(
    source: &dyn SourceStore,
    destination: &dyn DestinationStore,
    order: &[String],
    mode: PreflightMode,
) -> Result<PreflightReport> {
    let mut report = PreflightReport::default();

    if mode == PreflightMode::Skip {
        tracing::debug!("Destination preflight skipped");
        return Ok(report);
    }

    for table in order {
        let descriptor = TableDescriptor::new(table.as_str(), source.columns_of(table).await?);
        if !descriptor.has_columns() {
            report.empty_tables.push(descriptor.name);
            continue;
        }

        check_table(destination, &descriptor).await?;

        let keys = destination.conflict_keys(table).await?;
        if keys.is_empty() {
            if mode == PreflightMode::Strict {
                return Err(MigrateError::MissingConflictKey {
                    table: table.clone(),
                });
            }
            tracing::warn!(
                "Destination table '{}' has no primary key or unique constraint; \
                 re-running the migration will duplicate its rows",
                table
            );
            report.without_conflict_key.push(table.clone());
        }

        report.checked.push(descriptor.name);
    }

    tracing::info!(
        "Destination preflight passed for {} tables ({} without conflict key)",
        report.checked.len(),
        report.without_conflict_key.len()
    );

    Ok(report)
}

async fn check_table(destination: &dyn DestinationStore, descriptor: &TableDescriptor) -> Result<()> {
    let Some(destination_columns) = destination.columns_of(&descriptor.name).await? else {
        return Err(MigrateError::schema(format!(
            "destination table '{}' does not exist",
            descriptor.name
        )));
    };

    let missing: Vec<&str> = descriptor
        .columns
        .iter()
        .filter(|column| !destination_columns.contains(column))
        .map(String::as_str)
        .collect();

    if !missing.is_empty() {
        return Err(MigrateError::schema(format!(
            "destination table '{}' is missing column(s): {}",
            descriptor.name,
            missing.join(", ")
        )));
    }

    Ok(())
}
