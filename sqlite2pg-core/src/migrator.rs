//! Run controller and row copier.
//!
//! A run walks the resolved table order one table at a time and copies each
//! table one row at a time. Every insert is its own atomic unit at the
//! destination and conflicting rows are skipped, so an interrupted run is
//! resumed by simply running it again.
//!
//! ```text
//! NotStarted -> SourceOpen -> {Resolving -> Introspecting -> Copying} x N
//!            -> SourceClosed(Success | Failure)
//! ```
//!
//! The first `Resolving` covers building the table order and the destination
//! preflight; later ones only select the next table from that order.

use crate::adapters::sqlite::SqliteSource;
use crate::adapters::{
    ConnectionConfig, DestinationStore, MigrationConfig, PreflightMode, SourceStore,
};
use crate::models::{MigrationReport, TableReport};
use crate::order::{default_table_order, resolve_order};
use crate::preflight;
use crate::Result;
use chrono::Utc;
use std::time::Instant;

/// Terminal result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    Failure,
}

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    NotStarted,
    SourceOpen,
    Resolving,
    Introspecting,
    Copying,
    SourceClosed(RunOutcome),
}

/// Copies every table of a source store into a destination store.
///
/// The source is closed when [`Migrator::run`] returns, whatever the outcome.
/// The destination belongs to the caller and is left open.
pub struct Migrator<'a> {
    source: &'a dyn SourceStore,
    destination: &'a dyn DestinationStore,
    table_order: Vec<String>,
    preflight: PreflightMode,
    phase: RunPhase,
    #[cfg(test)]
    history: Vec<RunPhase>,
}

impl<'a> Migrator<'a> {
    /// Creates a migrator with the default table order and preflight.
    pub fn new(source: &'a dyn SourceStore, destination: &'a dyn DestinationStore) -> Self {
        Self {
            source,
            destination,
            table_order: default_table_order(),
            preflight: PreflightMode::default(),
            phase: RunPhase::NotStarted,
            #[cfg(test)]
            history: Vec::new(),
        }
    }

    /// Builder method to override the preferred table order.
    pub fn with_table_order(mut self, table_order: Vec<String>) -> Self {
        self.table_order = table_order;
        self
    }

    /// Builder method to set the preflight mode.
    pub fn with_preflight(mut self, preflight: PreflightMode) -> Self {
        self.preflight = preflight;
        self
    }

    /// Current phase of the run.
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    fn transition(&mut self, next: RunPhase) {
        tracing::debug!("Run phase: {:?} -> {:?}", self.phase, next);
        self.phase = next;
        #[cfg(test)]
        self.history.push(next);
    }

    /// Runs the migration, calling `progress` after each copied table.
    ///
    /// # Errors
    /// The first schema, read or write error aborts the run. Rows committed
    /// before the failure stay committed.
    pub async fn run<F>(&mut self, mut progress: F) -> Result<MigrationReport>
    where
        F: FnMut(&TableReport),
    {
        self.transition(RunPhase::SourceOpen);

        let result = self.run_tables(&mut progress).await;

        self.source.close().await;
        let outcome = if result.is_ok() {
            RunOutcome::Success
        } else {
            RunOutcome::Failure
        };
        self.transition(RunPhase::SourceClosed(outcome));

        result
    }

    async fn run_tables<F>(&mut self, progress: &mut F) -> Result<MigrationReport>
    where
        F: FnMut(&TableReport),
    {
        let started_at = Utc::now();
        let timer = Instant::now();
        let mut report = MigrationReport::new(started_at);

        self.transition(RunPhase::Resolving);
        let source_tables = self.source.list_tables().await?;
        let order = resolve_order(&source_tables, &self.table_order);
        tracing::info!(
            "Migrating {} tables from {} to {}",
            order.len(),
            self.source.database_type(),
            self.destination.database_type()
        );

        preflight::check_destination(self.source, self.destination, &order, self.preflight)
            .await?;

        for table in &order {
            if self.phase != RunPhase::Resolving {
                self.transition(RunPhase::Resolving);
            }
            tracing::debug!("Next table: '{}'", table);

            self.transition(RunPhase::Introspecting);
            let columns = self.source.columns_of(table).await?;
            if columns.is_empty() {
                tracing::info!("Table '{}' has no columns; nothing to copy", table);
                report.empty_tables.push(table.clone());
                continue;
            }

            self.transition(RunPhase::Copying);
            let table_report = self.copy_table(table, &columns).await?;
            tracing::info!("{}", table_report);
            progress(&table_report);
            report.tables.push(table_report);
        }

        report.duration_ms = u64::try_from(timer.elapsed().as_millis()).unwrap_or(u64::MAX);
        Ok(report)
    }

    /// Copies one table row by row, counting inserted versus skipped rows.
    ///
    /// # Errors
    /// Returns [`crate::error::MigrateError::Read`] if the source cannot be
    /// read, and [`crate::error::MigrateError::Write`] carrying the 1-based
    /// row position for any insert failure other than a uniqueness conflict.
    pub async fn copy_table(&self, table: &str, columns: &[String]) -> Result<TableReport> {
        let rows = self.source.read_all(table, columns).await?;
        let mut inserted: u64 = 0;
        let mut position: u64 = 0;

        for row in &rows {
            position = position.saturating_add(1);
            let outcome = self
                .destination
                .insert_row(table, row.columns(), row.values())
                .await
                .map_err(|e| e.at_row(position))?;

            if outcome.inserted {
                inserted = inserted.saturating_add(1);
            } else {
                tracing::trace!("{} row {}: already present, skipped", table, position);
            }
        }

        Ok(TableReport {
            table: table.to_string(),
            inserted,
            total: position,
        })
    }
}

/// Opens the configured SQLite file and migrates it into `destination`.
///
/// The SQLite source is opened read-only and closed before this returns,
/// on success and on failure alike.
///
/// # Errors
/// Returns a configuration error before touching any store if `config` is
/// invalid, otherwise the first error of the run.
pub async fn migrate_sqlite<F>(
    config: &MigrationConfig,
    destination: &dyn DestinationStore,
    progress: F,
) -> Result<MigrationReport>
where
    F: FnMut(&TableReport),
{
    config.validate()?;

    let source = SqliteSource::open(
        &config.sqlite_path,
        ConnectionConfig::default().with_connect_timeout(config.connect_timeout),
    )
    .await?;

    Migrator::new(&source, destination)
        .with_table_order(config.table_order.clone())
        .with_preflight(config.preflight)
        .run(progress)
        .await
}

/// Opens the destination named by `config` and runs [`migrate_sqlite`].
///
/// The destination pool is dropped when the run ends.
///
/// # Errors
/// Returns the first configuration, connection or migration error.
pub async fn migrate_sqlite_to_url<F>(
    config: &MigrationConfig,
    progress: F,
) -> Result<MigrationReport>
where
    F: FnMut(&TableReport),
{
    config.validate()?;

    let connection = ConnectionConfig::default()
        .with_connect_timeout(config.connect_timeout)
        .with_tls(config.tls);
    let destination =
        crate::adapters::create_destination(&config.database_url, &connection).await?;

    migrate_sqlite(config, destination.as_ref(), progress).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::adapters::InsertOutcome;
    use crate::error::MigrateError;
    use crate::models::{ConflictKey, DatabaseType, Row, SqlValue};
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// In-memory source: table name to (columns, rows). Listed tables
    /// without an entry behave as if they vanished from the catalog.
    #[derive(Default)]
    struct FakeSource {
        listed: Vec<String>,
        tables: HashMap<String, (Vec<String>, Vec<Vec<SqlValue>>)>,
        closed: AtomicBool,
    }

    impl FakeSource {
        fn with_table(mut self, name: &str, columns: &[&str], rows: Vec<Vec<SqlValue>>) -> Self {
            self.listed.push(name.to_string());
            self.tables.insert(
                name.to_string(),
                (columns.iter().map(|c| c.to_string()).collect(), rows),
            );
            self
        }

        fn with_phantom(mut self, name: &str) -> Self {
            self.listed.push(name.to_string());
            self
        }
    }

    #[async_trait]
    impl SourceStore for FakeSource {
        async fn list_tables(&self) -> Result<Vec<String>> {
            Ok(self.listed.clone())
        }

        async fn columns_of(&self, table: &str) -> Result<Vec<String>> {
            self.tables
                .get(table)
                .map(|(columns, _)| columns.clone())
                .ok_or_else(|| MigrateError::table_not_found(table, "fake"))
        }

        async fn read_all(&self, table: &str, columns: &[String]) -> Result<Vec<Row>> {
            let shared: Arc<[String]> = columns.iter().cloned().collect();
            let (_, rows) = &self.tables[table];
            rows.iter()
                .map(|values| Row::new(Arc::clone(&shared), values.clone()))
                .collect()
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }

        fn database_type(&self) -> DatabaseType {
            DatabaseType::SQLite
        }
    }

    /// Destination keyed on the first value of each row; rejects tables in
    /// `failing`.
    #[derive(Default)]
    struct FakeDestination {
        keys: Mutex<HashSet<(String, String)>>,
        inserts: Mutex<Vec<String>>,
        failing: HashSet<String>,
    }

    #[async_trait]
    impl DestinationStore for FakeDestination {
        async fn insert_row(
            &self,
            table: &str,
            _columns: &[String],
            values: &[SqlValue],
        ) -> Result<InsertOutcome> {
            if self.failing.contains(table) {
                return Err(MigrateError::write_failed(
                    table,
                    0,
                    std::io::Error::other("constraint violation"),
                ));
            }
            self.inserts.lock().unwrap().push(table.to_string());
            let key = (table.to_string(), format!("{:?}", values.first()));
            Ok(InsertOutcome {
                inserted: self.keys.lock().unwrap().insert(key),
            })
        }

        async fn columns_of(&self, _table: &str) -> Result<Option<Vec<String>>> {
            Ok(None)
        }

        async fn conflict_keys(&self, _table: &str) -> Result<Vec<ConflictKey>> {
            Ok(Vec::new())
        }

        fn database_type(&self) -> DatabaseType {
            DatabaseType::PostgreSQL
        }
    }

    fn ids(values: &[i64]) -> Vec<Vec<SqlValue>> {
        values.iter().map(|v| vec![SqlValue::Integer(*v)]).collect()
    }

    #[tokio::test]
    async fn test_run_closes_source_on_success() {
        let source = FakeSource::default()
            .with_table("posts", &["id"], ids(&[10]))
            .with_table("users", &["id"], ids(&[1, 2]));
        let destination = FakeDestination::default();

        let mut migrator = Migrator::new(&source, &destination)
            .with_table_order(vec!["users".to_string(), "posts".to_string()])
            .with_preflight(PreflightMode::Skip);
        assert_eq!(migrator.phase(), RunPhase::NotStarted);

        let mut lines = Vec::new();
        let report = migrator.run(|t| lines.push(t.to_string())).await.unwrap();

        assert_eq!(lines, vec!["users: inserted 2 / 2", "posts: inserted 1 / 1"]);
        assert_eq!(report.total_rows(), 3);
        assert_eq!(migrator.phase(), RunPhase::SourceClosed(RunOutcome::Success));
        assert!(source.closed.load(Ordering::SeqCst));
        assert_eq!(
            *destination.inserts.lock().unwrap(),
            vec!["users", "users", "posts"]
        );
    }

    #[tokio::test]
    async fn test_phases_follow_the_work() {
        let source = FakeSource::default()
            .with_table("users", &["id"], ids(&[1]))
            .with_table("posts", &["id"], ids(&[1]));
        let destination = FakeDestination::default();

        let mut migrator = Migrator::new(&source, &destination)
            .with_table_order(vec!["users".to_string(), "posts".to_string()])
            .with_preflight(PreflightMode::Skip);
        migrator.run(|_| {}).await.unwrap();

        assert_eq!(
            migrator.history,
            vec![
                RunPhase::SourceOpen,
                RunPhase::Resolving,
                RunPhase::Introspecting,
                RunPhase::Copying,
                RunPhase::Resolving,
                RunPhase::Introspecting,
                RunPhase::Copying,
                RunPhase::SourceClosed(RunOutcome::Success),
            ]
        );
    }

    #[tokio::test]
    async fn test_preflight_failure_happens_while_resolving() {
        let source = FakeSource::default().with_table("users", &["id"], ids(&[1]));
        let destination = FakeDestination::default();

        let mut migrator = Migrator::new(&source, &destination);
        migrator.run(|_| {}).await.unwrap_err();

        assert_eq!(
            migrator.history,
            vec![
                RunPhase::SourceOpen,
                RunPhase::Resolving,
                RunPhase::SourceClosed(RunOutcome::Failure),
            ]
        );
    }

    #[tokio::test]
    async fn test_zero_column_table_is_skipped() {
        let source = FakeSource::default()
            .with_table("placeholder", &[], Vec::new())
            .with_table("users", &["id"], ids(&[1]));
        let destination = FakeDestination::default();

        let mut lines = Vec::new();
        let report = Migrator::new(&source, &destination)
            .with_preflight(PreflightMode::Skip)
            .run(|t| lines.push(t.to_string()))
            .await
            .unwrap();

        assert_eq!(lines, vec!["users: inserted 1 / 1"]);
        assert_eq!(report.empty_tables, vec!["placeholder"]);
        assert!(report.table("placeholder").is_none());
        assert_eq!(*destination.inserts.lock().unwrap(), vec!["users"]);
    }

    #[tokio::test]
    async fn test_missing_table_aborts_and_closes_source() {
        let source = FakeSource::default()
            .with_table("users", &["id"], ids(&[1]))
            .with_phantom("ghosts")
            .with_table("posts", &["id"], ids(&[1]));
        let destination = FakeDestination::default();

        let mut migrator = Migrator::new(&source, &destination)
            .with_table_order(Vec::new())
            .with_preflight(PreflightMode::Skip);
        let err = migrator.run(|_| {}).await.unwrap_err();

        assert!(matches!(err, MigrateError::TableNotFound { ref table, .. } if table == "ghosts"));
        assert_eq!(migrator.phase(), RunPhase::SourceClosed(RunOutcome::Failure));
        assert!(source.closed.load(Ordering::SeqCst));
        // users ran before the failure; posts never started.
        assert_eq!(*destination.inserts.lock().unwrap(), vec!["users"]);
    }

    #[tokio::test]
    async fn test_copy_table_counts_and_reports_row_position() {
        let source = FakeSource::default().with_table("likes", &["id"], ids(&[1, 1, 2, 3, 3]));
        let destination = FakeDestination::default();
        let migrator = Migrator::new(&source, &destination);

        let report = migrator
            .copy_table("likes", &["id".to_string()])
            .await
            .unwrap();
        assert_eq!(report.inserted, 3);
        assert_eq!(report.total, 5);
        assert_eq!(report.skipped(), 2);

        let failing = FakeDestination {
            failing: HashSet::from(["likes".to_string()]),
            ..Default::default()
        };
        let migrator = Migrator::new(&source, &failing);
        let err = migrator
            .copy_table("likes", &["id".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to write row 1 of table 'likes'");
    }

    #[tokio::test]
    async fn test_strict_preflight_stops_before_copying() {
        let source = FakeSource::default().with_table("users", &["id"], ids(&[1]));
        let destination = FakeDestination::default();

        let mut migrator =
            Migrator::new(&source, &destination).with_preflight(PreflightMode::Strict);
        let err = migrator.run(|_| {}).await.unwrap_err();

        // The fake destination reports no tables at all.
        assert!(err.is_schema_error());
        assert!(destination.inserts.lock().unwrap().is_empty());
        assert!(source.closed.load(Ordering::SeqCst));
    }
}
