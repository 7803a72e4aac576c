//! Core data model, store adapters and run controller for sqlite2pg.
//!
//! This crate copies every table of a SQLite database into an existing
//! PostgreSQL (or SQLite) schema, parents before children, one row at a
//! time, skipping rows the destination already has. Running it twice never
//! duplicates data, so an interrupted migration is resumed by re-running it.
//!
//! # Security Guarantees
//! - The SQLite source is opened read-only
//! - No credentials stored or logged in any data structures
//! - Connection URLs are redacted in every error message
//!
//! # Architecture
//! - `adapters`: [`SourceStore`] / [`DestinationStore`] traits and their
//!   SQLite and PostgreSQL implementations
//! - `order`: Parent-before-child table ordering
//! - `migrator`: Run controller and row copier
//! - `preflight`: Destination schema check before copying
//! - `passwords`: Plaintext password rehash for the `users` table

pub mod adapters;
pub mod error;
pub mod logging;
pub mod migrator;
pub mod models;
pub mod order;
pub mod passwords;
pub mod preflight;

// Re-export commonly used types
pub use adapters::{
    ConnectionConfig, DestinationStore, InsertOutcome, MigrationConfig, PreflightMode,
    SourceStore, TlsMode, create_destination,
};
pub use error::{MigrateError, Result};
pub use logging::init_logging;
pub use migrator::{Migrator, RunOutcome, RunPhase, migrate_sqlite, migrate_sqlite_to_url};
pub use models::{
    ConflictKey, DatabaseType, MigrationReport, Row, SqlValue, TableDescriptor, TableReport,
};
pub use order::{DEFAULT_TABLE_ORDER, resolve_order};
pub use preflight::{PreflightReport, check_destination};
