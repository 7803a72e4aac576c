//! Configuration types for store adapters.
//!
//! - `ConnectionConfig`: per-store connection settings
//! - `MigrationConfig`: run-level settings resolved from flags and environment
//!
//! # Security
//! Passwords are never copied out of connection URLs into these structs.

mod connection;
mod migration;

pub use connection::{ConnectionConfig, TlsMode};
pub use migration::{DEFAULT_SQLITE_PATH, MigrationConfig, PreflightMode};
