//! Database Backend Abstractions
//!
//! This module provides the minimal driver boundary the migration engine
//! depends on. Everything the engine knows about a backend flows through
//! [`DatabaseDriver`]: schema introspection, DDL/DML execution, and
//! feature probing.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

pub use memory::MemoryDriver;
pub use postgres::{PostgresDriver, PostgresLedger};

use crate::error::MigrationResult;

/// Feature name for a distinct binary JSON column type with index support
pub const FEATURE_BINARY_JSON: &str = "binary_json";

/// Feature name for transactional DDL (schema changes roll back with the transaction)
pub const FEATURE_TRANSACTIONAL_DDL: &str = "transactional_ddl";

/// Minimal capability-and-DDL interface the engine consumes from a backend.
///
/// The engine never depends on more than this: a name, a feature probe,
/// column introspection, and statement execution.
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Human-readable backend name as reported by the driver
    fn backend_name(&self) -> &str;

    /// Probe a named backend feature. Unknown features are `false`, never an error.
    async fn supports_feature(&self, feature: &str) -> bool;

    /// Check whether a column exists on a table
    async fn column_exists(&self, table: &str, column: &str) -> MigrationResult<bool>;

    /// Execute a single DDL or DML statement, returning affected rows
    async fn execute(&self, sql: &str) -> MigrationResult<u64>;
}

/// Database backend kind enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::PostgreSQL => write!(f, "PostgreSQL"),
            BackendKind::MySQL => write!(f, "MySQL"),
            BackendKind::SQLite => write!(f, "SQLite"),
        }
    }
}
