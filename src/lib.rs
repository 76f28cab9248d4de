//! # sqlshift: capability-aware schema evolution
//!
//! A migration engine that applies ordered, reversible schema changes across
//! heterogeneous database backends, migrating existing data before
//! destructive changes and branching on backend capabilities (binary JSON
//! storage vs. textual JSON emulation vs. no distinction at all).
//!
//! Migration units are registered in code, ordered by id, applied exactly
//! once each, and tracked in a durable ledger. Each unit runs inside a
//! transaction where the backend supports transactional DDL.
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use sqlshift::{
//!     ColumnType, MigrationRegistry, MigrationRunner, MigrationUnit, PostgresDriver,
//!     PostgresLedger, Step,
//! };
//!
//! # async fn demo() -> Result<(), sqlshift::MigrationError> {
//! let mut registry = MigrationRegistry::new();
//! registry.register(
//!     MigrationUnit::new("20250129061658", "add metadata to orders")
//!         .reversible(Step::add_column_with_default(
//!             "orders",
//!             "customer_metadata",
//!             ColumnType::Document,
//!             json!({}),
//!         )),
//! )?;
//!
//! let driver = Arc::new(PostgresDriver::connect("postgres://localhost/app").await?);
//! let ledger = Arc::new(PostgresLedger::from_url("postgres://localhost/app").await?);
//! let runner = MigrationRunner::new(registry, driver, ledger);
//! let report = runner.run_up(None).await?;
//! assert!(!report.is_noop() || report.skipped_count > 0);
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod capability;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod registry;
pub mod runner;
pub mod step;
pub mod unit;

// Re-export core traits and types
pub use backends::*;
pub use capability::*;
pub use error::*;
pub use executor::*;
pub use ledger::*;
pub use registry::*;
pub use runner::*;
pub use step::*;
pub use unit::*;
