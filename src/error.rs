//! Error types for the migration engine
//!
//! Provides error handling for migration registration, step execution,
//! rollback safety, and ledger access.

use std::fmt;

/// Result type alias for migration operations
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Error types for migration operations
#[derive(Debug, Clone)]
pub enum MigrationError {
    /// Two migration units were registered with the same id (registration-time, fatal)
    DuplicateMigrationId(String),
    /// A migration unit violates a structural invariant at registration time
    InvalidUnit { unit: String, reason: String },
    /// A step failed while applying or reverting a unit; prior units remain committed
    StepExecution {
        unit: String,
        step: String,
        cause: String,
    },
    /// A rollback was requested through a unit that has no safe inverse
    IrreversibleMigration { unit: String, reason: String },
    /// A step requires a backend feature that is absent and has no defined
    /// fallback. The unit id is attached by the runner; it is `None` only
    /// when a step is applied outside a unit.
    CapabilityMismatch {
        unit: Option<String>,
        step: String,
        feature: String,
    },
    /// A migration id is not present in the registry
    UnknownMigration(String),
    /// Ledger storage error
    Ledger(String),
    /// Database connection or statement error
    Database(String),
    /// Advisory lock acquisition or release error
    Lock(String),
}

impl fmt::Display for MigrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationError::DuplicateMigrationId(id) => {
                write!(f, "Duplicate migration id: {}", id)
            }
            MigrationError::InvalidUnit { unit, reason } => {
                write!(f, "Invalid migration unit '{}': {}", unit, reason)
            }
            MigrationError::StepExecution { unit, step, cause } => {
                write!(
                    f,
                    "Migration '{}' failed at step [{}]: {}",
                    unit, step, cause
                )
            }
            MigrationError::IrreversibleMigration { unit, reason } => {
                write!(f, "Migration '{}' is irreversible: {}", unit, reason)
            }
            MigrationError::CapabilityMismatch {
                unit,
                step,
                feature,
            } => match unit {
                Some(unit) => write!(
                    f,
                    "Migration '{}' step [{}] requires backend feature '{}' which is unavailable",
                    unit, step, feature
                ),
                None => write!(
                    f,
                    "Step [{}] requires backend feature '{}' which is unavailable",
                    step, feature
                ),
            },
            MigrationError::UnknownMigration(id) => {
                write!(f, "Unknown migration id: {}", id)
            }
            MigrationError::Ledger(msg) => write!(f, "Ledger error: {}", msg),
            MigrationError::Database(msg) => write!(f, "Database error: {}", msg),
            MigrationError::Lock(msg) => write!(f, "Lock error: {}", msg),
        }
    }
}

impl std::error::Error for MigrationError {}

// Convert from sqlx errors
impl From<sqlx::Error> for MigrationError {
    fn from(err: sqlx::Error) -> Self {
        MigrationError::Database(err.to_string())
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for MigrationError {
    fn from(err: serde_json::Error) -> Self {
        MigrationError::Database(err.to_string())
    }
}

// Convert from anyhow errors
impl From<anyhow::Error> for MigrationError {
    fn from(err: anyhow::Error) -> Self {
        MigrationError::Database(err.to_string())
    }
}
