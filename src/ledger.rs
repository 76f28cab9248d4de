//! Ledger - Durable record of applied migration ids
//!
//! The ledger is the source of truth for idempotency: a unit is applied
//! exactly when its entry exists. It is the only mutable persisted state in
//! the engine, written after a unit fully succeeds and removed after a unit
//! is fully reverted.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MigrationResult;

/// One applied migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Migration unit id
    pub migration_id: String,
    /// When the unit was applied
    pub applied_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Entry for a unit applied right now
    pub fn now(migration_id: &str) -> Self {
        Self {
            migration_id: migration_id.to_string(),
            applied_at: Utc::now(),
        }
    }
}

/// Configuration for the migration engine
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Table name for the persisted ledger
    pub ledger_table: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            ledger_table: "sqlshift_migrations".to_string(),
        }
    }
}

/// Durable storage contract for applied-migration records.
///
/// Must survive process restarts; the engine never caches its contents
/// across runs.
#[async_trait]
pub trait MigrationLedger: Send + Sync {
    /// Create the backing storage if it does not exist
    async fn ensure_storage(&self) -> MigrationResult<()>;

    /// All recorded entries, ascending by migration id
    async fn applied(&self) -> MigrationResult<Vec<LedgerEntry>>;

    /// Record a fully-applied unit
    async fn record(&self, entry: LedgerEntry) -> MigrationResult<()>;

    /// Remove the record of a fully-reverted unit
    async fn remove(&self, migration_id: &str) -> MigrationResult<()>;
}

/// In-memory ledger for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryLedger {
    entries: Mutex<BTreeMap<String, DateTime<Utc>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MigrationLedger for MemoryLedger {
    async fn ensure_storage(&self) -> MigrationResult<()> {
        Ok(())
    }

    async fn applied(&self) -> MigrationResult<Vec<LedgerEntry>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries
            .iter()
            .map(|(id, at)| LedgerEntry {
                migration_id: id.clone(),
                applied_at: *at,
            })
            .collect())
    }

    async fn record(&self, entry: LedgerEntry) -> MigrationResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(entry.migration_id, entry.applied_at);
        Ok(())
    }

    async fn remove(&self, migration_id: &str) -> MigrationResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(migration_id);
        Ok(())
    }
}
