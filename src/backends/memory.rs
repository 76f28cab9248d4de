//! In-memory driver
//!
//! Keeps a column catalog and a statement log instead of a real database.
//! It understands exactly the ALTER TABLE shapes the engine emits, which is
//! enough to exercise idempotence, capability branching, and revert
//! round-trips without a live backend.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{BackendKind, DatabaseDriver, FEATURE_BINARY_JSON, FEATURE_TRANSACTIONAL_DDL};
use crate::error::{MigrationError, MigrationResult};

#[derive(Debug, Clone)]
struct MemoryColumn {
    name: String,
    sql_type: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: HashMap<String, Vec<MemoryColumn>>,
    log: Vec<String>,
    fail_on: Option<String>,
}

/// Backend driver over an in-memory schema catalog
pub struct MemoryDriver {
    name: String,
    features: HashSet<&'static str>,
    state: Mutex<MemoryState>,
}

impl MemoryDriver {
    /// Create a driver emulating the feature profile of the given backend kind
    pub fn new(kind: BackendKind) -> Self {
        let features: HashSet<&'static str> = match kind {
            BackendKind::PostgreSQL => {
                [FEATURE_BINARY_JSON, FEATURE_TRANSACTIONAL_DDL].into_iter().collect()
            }
            BackendKind::SQLite => [FEATURE_TRANSACTIONAL_DDL].into_iter().collect(),
            BackendKind::MySQL => HashSet::new(),
        };
        Self {
            name: kind.to_string(),
            features,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Pre-populate a column, as if created by an earlier deployment
    pub fn seed_column(&self, table: &str, column: &str, sql_type: &str) {
        let mut state = self.lock();
        state.tables.entry(table.to_string()).or_default().push(MemoryColumn {
            name: column.to_string(),
            sql_type: sql_type.to_string(),
        });
    }

    /// Every statement executed so far, in order
    pub fn statements(&self) -> Vec<String> {
        self.lock().log.clone()
    }

    /// The recorded SQL type of a column, if the column exists
    pub fn column_type(&self, table: &str, column: &str) -> Option<String> {
        let state = self.lock();
        state
            .tables
            .get(table)?
            .iter()
            .find(|c| c.name == column)
            .map(|c| c.sql_type.clone())
    }

    /// Column names currently present on a table
    pub fn columns(&self, table: &str) -> Vec<String> {
        let state = self.lock();
        state
            .tables
            .get(table)
            .map(|cols| cols.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Make every statement containing `needle` fail until cleared
    pub fn fail_when(&self, needle: &str) {
        self.lock().fail_on = Some(needle.to_string());
    }

    pub fn clear_failure(&self) {
        self.lock().fail_on = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn interpret(state: &mut MemoryState, sql: &str) {
        let tokens: Vec<&str> = sql.split_whitespace().collect();
        match tokens.as_slice() {
            ["ALTER", "TABLE", table, "ADD", "COLUMN", column, sql_type, ..] => {
                let columns = state.tables.entry(table.to_string()).or_default();
                if !columns.iter().any(|c| c.name == *column) {
                    columns.push(MemoryColumn {
                        name: column.to_string(),
                        sql_type: sql_type.to_string(),
                    });
                }
            }
            ["ALTER", "TABLE", table, "DROP", "COLUMN", column] => {
                if let Some(columns) = state.tables.get_mut(*table) {
                    columns.retain(|c| c.name != *column);
                }
            }
            ["ALTER", "TABLE", table, "ALTER", "COLUMN", column, "TYPE", sql_type, ..] => {
                if let Some(existing) = state
                    .tables
                    .get_mut(*table)
                    .and_then(|cols| cols.iter_mut().find(|c| c.name == *column))
                {
                    existing.sql_type = sql_type.to_string();
                }
            }
            // DELETE, BEGIN, COMMIT, ROLLBACK leave the catalog untouched
            _ => {}
        }
    }
}

#[async_trait]
impl DatabaseDriver for MemoryDriver {
    fn backend_name(&self) -> &str {
        &self.name
    }

    async fn supports_feature(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }

    async fn column_exists(&self, table: &str, column: &str) -> MigrationResult<bool> {
        let state = self.lock();
        Ok(state
            .tables
            .get(table)
            .map(|cols| cols.iter().any(|c| c.name == column))
            .unwrap_or(false))
    }

    async fn execute(&self, sql: &str) -> MigrationResult<u64> {
        let mut state = self.lock();
        if let Some(needle) = &state.fail_on {
            if sql.contains(needle.as_str()) {
                return Err(MigrationError::Database(format!(
                    "injected failure while executing: {}",
                    sql
                )));
            }
        }
        state.log.push(sql.to_string());
        Self::interpret(&mut state, sql);
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn catalog_tracks_add_and_drop() {
        let driver = MemoryDriver::new(BackendKind::PostgreSQL);
        driver
            .execute("ALTER TABLE users ADD COLUMN email TEXT")
            .await
            .unwrap();
        assert!(driver.column_exists("users", "email").await.unwrap());
        assert_eq!(driver.column_type("users", "email").as_deref(), Some("TEXT"));

        driver
            .execute("ALTER TABLE users DROP COLUMN email")
            .await
            .unwrap();
        assert!(!driver.column_exists("users", "email").await.unwrap());
    }

    #[tokio::test]
    async fn alter_column_type_updates_catalog() {
        let driver = MemoryDriver::new(BackendKind::PostgreSQL);
        driver.seed_column("orders", "meta", "JSON");
        driver
            .execute("ALTER TABLE orders ALTER COLUMN meta TYPE JSONB USING meta::jsonb")
            .await
            .unwrap();
        assert_eq!(driver.column_type("orders", "meta").as_deref(), Some("JSONB"));
    }

    #[tokio::test]
    async fn injected_failure_leaves_no_log_entry() {
        let driver = MemoryDriver::new(BackendKind::PostgreSQL);
        driver.fail_when("DROP COLUMN");
        let err = driver
            .execute("ALTER TABLE users DROP COLUMN email")
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::Database(_)));
        assert!(driver.statements().is_empty());

        driver.clear_failure();
        driver
            .execute("ALTER TABLE users ADD COLUMN email TEXT")
            .await
            .unwrap();
        assert_eq!(driver.statements().len(), 1);
    }
}
