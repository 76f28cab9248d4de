//! PostgreSQL Backend Implementation
//!
//! Provides the PostgreSQL driver and ledger using sqlx. The driver holds a
//! single dedicated connection so BEGIN/COMMIT issued by the runner wrap the
//! same session that executes the unit's statements (single-writer model).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Connection, PgConnection, PgPool, Row};
use tokio::sync::Mutex;

use super::{DatabaseDriver, FEATURE_BINARY_JSON, FEATURE_TRANSACTIONAL_DDL};
use crate::error::{MigrationError, MigrationResult};
use crate::ledger::{LedgerEntry, MigrationConfig, MigrationLedger};

/// PostgreSQL driver over one dedicated connection
pub struct PostgresDriver {
    conn: Mutex<PgConnection>,
}

impl PostgresDriver {
    /// Connect to the database
    pub async fn connect(database_url: &str) -> MigrationResult<Self> {
        let conn = PgConnection::connect(database_url).await.map_err(|e| {
            MigrationError::Database(format!("Failed to connect to database: {}", e))
        })?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl DatabaseDriver for PostgresDriver {
    fn backend_name(&self) -> &str {
        "PostgreSQL"
    }

    async fn supports_feature(&self, feature: &str) -> bool {
        match feature {
            // DDL participates in transactions on PostgreSQL
            FEATURE_TRANSACTIONAL_DDL => true,
            FEATURE_BINARY_JSON => {
                let mut conn = self.conn.lock().await;
                sqlx::query("SELECT 1 FROM pg_type WHERE typname = 'jsonb'")
                    .fetch_optional(&mut *conn)
                    .await
                    .map(|row| row.is_some())
                    .unwrap_or(false)
            }
            _ => false,
        }
    }

    async fn column_exists(&self, table: &str, column: &str) -> MigrationResult<bool> {
        let mut conn = self.conn.lock().await;
        let row = sqlx::query(
            "SELECT 1 FROM information_schema.columns WHERE table_name = $1 AND column_name = $2",
        )
        .bind(table)
        .bind(column)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| MigrationError::Database(format!("Failed to inspect schema: {}", e)))?;
        Ok(row.is_some())
    }

    async fn execute(&self, sql: &str) -> MigrationResult<u64> {
        let mut conn = self.conn.lock().await;
        let result = sqlx::query(sql)
            .execute(&mut *conn)
            .await
            .map_err(|e| MigrationError::Database(format!("Failed to execute statement: {}", e)))?;
        Ok(result.rows_affected())
    }
}

/// Ledger persisted in a PostgreSQL table
pub struct PostgresLedger {
    pool: PgPool,
    config: MigrationConfig,
}

impl PostgresLedger {
    pub fn new(pool: PgPool, config: MigrationConfig) -> Self {
        Self { pool, config }
    }

    /// Create a ledger from a database URL with the default configuration
    pub async fn from_url(database_url: &str) -> MigrationResult<Self> {
        let pool = PgPool::connect(database_url).await.map_err(|e| {
            MigrationError::Ledger(format!("Failed to connect to database: {}", e))
        })?;
        Ok(Self::new(pool, MigrationConfig::default()))
    }
}

#[async_trait]
impl MigrationLedger for PostgresLedger {
    async fn ensure_storage(&self) -> MigrationResult<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                id VARCHAR(255) PRIMARY KEY,\n    \
                applied_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP\n\
            )",
            self.config.ledger_table
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| MigrationError::Ledger(format!("Failed to create ledger table: {}", e)))?;
        Ok(())
    }

    async fn applied(&self) -> MigrationResult<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT id, applied_at FROM {} ORDER BY id ASC",
            self.config.ledger_table
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrationError::Ledger(format!("Failed to query ledger: {}", e)))?;

        let mut entries = Vec::new();
        for row in rows {
            let migration_id: String = row
                .try_get("id")
                .map_err(|e| MigrationError::Ledger(format!("Failed to read ledger id: {}", e)))?;
            let applied_at: DateTime<Utc> = row.try_get("applied_at").map_err(|e| {
                MigrationError::Ledger(format!("Failed to read ledger timestamp: {}", e))
            })?;
            entries.push(LedgerEntry {
                migration_id,
                applied_at,
            });
        }
        Ok(entries)
    }

    async fn record(&self, entry: LedgerEntry) -> MigrationResult<()> {
        let sql = format!(
            "INSERT INTO {} (id, applied_at) VALUES ($1, $2)",
            self.config.ledger_table
        );
        sqlx::query(&sql)
            .bind(&entry.migration_id)
            .bind(entry.applied_at)
            .execute(&self.pool)
            .await
            .map_err(|e| MigrationError::Ledger(format!("Failed to record migration: {}", e)))?;
        Ok(())
    }

    async fn remove(&self, migration_id: &str) -> MigrationResult<()> {
        let sql = format!("DELETE FROM {} WHERE id = $1", self.config.ledger_table);
        sqlx::query(&sql)
            .bind(migration_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                MigrationError::Ledger(format!("Failed to remove migration record: {}", e))
            })?;
        Ok(())
    }
}
