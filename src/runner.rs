//! Migration Runner - Plans and executes migration runs
//!
//! Reads the ledger, computes the pending or applied delta against the
//! requested target, resolves backend capabilities once, then applies or
//! reverts units in order. Each unit is recorded in the ledger the moment it
//! fully completes, so an interrupted run resumes from the first unfinished
//! unit.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::backends::{DatabaseDriver, FEATURE_TRANSACTIONAL_DDL};
use crate::capability::CapabilitySet;
use crate::error::{MigrationError, MigrationResult};
use crate::executor::StepExecutor;
use crate::ledger::{LedgerEntry, MigrationLedger};
use crate::registry::MigrationRegistry;
use crate::step::Step;
use crate::unit::{MigrationUnit, Reversibility};

/// Hook for a caller-held advisory lock around a run.
///
/// The engine does not implement distributed locking itself; concurrent
/// runners must be prevented by the lock the caller provides here. Acquired
/// before planning begins, released after the run ends, on success and
/// failure alike.
#[async_trait]
pub trait MigrationLock: Send + Sync {
    async fn acquire(&self) -> MigrationResult<()>;
    async fn release(&self) -> MigrationResult<()>;
}

/// Result of running migrations forward
#[derive(Debug)]
pub struct MigrationRunResult {
    /// Number of units that were applied
    pub applied_count: usize,
    /// Ids of units that were applied, in application order
    pub applied_migrations: Vec<String>,
    /// Number of units that were already applied and skipped
    pub skipped_count: usize,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

impl MigrationRunResult {
    /// True when the run had nothing to do (already at target)
    pub fn is_noop(&self) -> bool {
        self.applied_count == 0
    }
}

/// Result of reverting migrations
#[derive(Debug)]
pub struct RollbackResult {
    /// Number of units that were reverted
    pub rolled_back_count: usize,
    /// Ids of units that were reverted, newest first
    pub rolled_back_migrations: Vec<String>,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

impl RollbackResult {
    /// True when the run had nothing to do (already at target)
    pub fn is_noop(&self) -> bool {
        self.rolled_back_count == 0
    }
}

/// Status of one registered unit
#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    pub id: String,
    pub name: String,
    pub applied: bool,
    pub applied_at: Option<DateTime<Utc>>,
}

/// Migration runner that executes registered units against a backend
pub struct MigrationRunner {
    registry: MigrationRegistry,
    driver: Arc<dyn DatabaseDriver>,
    ledger: Arc<dyn MigrationLedger>,
    lock: Option<Arc<dyn MigrationLock>>,
}

impl MigrationRunner {
    pub fn new(
        registry: MigrationRegistry,
        driver: Arc<dyn DatabaseDriver>,
        ledger: Arc<dyn MigrationLedger>,
    ) -> Self {
        Self {
            registry,
            driver,
            ledger,
            lock: None,
        }
    }

    /// Attach a caller-held advisory lock around every run
    pub fn with_lock(mut self, lock: Arc<dyn MigrationLock>) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    /// Apply all pending units in ascending id order, up to and including
    /// `target` when given. Already-applied units are skipped via the ledger;
    /// the first failing unit stops the run and prior units stay recorded.
    ///
    /// Each unit is recorded in the ledger only after its transaction commits,
    /// and the ledger may live on a separate connection. A crash between
    /// commit and record leaves the unit applied but unrecorded, so the next
    /// run replays it. Step pre-checks make that replay a no-op.
    pub async fn run_up(&self, target: Option<&str>) -> MigrationResult<MigrationRunResult> {
        self.acquire_lock().await?;
        let result = self.run_up_inner(target).await;
        self.release_lock().await;
        result
    }

    /// Revert applied units in descending id order, down to and including
    /// `target`. Refuses to pass through an irreversible unit.
    pub async fn run_down(&self, target: &str) -> MigrationResult<RollbackResult> {
        self.acquire_lock().await?;
        let result = self.run_down_inner(target).await;
        self.release_lock().await;
        result
    }

    /// Applied flag and timestamp for every registered unit, ascending by id.
    /// Ledger rows with no registered unit are ignored here; reverting
    /// through one fails instead.
    pub async fn status(&self) -> MigrationResult<Vec<MigrationStatus>> {
        self.ledger.ensure_storage().await?;
        let applied = self.ledger.applied().await?;

        let mut statuses = Vec::with_capacity(self.registry.len());
        for unit in self.registry.units() {
            let entry = applied.iter().find(|e| e.migration_id == unit.id());
            statuses.push(MigrationStatus {
                id: unit.id().to_string(),
                name: unit.name().to_string(),
                applied: entry.is_some(),
                applied_at: entry.map(|e| e.applied_at),
            });
        }
        Ok(statuses)
    }

    async fn run_up_inner(&self, target: Option<&str>) -> MigrationResult<MigrationRunResult> {
        let start_time = Instant::now();

        if let Some(id) = target {
            if self.registry.get(id).is_none() {
                return Err(MigrationError::UnknownMigration(id.to_string()));
            }
        }

        self.ledger.ensure_storage().await?;
        let applied_ids: HashSet<String> = self
            .ledger
            .applied()
            .await?
            .into_iter()
            .map(|e| e.migration_id)
            .collect();

        let mut pending = self.registry.pending(&applied_ids);
        if let Some(id) = target {
            pending.retain(|u| u.id() <= id);
        }

        if pending.is_empty() {
            return Ok(MigrationRunResult {
                applied_count: 0,
                applied_migrations: Vec::new(),
                skipped_count: applied_ids.len(),
                execution_time_ms: start_time.elapsed().as_millis(),
            });
        }

        // Capabilities are resolved once per run and passed into every step
        let caps = CapabilitySet::detect(self.driver.as_ref()).await;
        let transactional = self.driver.supports_feature(FEATURE_TRANSACTIONAL_DDL).await;
        let executor = StepExecutor::new(self.driver.clone());

        let mut applied_migrations = Vec::new();
        for unit in pending {
            tracing::info!(id = unit.id(), name = unit.name(), "applying migration");
            self.execute_unit(unit, unit.up_steps(), &executor, &caps, transactional)
                .await?;
            self.ledger.record(LedgerEntry::now(unit.id())).await?;
            applied_migrations.push(unit.id().to_string());
        }

        Ok(MigrationRunResult {
            applied_count: applied_migrations.len(),
            applied_migrations,
            skipped_count: applied_ids.len(),
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    async fn run_down_inner(&self, target: &str) -> MigrationResult<RollbackResult> {
        let start_time = Instant::now();

        if self.registry.get(target).is_none() {
            return Err(MigrationError::UnknownMigration(target.to_string()));
        }

        self.ledger.ensure_storage().await?;
        let mut to_revert: Vec<String> = self
            .ledger
            .applied()
            .await?
            .into_iter()
            .map(|e| e.migration_id)
            .filter(|id| id.as_str() >= target)
            .collect();
        to_revert.sort();
        to_revert.reverse();

        if to_revert.is_empty() {
            return Ok(RollbackResult {
                rolled_back_count: 0,
                rolled_back_migrations: Vec::new(),
                execution_time_ms: start_time.elapsed().as_millis(),
            });
        }

        let caps = CapabilitySet::detect(self.driver.as_ref()).await;
        let transactional = self.driver.supports_feature(FEATURE_TRANSACTIONAL_DDL).await;
        let executor = StepExecutor::new(self.driver.clone());

        let mut rolled_back_migrations = Vec::new();
        for id in to_revert {
            let unit = self
                .registry
                .get(&id)
                .ok_or_else(|| MigrationError::UnknownMigration(id.clone()))?;

            match unit.reversibility() {
                Reversibility::Irreversible(reason) => {
                    return Err(MigrationError::IrreversibleMigration {
                        unit: id,
                        reason: reason.to_string(),
                    });
                }
                Reversibility::Lossy(note) => {
                    tracing::warn!(id = unit.id(), note, "lossy rollback: destroyed data is not restored");
                }
                Reversibility::Safe => {}
            }

            tracing::info!(id = unit.id(), name = unit.name(), "reverting migration");
            self.execute_unit(unit, unit.down_steps(), &executor, &caps, transactional)
                .await?;
            self.ledger.remove(unit.id()).await?;
            rolled_back_migrations.push(id);
        }

        Ok(RollbackResult {
            rolled_back_count: rolled_back_migrations.len(),
            rolled_back_migrations,
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    /// Run one unit's steps, wrapped in a transaction where the backend
    /// supports transactional DDL. Without that support, steps run
    /// sequentially and the per-unit ledger granularity bounds the blast
    /// radius of a partial failure.
    ///
    /// The ledger is written by the caller after this returns, outside the
    /// unit's transaction. Idempotent steps cover the window where a unit has
    /// committed but its ledger row was never written.
    async fn execute_unit(
        &self,
        unit: &MigrationUnit,
        steps: &[Step],
        executor: &StepExecutor,
        caps: &CapabilitySet,
        transactional: bool,
    ) -> MigrationResult<()> {
        if transactional {
            self.driver.execute("BEGIN").await?;
        }

        for step in steps {
            if let Err(err) = executor.apply(step, caps).await {
                if transactional {
                    if let Err(rollback_err) = self.driver.execute("ROLLBACK").await {
                        tracing::warn!(error = %rollback_err, "failed to roll back unit transaction");
                    }
                }
                return Err(match err {
                    MigrationError::CapabilityMismatch { step, feature, .. } => {
                        MigrationError::CapabilityMismatch {
                            unit: Some(unit.id().to_string()),
                            step,
                            feature,
                        }
                    }
                    other => MigrationError::StepExecution {
                        unit: unit.id().to_string(),
                        step: step.describe(),
                        cause: other.to_string(),
                    },
                });
            }
        }

        if transactional {
            self.driver.execute("COMMIT").await?;
        }
        Ok(())
    }

    async fn acquire_lock(&self) -> MigrationResult<()> {
        if let Some(lock) = &self.lock {
            lock.acquire().await?;
        }
        Ok(())
    }

    async fn release_lock(&self) {
        if let Some(lock) = &self.lock {
            if let Err(err) = lock.release().await {
                tracing::warn!(error = %err, "failed to release migration lock");
            }
        }
    }
}
