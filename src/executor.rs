//! Step Executor - Applies one step against the live schema
//!
//! Dispatches on the resolved [`CapabilitySet`] where a step has
//! backend-conditional behavior, keeps column steps idempotent via schema
//! introspection, and reports degraded no-ops instead of swallowing them.

use std::sync::Arc;

use crate::backends::DatabaseDriver;
use crate::capability::CapabilitySet;
use crate::error::{MigrationError, MigrationResult};
use crate::step::Step;

/// Outcome of applying one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step's statement was executed
    Applied,
    /// The step was a no-op on this backend; the reason is also logged
    Skipped(String),
}

/// Executes single steps through the backend driver
pub struct StepExecutor {
    driver: Arc<dyn DatabaseDriver>,
}

impl StepExecutor {
    pub fn new(driver: Arc<dyn DatabaseDriver>) -> Self {
        Self { driver }
    }

    /// Apply one step with the current backend capabilities.
    ///
    /// - `AddColumn` / `DropColumn` are idempotent: an already-present or
    ///   already-absent column is a reported no-op, not an error.
    /// - A JSON type conversion on a backend with no distinct binary JSON
    ///   type degrades to a reported no-op.
    /// - A step demanding an absent feature with no fallback fails with
    ///   [`MigrationError::CapabilityMismatch`].
    pub async fn apply(&self, step: &Step, caps: &CapabilitySet) -> MigrationResult<StepOutcome> {
        if let Some(feature) = step.required_feature() {
            if !self.driver.supports_feature(feature).await {
                return Err(MigrationError::CapabilityMismatch {
                    unit: None,
                    step: step.describe(),
                    feature: feature.to_string(),
                });
            }
        }

        match step {
            Step::AddColumn { table, column, .. } => {
                if self.driver.column_exists(table, column).await? {
                    return Ok(self.skip(step, "column already exists"));
                }
            }
            Step::DropColumn { table, column } => {
                if !self.driver.column_exists(table, column).await? {
                    return Ok(self.skip(step, "column does not exist"));
                }
            }
            _ => {}
        }

        let Some(sql) = step.to_sql(caps) else {
            return Ok(self.skip(
                step,
                &format!("no distinct storage type on {}", caps.backend_name),
            ));
        };

        self.driver.execute(&sql).await?;
        Ok(StepOutcome::Applied)
    }

    fn skip(&self, step: &Step, reason: &str) -> StepOutcome {
        tracing::warn!(step = %step.describe(), reason, "step skipped");
        StepOutcome::Skipped(reason.to_string())
    }
}
