//! Migration Unit - One named, versioned, reversible schema/data change
//!
//! A unit carries an ordered `up` step list, an ordered `down` step list, and
//! a declared [`Reversibility`]. Units are built fluently, validated at
//! registration time, and immutable afterwards.

use crate::error::{MigrationError, MigrationResult};
use crate::step::Step;

/// How safely a unit's `down` steps undo its `up` steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reversibility {
    /// `down` restores the exact observable schema and data
    Safe,
    /// `down` restores the schema but destroyed data stays destroyed;
    /// the note documents what is lost
    Lossy(&'static str),
    /// No safe inverse exists; `down` is refused
    Irreversible(&'static str),
}

/// A single named, versioned, reversible change description
#[derive(Debug, Clone)]
pub struct MigrationUnit {
    id: String,
    name: String,
    up: Vec<Step>,
    down: Vec<Step>,
    reversibility: Reversibility,
}

impl MigrationUnit {
    /// Start building a unit. `id` must be globally unique and sortable;
    /// ordering by id defines application order.
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            up: Vec::new(),
            down: Vec::new(),
            reversibility: Reversibility::Safe,
        }
    }

    /// Append a step to the `up` sequence
    pub fn up(mut self, step: Step) -> Self {
        self.up.push(step);
        self
    }

    /// Append a step to the `down` sequence
    pub fn down(mut self, step: Step) -> Self {
        self.down.push(step);
        self
    }

    /// Append a step to `up` and its derived inverse to the front of `down`,
    /// keeping the revert order mirrored. A step with no safe inverse marks
    /// the whole unit lossy instead.
    pub fn reversible(mut self, step: Step) -> Self {
        match step.inverse() {
            Some(inverse) => self.down.insert(0, inverse),
            None => {
                if self.reversibility == Reversibility::Safe {
                    self.reversibility =
                        Reversibility::Lossy("contains a step with no safe inverse");
                }
            }
        }
        self.up.push(step);
        self
    }

    /// Declare the revert structurally possible but data-lossy
    pub fn lossy(mut self, note: &'static str) -> Self {
        self.reversibility = Reversibility::Lossy(note);
        self
    }

    /// Declare the unit irreversible; it must carry no `down` steps
    pub fn irreversible(mut self, reason: &'static str) -> Self {
        self.reversibility = Reversibility::Irreversible(reason);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn up_steps(&self) -> &[Step] {
        &self.up
    }

    pub fn down_steps(&self) -> &[Step] {
        &self.down
    }

    pub fn reversibility(&self) -> Reversibility {
        self.reversibility
    }

    /// Validate structural invariants. Called once at registration; failures
    /// are fatal at build time, never at run time.
    ///
    /// - within `up`, row deletion on a table must precede any column drop on
    ///   that table, so destructive drops never orphan matching rows;
    /// - an irreversible unit must not pretend to have `down` steps.
    pub fn validate(&self) -> MigrationResult<()> {
        let mut dropped_tables: Vec<&str> = Vec::new();
        for step in &self.up {
            match step {
                Step::DropColumn { table, .. } => dropped_tables.push(table),
                Step::BulkDelete { table, .. } => {
                    if dropped_tables.contains(&table.as_str()) {
                        return Err(MigrationError::InvalidUnit {
                            unit: self.id.clone(),
                            reason: format!(
                                "bulk delete on '{}' must run before the column drop on the same table",
                                table
                            ),
                        });
                    }
                }
                _ => {}
            }
        }

        if matches!(self.reversibility, Reversibility::Irreversible(_)) && !self.down.is_empty() {
            return Err(MigrationError::InvalidUnit {
                unit: self.id.clone(),
                reason: "irreversible unit must not define down steps".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::ColumnType;

    #[test]
    fn bulk_delete_after_drop_column_is_rejected() {
        let unit = MigrationUnit::new("20250526105167", "remove archived user addresses")
            .up(Step::drop_column("spree_user_addresses", "archived"))
            .up(Step::bulk_delete("spree_user_addresses", "archived = TRUE"));

        let err = unit.validate().unwrap_err();
        assert!(matches!(err, MigrationError::InvalidUnit { .. }));
    }

    #[test]
    fn bulk_delete_before_drop_column_is_valid() {
        let unit = MigrationUnit::new("20250526105167", "remove archived user addresses")
            .up(Step::bulk_delete("spree_user_addresses", "archived = TRUE"))
            .up(Step::drop_column("spree_user_addresses", "archived"))
            .lossy("deleted rows are not restored on revert");

        assert!(unit.validate().is_ok());
    }

    #[test]
    fn irreversible_unit_with_down_steps_is_rejected() {
        let unit = MigrationUnit::new("1", "drop legacy table column")
            .up(Step::drop_column("legacy", "blob"))
            .down(Step::add_column("legacy", "blob", ColumnType::Text))
            .irreversible("original column contents cannot be reconstructed");

        assert!(unit.validate().is_err());
    }

    #[test]
    fn reversible_builder_mirrors_step_order() {
        let unit = MigrationUnit::new("2", "metadata columns")
            .reversible(Step::add_column("t", "a", ColumnType::Document))
            .reversible(Step::add_column("t", "b", ColumnType::Document));

        assert_eq!(unit.up_steps().len(), 2);
        // down drops b first, then a
        assert_eq!(unit.down_steps()[0], Step::drop_column("t", "b"));
        assert_eq!(unit.down_steps()[1], Step::drop_column("t", "a"));
        assert_eq!(unit.reversibility(), Reversibility::Safe);
    }

    #[test]
    fn reversible_builder_flags_lossy_steps() {
        let unit = MigrationUnit::new("3", "purge rows")
            .reversible(Step::bulk_delete("t", "stale = TRUE"));

        assert!(matches!(unit.reversibility(), Reversibility::Lossy(_)));
        assert!(unit.down_steps().is_empty());
    }
}
