//! Migration Registry - Ordered, append-only set of known migration units
//!
//! Registration rejects duplicate ids and structurally invalid units at build
//! time. The registry exposes the pending and applied views the runner plans
//! against.

use std::collections::HashSet;

use crate::error::{MigrationError, MigrationResult};
use crate::unit::MigrationUnit;

/// Append-only registry of migration units, kept sorted ascending by id
#[derive(Debug, Default)]
pub struct MigrationRegistry {
    units: Vec<MigrationUnit>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self { units: Vec::new() }
    }

    /// Register a unit. Fails fast on duplicate ids and invalid units;
    /// registration order does not matter, application order is id order.
    pub fn register(&mut self, unit: MigrationUnit) -> MigrationResult<()> {
        unit.validate()?;
        match self.units.binary_search_by(|u| u.id().cmp(unit.id())) {
            Ok(_) => Err(MigrationError::DuplicateMigrationId(unit.id().to_string())),
            Err(position) => {
                self.units.insert(position, unit);
                Ok(())
            }
        }
    }

    /// Look up a unit by id
    pub fn get(&self, id: &str) -> Option<&MigrationUnit> {
        self.units
            .binary_search_by(|u| u.id().cmp(id))
            .ok()
            .map(|i| &self.units[i])
    }

    /// All registered units, ascending by id
    pub fn units(&self) -> &[MigrationUnit] {
        &self.units
    }

    /// Registered units not yet applied, ascending by id
    pub fn pending(&self, applied: &HashSet<String>) -> Vec<&MigrationUnit> {
        self.units
            .iter()
            .filter(|u| !applied.contains(u.id()))
            .collect()
    }

    /// Applied units, descending by id (revert order)
    pub fn applied_descending(&self, applied: &HashSet<String>) -> Vec<&MigrationUnit> {
        self.units
            .iter()
            .rev()
            .filter(|u| applied.contains(u.id()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{ColumnType, Step};

    fn unit(id: &str) -> MigrationUnit {
        MigrationUnit::new(id, "test unit")
            .reversible(Step::add_column("t", "c", ColumnType::Text))
    }

    #[test]
    fn pending_is_ordered_regardless_of_registration_order() {
        let mut registry = MigrationRegistry::new();
        for id in ["30", "10", "20"] {
            registry.register(unit(id)).unwrap();
        }

        let pending = registry.pending(&HashSet::new());
        let ids: Vec<&str> = pending.iter().map(|u| u.id()).collect();
        assert_eq!(ids, vec!["10", "20", "30"]);
    }

    #[test]
    fn duplicate_id_is_rejected_at_registration() {
        let mut registry = MigrationRegistry::new();
        registry.register(unit("10")).unwrap();

        let err = registry.register(unit("10")).unwrap_err();
        assert!(matches!(err, MigrationError::DuplicateMigrationId(id) if id == "10"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn pending_excludes_applied_ids() {
        let mut registry = MigrationRegistry::new();
        for id in ["10", "20", "30"] {
            registry.register(unit(id)).unwrap();
        }

        let applied: HashSet<String> = ["10", "30"].iter().map(|s| s.to_string()).collect();
        let ids: Vec<&str> = registry.pending(&applied).iter().map(|u| u.id()).collect();
        assert_eq!(ids, vec!["20"]);
    }

    #[test]
    fn applied_descending_reverses_id_order() {
        let mut registry = MigrationRegistry::new();
        for id in ["10", "20", "30"] {
            registry.register(unit(id)).unwrap();
        }

        let applied: HashSet<String> = ["10", "20"].iter().map(|s| s.to_string()).collect();
        let ids: Vec<&str> = registry
            .applied_descending(&applied)
            .iter()
            .map(|u| u.id())
            .collect();
        assert_eq!(ids, vec!["20", "10"]);
    }

    #[test]
    fn invalid_unit_is_rejected_at_registration() {
        let mut registry = MigrationRegistry::new();
        let bad = MigrationUnit::new("10", "bad ordering")
            .up(Step::drop_column("t", "archived"))
            .up(Step::bulk_delete("t", "archived = TRUE"));

        assert!(registry.register(bad).is_err());
        assert!(registry.is_empty());
    }
}
