use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::database::models::EntityType;
use crate::error::SyncError;
use crate::remote::types::Operation;

/// Which CRUD operations the remote admin API supports for one entity
/// type. Fields default to unsupported so partial overrides fail closed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CapabilitySet {
    #[serde(default)]
    pub list: bool,
    #[serde(default)]
    pub get: bool,
    #[serde(default)]
    pub create: bool,
    #[serde(default)]
    pub update: bool,
    #[serde(default)]
    pub delete: bool,
}

impl CapabilitySet {
    pub fn allows(&self, operation: Operation) -> bool {
        match operation {
            Operation::List => self.list,
            Operation::Get => self.get,
            Operation::Create => self.create,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }
}

/// Per-entity-type support matrix for the remote admin API.
///
/// The defaults encode behavior observed by probing a live deployment:
/// zones support bulk listing but answer 405 to GET/PUT on an individual
/// id, users allow the full item lifecycle, and the templates endpoint
/// does not exist. The matrix is configuration, not a constant, so it can
/// be corrected against the live API without a rebuild.
#[derive(Debug, Clone)]
pub struct CapabilityTable {
    entries: HashMap<EntityType, CapabilitySet>,
}

impl Default for CapabilityTable {
    fn default() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            EntityType::Domain,
            CapabilitySet {
                list: true,
                get: false,
                create: true,
                update: false,
                delete: true,
            },
        );
        entries.insert(
            EntityType::User,
            CapabilitySet {
                list: true,
                get: false,
                create: true,
                update: true,
                delete: true,
            },
        );
        entries.insert(
            EntityType::ApiKey,
            CapabilitySet {
                list: true,
                get: false,
                create: true,
                update: false,
                delete: true,
            },
        );
        entries.insert(
            EntityType::Account,
            CapabilitySet {
                list: true,
                get: true,
                create: true,
                update: true,
                delete: true,
            },
        );
        entries.insert(EntityType::Template, CapabilitySet::default());
        Self { entries }
    }
}

impl CapabilityTable {
    /// Built-in matrix with per-entity-type corrections applied on top.
    pub fn with_overrides(overrides: &HashMap<EntityType, CapabilitySet>) -> Self {
        let mut table = Self::default();
        for (entity, set) in overrides {
            table.entries.insert(*entity, *set);
        }
        table
    }

    /// Unknown entity types fail closed.
    pub fn allows(&self, entity: EntityType, operation: Operation) -> bool {
        self.entries
            .get(&entity)
            .map(|set| set.allows(operation))
            .unwrap_or(false)
    }

    pub fn ensure(&self, entity: EntityType, operation: Operation) -> Result<(), SyncError> {
        if self.allows(entity, operation) {
            Ok(())
        } else {
            Err(SyncError::CapabilityUnsupported { entity, operation })
        }
    }

    /// Entity types a sync pass can actually pull from the remote API.
    pub fn listable(&self) -> Vec<EntityType> {
        EntityType::ALL
            .into_iter()
            .filter(|entity| self.allows(*entity, Operation::List))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observed_matrix_defaults() {
        let table = CapabilityTable::default();

        assert!(table.allows(EntityType::Domain, Operation::List));
        assert!(!table.allows(EntityType::Domain, Operation::Update));
        assert!(table.allows(EntityType::User, Operation::Update));
        assert!(!table.allows(EntityType::Template, Operation::List));
    }

    #[test]
    fn test_overrides_replace_entries() {
        let mut overrides = HashMap::new();
        overrides.insert(
            EntityType::Domain,
            CapabilitySet {
                list: true,
                get: true,
                create: true,
                update: true,
                delete: true,
            },
        );
        let table = CapabilityTable::with_overrides(&overrides);

        assert!(table.allows(EntityType::Domain, Operation::Update));
        // Untouched entries keep their defaults
        assert!(!table.allows(EntityType::ApiKey, Operation::Update));
    }

    #[test]
    fn test_ensure_reports_unsupported_pairs() {
        let table = CapabilityTable::default();
        let err = table
            .ensure(EntityType::Template, Operation::List)
            .unwrap_err();
        assert!(matches!(err, SyncError::CapabilityUnsupported { .. }));
    }

    #[test]
    fn test_listable_excludes_template() {
        let table = CapabilityTable::default();
        let listable = table.listable();

        assert_eq!(listable.len(), 4);
        assert!(!listable.contains(&EntityType::Template));
    }
}
