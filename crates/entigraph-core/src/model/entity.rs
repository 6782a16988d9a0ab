use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value::Value;

/// Stable identity of an entity (UUID v7)
///
/// Survives modification, materialization and forking. Only a merge
/// allocates new ids, for entities the source side added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored record: identity, concrete runtime type, primitive fields and
/// reference collections
///
/// Entities are only created and changed through a `Builder`; once stored they
/// are shared immutably between every snapshot that contains them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub(crate) id: EntityId,
    pub(crate) entity_type: String,
    pub(crate) fields: BTreeMap<String, Value>,
    /// Empty collections are never stored
    pub(crate) references: BTreeMap<String, Vec<EntityId>>,
}

impl Entity {
    pub(crate) fn new(
        id: EntityId,
        entity_type: impl Into<String>,
        fields: BTreeMap<String, Value>,
        mut references: BTreeMap<String, Vec<EntityId>>,
    ) -> Self {
        references.retain(|_, targets| !targets.is_empty());
        Self {
            id,
            entity_type: entity_type.into(),
            fields,
            references,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Concrete runtime type name
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Convenience for string fields
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Targets of a reference field in order; empty when unset
    pub fn references(&self, field: &str) -> &[EntityId] {
        self.references.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn reference_fields(&self) -> &BTreeMap<String, Vec<EntityId>> {
        &self.references
    }

    /// Every outgoing edge as `(field, target)`
    pub fn outgoing(&self) -> impl Iterator<Item = (&str, EntityId)> + '_ {
        self.references
            .iter()
            .flat_map(|(field, targets)| targets.iter().map(move |t| (field.as_str(), *t)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_drops_empty_reference_collections() {
        let child = EntityId::new();
        let mut refs = BTreeMap::new();
        refs.insert("children".to_string(), vec![child]);
        refs.insert("peers".to_string(), Vec::new());

        let entity = Entity::new(EntityId::new(), "Left", BTreeMap::new(), refs);

        assert_eq!(entity.references("children"), &[child]);
        assert!(entity.references("peers").is_empty());
        assert_eq!(entity.reference_fields().len(), 1);
    }

    #[test]
    fn test_outgoing_lists_every_edge() {
        let (a, b) = (EntityId::new(), EntityId::new());
        let mut refs = BTreeMap::new();
        refs.insert("children".to_string(), vec![a, b]);
        let entity = Entity::new(EntityId::new(), "Left", BTreeMap::new(), refs);

        let edges: Vec<_> = entity.outgoing().collect();
        assert_eq!(edges, vec![("children", a), ("children", b)]);
    }

    #[test]
    fn test_entity_ids_are_unique() {
        assert_ne!(EntityId::new(), EntityId::new());
    }
}
