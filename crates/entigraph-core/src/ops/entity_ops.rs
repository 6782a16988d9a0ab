//! Entity CRUD against a working snapshot
//!
//! Each function validates completely before touching `state`, so a failed
//! call leaves it exactly as it was.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::errors::{GraphError, Result};
use crate::model::{Entity, EntityId, ReferenceDef, Value};
use crate::store::Snapshot;

/// Insert a new entity under a caller-chosen id
///
/// # Errors
///
/// Returns any schema violation from `Schema::check_shape`, `DanglingReference`
/// if a target does not exist, or `ReferenceTargetMismatch` if a target has
/// the wrong type.
pub fn add_entity(
    state: &mut Snapshot,
    id: EntityId,
    entity_type: &str,
    fields: BTreeMap<String, Value>,
    references: BTreeMap<String, Vec<EntityId>>,
) -> Result<()> {
    let schema = Arc::clone(state.schema());
    schema.check_shape(entity_type, &fields, &references)?;

    if state.contains(id) {
        return Err(GraphError::Internal {
            message: format!("entity id {} is already in use", id),
        });
    }

    for (field, targets) in &references {
        let def = schema.check_reference(entity_type, field, targets)?;
        check_targets(state, id, def, targets)?;
    }

    state.insert_new(Entity::new(id, entity_type, fields, references));
    Ok(())
}

/// Apply field and reference deltas to an existing entity
///
/// Untouched fields and references keep their current values. A `None` field
/// delta clears an optional field.
///
/// # Errors
///
/// Returns `EntityNotFound` if the entity does not exist, `MissingField` when
/// clearing a required field, and the same validation errors as [`add_entity`].
pub fn modify_entity(
    state: &mut Snapshot,
    id: EntityId,
    fields: &BTreeMap<String, Option<Value>>,
    references: &BTreeMap<String, Vec<EntityId>>,
) -> Result<()> {
    let current = Arc::clone(state.resolve_reference(id)?);
    let schema = Arc::clone(state.schema());
    let type_name = current.entity_type();

    let mut next_fields = current.fields.clone();
    for (name, value) in fields {
        match value {
            Some(value) => {
                schema.check_field(type_name, name, value)?;
                next_fields.insert(name.clone(), value.clone());
            }
            None => {
                let def = schema.field_def(type_name, name).ok_or_else(|| {
                    GraphError::UnknownField {
                        type_name: type_name.to_string(),
                        field: name.clone(),
                    }
                })?;
                if def.required {
                    return Err(GraphError::MissingField {
                        type_name: type_name.to_string(),
                        field: name.clone(),
                    });
                }
                next_fields.remove(name);
            }
        }
    }

    let mut next_references = current.references.clone();
    for (name, targets) in references {
        let def = schema.check_reference(type_name, name, targets)?;
        check_targets(state, id, def, targets)?;
        next_references.insert(name.clone(), targets.clone());
    }

    state.replace(Entity::new(id, type_name, next_fields, next_references))?;
    Ok(())
}

/// Remove an entity
///
/// Without `cascade`, removal is refused while any other entity still refers
/// to the target. With `cascade`, the target is first dropped from every
/// referring collection. Self-references never block removal.
///
/// # Errors
///
/// Returns `EntityNotFound` if the entity does not exist, or `ReferencedEntity`
/// if it is still referenced and `cascade` is false.
pub fn remove_entity(state: &mut Snapshot, id: EntityId, cascade: bool) -> Result<Arc<Entity>> {
    state.resolve_reference(id)?;

    let referrers: Vec<_> = state
        .referrers(id)
        .filter(|back_ref| back_ref.source != id)
        .cloned()
        .collect();

    if let Some(first) = referrers.first() {
        if !cascade {
            return Err(GraphError::ReferencedEntity {
                entity_id: id.to_string(),
                referrer_id: first.source.to_string(),
                field: first.field.clone(),
            });
        }
    }

    let sources: BTreeSet<EntityId> = referrers.iter().map(|back_ref| back_ref.source).collect();
    for source in sources {
        let holder = Arc::clone(state.resolve_reference(source)?);
        let mut references = holder.references.clone();
        for targets in references.values_mut() {
            targets.retain(|target| *target != id);
        }
        state.replace(Entity::new(
            source,
            holder.entity_type(),
            holder.fields.clone(),
            references,
        ))?;
    }

    state.remove(id)
}

fn check_targets(
    state: &Snapshot,
    source: EntityId,
    def: &ReferenceDef,
    targets: &[EntityId],
) -> Result<()> {
    for target in targets {
        let entity =
            state
                .resolve_reference(*target)
                .map_err(|_| GraphError::DanglingReference {
                    entity_id: source.to_string(),
                    field: def.name.clone(),
                    target_id: target.to_string(),
                })?;

        if !state.schema().is_subtype(entity.entity_type(), &def.target) {
            return Err(GraphError::ReferenceTargetMismatch {
                field: def.name.clone(),
                target_id: target.to_string(),
                expected: def.target.clone(),
                actual: entity.entity_type().to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cardinality, EntityType, FieldKind, Schema};

    fn state() -> Snapshot {
        let schema = Schema::new()
            .with_type(EntityType::abstract_type("Node"))
            .unwrap()
            .with_type(
                EntityType::concrete("Dir")
                    .extends("Node")
                    .children("entries", "Node")
                    .reference("owner", Cardinality::One, "User"),
            )
            .unwrap();
        let schema = schema
            .with_type(
                EntityType::concrete("Doc")
                    .extends("Node")
                    .field("title", FieldKind::String)
                    .optional_field("pages", FieldKind::Int),
            )
            .unwrap()
            .with_type(EntityType::concrete("User"))
            .unwrap();
        Snapshot::empty(Arc::new(schema))
    }

    fn doc(state: &mut Snapshot, title: &str) -> EntityId {
        let id = EntityId::new();
        add_entity(
            state,
            id,
            "Doc",
            BTreeMap::from([("title".to_string(), title.into())]),
            BTreeMap::new(),
        )
        .unwrap();
        id
    }

    fn dir(state: &mut Snapshot, entries: Vec<EntityId>) -> EntityId {
        let id = EntityId::new();
        add_entity(
            state,
            id,
            "Dir",
            BTreeMap::new(),
            BTreeMap::from([("entries".to_string(), entries)]),
        )
        .unwrap();
        id
    }

    #[test]
    fn test_add_rejects_dangling_and_mistyped_targets() {
        let mut state = state();
        let missing = EntityId::new();

        let result = add_entity(
            &mut state,
            EntityId::new(),
            "Dir",
            BTreeMap::new(),
            BTreeMap::from([("entries".to_string(), vec![missing])]),
        );
        assert!(matches!(result, Err(GraphError::DanglingReference { .. })));

        let d = doc(&mut state, "a");
        let result = add_entity(
            &mut state,
            EntityId::new(),
            "Dir",
            BTreeMap::new(),
            BTreeMap::from([("owner".to_string(), vec![d])]),
        );
        assert!(matches!(
            result,
            Err(GraphError::ReferenceTargetMismatch { .. })
        ));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_modify_keeps_untouched_fields() {
        let mut state = state();
        let d = doc(&mut state, "a");

        modify_entity(
            &mut state,
            d,
            &BTreeMap::from([("pages".to_string(), Some(Value::from(3)))]),
            &BTreeMap::new(),
        )
        .unwrap();

        let entity = state.resolve_reference(d).unwrap();
        assert_eq!(entity.str_field("title"), Some("a"));
        assert_eq!(entity.field("pages"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_modify_clearing_fields() {
        let mut state = state();
        let d = doc(&mut state, "a");

        let clear_required = modify_entity(
            &mut state,
            d,
            &BTreeMap::from([("title".to_string(), None)]),
            &BTreeMap::new(),
        );
        assert!(matches!(
            clear_required,
            Err(GraphError::MissingField { .. })
        ));

        modify_entity(
            &mut state,
            d,
            &BTreeMap::from([("pages".to_string(), None)]),
            &BTreeMap::new(),
        )
        .unwrap();
        assert!(state.resolve_reference(d).unwrap().field("pages").is_none());
    }

    #[test]
    fn test_remove_referenced_without_cascade_fails() {
        let mut state = state();
        let d = doc(&mut state, "a");
        let parent = dir(&mut state, vec![d]);

        let result = remove_entity(&mut state, d, false);
        assert!(matches!(
            result,
            Err(GraphError::ReferencedEntity { ref referrer_id, .. }) if *referrer_id == parent.to_string()
        ));
        assert!(state.contains(d));
    }

    #[test]
    fn test_remove_with_cascade_detaches_referrers() {
        let mut state = state();
        let a = doc(&mut state, "a");
        let b = doc(&mut state, "b");
        let parent = dir(&mut state, vec![a, b]);

        remove_entity(&mut state, a, true).unwrap();

        assert!(!state.contains(a));
        assert_eq!(state.resolve_reference(parent).unwrap().references("entries"), &[b]);
        assert_eq!(state.referrers(a).count(), 0);
    }

    #[test]
    fn test_self_reference_does_not_block_removal() {
        let mut state = state();
        let d = dir(&mut state, vec![]);
        modify_entity(
            &mut state,
            d,
            &BTreeMap::new(),
            &BTreeMap::from([("entries".to_string(), vec![d])]),
        )
        .unwrap();

        remove_entity(&mut state, d, false).unwrap();
        assert!(state.is_empty());
    }
}
