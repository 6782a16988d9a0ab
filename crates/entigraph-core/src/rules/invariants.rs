use std::collections::BTreeSet;

use crate::errors::GraphError;
use crate::model::EntityId;
use crate::store::{BackRef, Snapshot};

/// References whose target is missing
///
/// Returns list of (source_id, field, target_id) tuples
pub fn find_dangling_references(snapshot: &Snapshot) -> Vec<(EntityId, String, EntityId)> {
    let mut dangling = Vec::new();
    for entity in snapshot.iter() {
        for (field, target) in entity.outgoing() {
            if !snapshot.contains(target) {
                dangling.push((entity.id(), field.to_string(), target));
            }
        }
    }
    dangling
}

/// References whose target exists but is not an instance of the declared
/// target type
///
/// Returns list of (source_id, field, target_id) tuples
pub fn find_reference_type_violations(snapshot: &Snapshot) -> Vec<(EntityId, String, EntityId)> {
    let schema = snapshot.schema();
    let mut violations = Vec::new();
    for entity in snapshot.iter() {
        for (field, target) in entity.outgoing() {
            let Ok(target_entity) = snapshot.resolve_reference(target) else {
                continue;
            };
            let allowed = schema
                .reference_def(entity.entity_type(), field)
                .is_some_and(|def| schema.is_subtype(target_entity.entity_type(), &def.target));
            if !allowed {
                violations.push((entity.id(), field.to_string(), target));
            }
        }
    }
    violations
}

/// Entities whose runtime type is abstract or unregistered
pub fn find_abstract_instances(snapshot: &Snapshot) -> Vec<EntityId> {
    let schema = snapshot.schema();
    snapshot
        .iter()
        .filter(|entity| {
            schema
                .get(entity.entity_type())
                .map_or(true, |ty| ty.is_abstract())
        })
        .map(|entity| entity.id())
        .collect()
}

/// Entities whose fields or reference shapes break their type declaration
pub fn find_shape_violations(snapshot: &Snapshot) -> Vec<(EntityId, GraphError)> {
    let schema = snapshot.schema();
    snapshot
        .iter()
        .filter_map(|entity| {
            schema
                .check_shape(
                    entity.entity_type(),
                    entity.fields(),
                    entity.reference_fields(),
                )
                .err()
                .map(|err| (entity.id(), err))
        })
        .collect()
}

/// Entities where the reverse index disagrees with forward references
///
/// Checks both directions: every forward edge must be indexed, and every
/// indexed edge must still exist and point at an existing entity. Returns the
/// ids of the entities whose index entry is wrong, sorted and deduplicated.
pub fn find_back_reference_mismatches(snapshot: &Snapshot) -> Vec<EntityId> {
    let mut mismatched = BTreeSet::new();

    for entity in snapshot.iter() {
        for (field, target) in entity.outgoing() {
            let expected = BackRef {
                source: entity.id(),
                field: field.to_string(),
            };
            if !snapshot.referrers(target).any(|back_ref| *back_ref == expected) {
                mismatched.insert(target);
            }
        }
    }

    for (target, back_refs) in snapshot.back_ref_index() {
        if !snapshot.contains(*target) {
            mismatched.insert(*target);
            continue;
        }
        for back_ref in back_refs {
            let still_there = snapshot
                .resolve_reference(back_ref.source)
                .is_ok_and(|source| source.references(&back_ref.field).contains(target));
            if !still_there {
                mismatched.insert(*target);
            }
        }
    }

    mismatched.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entity, EntityType, Schema};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::new()
                .with_type(EntityType::abstract_type("Node").children("kids", "Node"))
                .unwrap()
                .with_type(EntityType::concrete("Leaf").extends("Node"))
                .unwrap(),
        )
    }

    fn node(entity_type: &str, kids: Vec<EntityId>) -> Entity {
        Entity::new(
            EntityId::new(),
            entity_type,
            BTreeMap::new(),
            BTreeMap::from([("kids".to_string(), kids)]),
        )
    }

    #[test]
    fn test_clean_snapshot_has_no_findings() {
        let mut snapshot = Snapshot::empty(schema());
        let leaf = node("Leaf", vec![]);
        let leaf_id = leaf.id();
        snapshot.insert_new(leaf);
        snapshot.insert_new(node("Leaf", vec![leaf_id]));

        assert!(find_dangling_references(&snapshot).is_empty());
        assert!(find_reference_type_violations(&snapshot).is_empty());
        assert!(find_abstract_instances(&snapshot).is_empty());
        assert!(find_shape_violations(&snapshot).is_empty());
        assert!(find_back_reference_mismatches(&snapshot).is_empty());
    }

    #[test]
    fn test_detects_dangling_and_abstract() {
        let mut snapshot = Snapshot::empty(schema());
        let ghost = EntityId::new();
        let abstract_node = node("Node", vec![ghost]);
        let abstract_id = abstract_node.id();
        snapshot.insert_new(abstract_node);

        let dangling = find_dangling_references(&snapshot);
        assert_eq!(dangling, vec![(abstract_id, "kids".to_string(), ghost)]);
        assert_eq!(find_abstract_instances(&snapshot), vec![abstract_id]);
        assert_eq!(find_shape_violations(&snapshot).len(), 1);
    }

    #[test]
    fn test_detects_stale_back_reference() {
        let mut snapshot = Snapshot::empty(schema());
        let leaf = node("Leaf", vec![]);
        let leaf_id = leaf.id();
        snapshot.insert_new(leaf);
        let parent = node("Leaf", vec![leaf_id]);
        let parent_id = parent.id();
        snapshot.insert_new(parent);

        // Removing the child directly bypasses the referrer cleanup
        snapshot.remove(leaf_id).unwrap();

        assert_eq!(find_back_reference_mismatches(&snapshot), vec![leaf_id]);
        assert_eq!(
            find_dangling_references(&snapshot),
            vec![(parent_id, "kids".to_string(), leaf_id)]
        );
    }
}
