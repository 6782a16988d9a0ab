//! Entity-level comparison of two snapshots.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::model::{EntityDelta, SnapshotDiff};
use crate::errors::Result;
use crate::model::Entity;
use crate::store::Snapshot;

/// Compare `a` (before) with `b` (after)
///
/// Entities are matched by id. An entity shared by both versions is skipped
/// on a pointer check without comparing content.
///
/// # Errors
///
/// Returns `Serialization` if either digest cannot be computed.
pub fn compute_diff(a: &Snapshot, b: &Snapshot) -> Result<SnapshotDiff> {
    let mut diff = SnapshotDiff {
        a_digest: a.digest()?,
        b_digest: b.digest()?,
        ..SnapshotDiff::default()
    };

    for before in a.iter() {
        match b.resolve_reference(before.id()) {
            Err(_) => diff.removed.push(before.id()),
            Ok(after) if Arc::ptr_eq(before, after) || before == after => {}
            Ok(after) => diff.modified.push(delta(before, after)),
        }
    }

    diff.added = b
        .iter()
        .map(|entity| entity.id())
        .filter(|id| !a.contains(*id))
        .collect();

    diff.added.sort();
    diff.removed.sort();
    diff.modified.sort_by_key(|delta| delta.entity_id);
    Ok(diff)
}

fn delta(before: &Entity, after: &Entity) -> EntityDelta {
    let field_names: BTreeSet<&String> = before
        .fields()
        .keys()
        .chain(after.fields().keys())
        .collect();
    let fields = field_names
        .into_iter()
        .filter(|name| before.field(name) != after.field(name))
        .cloned()
        .collect();

    let reference_names: BTreeSet<&String> = before
        .reference_fields()
        .keys()
        .chain(after.reference_fields().keys())
        .collect();
    let references = reference_names
        .into_iter()
        .filter(|name| before.references(name) != after.references(name))
        .cloned()
        .collect();

    EntityDelta {
        entity_id: after.id(),
        fields,
        references,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityId, EntityType, FieldKind, Schema};
    use std::collections::BTreeMap;

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::new()
                .with_type(
                    EntityType::concrete("Item")
                        .field("name", FieldKind::String)
                        .optional_field("qty", FieldKind::Int),
                )
                .unwrap(),
        )
    }

    fn item(name: &str) -> Entity {
        Entity::new(
            EntityId::new(),
            "Item",
            BTreeMap::from([("name".to_string(), name.into())]),
            BTreeMap::new(),
        )
    }

    #[test]
    fn test_identical_snapshots_have_empty_diff() {
        let mut a = Snapshot::empty(schema());
        a.insert_new(item("x"));
        let diff = compute_diff(&a, &a.clone()).unwrap();
        assert!(diff.is_empty());
        assert_eq!(diff.a_digest, diff.b_digest);
    }

    #[test]
    fn test_added_removed_and_modified() {
        let mut a = Snapshot::empty(schema());
        let kept = item("kept");
        let gone = item("gone");
        let (kept_id, gone_id) = (kept.id(), gone.id());
        a.insert_new(kept);
        a.insert_new(gone);

        let mut b = a.clone();
        b.remove(gone_id).unwrap();
        let fresh = item("fresh");
        let fresh_id = fresh.id();
        b.insert_new(fresh);
        b.replace(Entity::new(
            kept_id,
            "Item",
            BTreeMap::from([
                ("name".to_string(), "kept".into()),
                ("qty".to_string(), 2.into()),
            ]),
            BTreeMap::new(),
        ))
        .unwrap();

        let diff = compute_diff(&a, &b).unwrap();
        assert_eq!(diff.added, vec![fresh_id]);
        assert_eq!(diff.removed, vec![gone_id]);
        assert_eq!(diff.modified.len(), 1);
        assert_eq!(diff.modified[0].entity_id, kept_id);
        assert_eq!(
            diff.modified[0].fields.iter().collect::<Vec<_>>(),
            vec!["qty"]
        );
        assert!(diff.modified[0].references.is_empty());
        assert_ne!(diff.a_digest, diff.b_digest);
    }
}
