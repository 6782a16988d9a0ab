//! Functional-boundary apply function
//!
//! `apply()` is the single entry point through which a [`Change`] reaches a
//! working snapshot. Builders use it for their own operations and `add_diff`
//! uses it to replay another builder's log.
//!
//! ## Atomicity Contract
//!
//! - **All-or-nothing**: either the change is fully applied and the new state
//!   is returned, or an error is returned and the caller's previous state is
//!   untouched
//! - **No panics**: invalid input returns typed errors
//!
//! Taking the state by value is cheap: snapshots are persistent, so callers
//! keep the old version by cloning it first in O(1).

use crate::changes::Change;
use crate::errors::Result;
use crate::ops::entity_ops;
use crate::store::Snapshot;

/// Apply one change to a working snapshot, returning the new state
///
/// # Errors
///
/// Returns the validation error of the underlying operation; see
/// [`entity_ops`] for the per-operation taxonomy.
pub fn apply(mut state: Snapshot, change: &Change) -> Result<Snapshot> {
    match change {
        Change::Add {
            id,
            entity_type,
            fields,
            references,
        } => {
            entity_ops::add_entity(
                &mut state,
                *id,
                entity_type,
                fields.clone(),
                references.clone(),
            )?;
            Ok(state)
        }

        Change::Modify {
            id,
            fields,
            references,
        } => {
            entity_ops::modify_entity(&mut state, *id, fields, references)?;
            Ok(state)
        }

        Change::Remove { id, cascade } => {
            entity_ops::remove_entity(&mut state, *id, *cascade)?;
            Ok(state)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::GraphError;
    use crate::model::{EntityId, EntityType, FieldKind, Schema, Value};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn empty() -> Snapshot {
        let schema = Schema::new()
            .with_type(EntityType::concrete("Tag").field("label", FieldKind::String))
            .unwrap();
        Snapshot::empty(Arc::new(schema))
    }

    fn add_tag(id: EntityId, label: Value) -> Change {
        Change::Add {
            id,
            entity_type: "Tag".into(),
            fields: BTreeMap::from([("label".to_string(), label)]),
            references: BTreeMap::new(),
        }
    }

    #[test]
    fn test_apply_add_then_remove() {
        let id = EntityId::new();
        let state = apply(empty(), &add_tag(id, "x".into())).unwrap();
        assert!(state.contains(id));

        let state = apply(state, &Change::Remove { id, cascade: false }).unwrap();
        assert!(state.is_empty());
    }

    #[test]
    fn test_failed_apply_leaves_previous_version_intact() {
        let id = EntityId::new();
        let before = apply(empty(), &add_tag(id, "x".into())).unwrap();

        let bad = Change::Modify {
            id,
            fields: BTreeMap::from([("label".to_string(), Some(Value::from(1)))]),
            references: BTreeMap::new(),
        };
        let result = apply(before.clone(), &bad);

        assert!(matches!(result, Err(GraphError::FieldKindMismatch { .. })));
        assert_eq!(
            before.resolve_reference(id).unwrap().str_field("label"),
            Some("x")
        );
    }
}
