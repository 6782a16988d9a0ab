use crate::errors::{GraphError, Result};
use crate::store::Snapshot;

use super::invariants;

/// Validate a whole snapshot
///
/// Runs every invariant check and returns the first violation found:
///
/// 1. Every entity is an instance of a registered concrete type
/// 2. Every entity's fields and reference shapes match its declaration
/// 3. Every reference resolves within the snapshot
/// 4. Every reference target has the declared target type (or a subtype)
/// 5. The reverse reference index agrees with forward references
///
/// # Errors
///
/// Returns the first violation as a `GraphError`. For exhaustive reporting,
/// call the individual invariant functions directly.
pub fn validate_snapshot(snapshot: &Snapshot) -> Result<()> {
    if let Some(id) = invariants::find_abstract_instances(snapshot).first() {
        let entity = snapshot.resolve_reference(*id)?;
        let type_name = entity.entity_type().to_string();
        return Err(if snapshot.schema().contains(&type_name) {
            GraphError::AbstractInstantiation { type_name }
        } else {
            GraphError::UnknownEntityType { type_name }
        });
    }

    if let Some((_, err)) = invariants::find_shape_violations(snapshot).into_iter().next() {
        return Err(err);
    }

    if let Some((source, field, target)) = invariants::find_dangling_references(snapshot).first() {
        return Err(GraphError::DanglingReference {
            entity_id: source.to_string(),
            field: field.clone(),
            target_id: target.to_string(),
        });
    }

    if let Some((source, field, target)) =
        invariants::find_reference_type_violations(snapshot).first()
    {
        let source_entity = snapshot.resolve_reference(*source)?;
        let expected = snapshot
            .schema()
            .reference_def(source_entity.entity_type(), field)
            .map(|def| def.target.clone())
            .unwrap_or_default();
        return Err(GraphError::ReferenceTargetMismatch {
            field: field.clone(),
            target_id: target.to_string(),
            expected,
            actual: snapshot.resolve_reference(*target)?.entity_type().to_string(),
        });
    }

    if let Some(id) = invariants::find_back_reference_mismatches(snapshot).first() {
        return Err(GraphError::BackReferenceMismatch {
            entity_id: id.to_string(),
        });
    }

    Ok(())
}
