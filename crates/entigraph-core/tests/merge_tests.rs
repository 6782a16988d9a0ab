#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;

use common::*;
use entigraph_core::rules::validation::validate_snapshot;
use entigraph_core::{
    Builder, CascadePolicy, EntityType, FieldKind, GraphError, MergeConflict, RemovalMode, Schema,
};

#[test]
fn test_source_additions_get_fresh_ids_and_follow_up_edits() {
    // GIVEN a branch that adds an entity and then edits it
    let mut original = new_builder();
    let mut branch = original.fork().unwrap();
    let added = add_middle(&mut branch, Some("draft"));
    branch
        .modify_entity::<MiddleEntity, _>(added, |m| {
            m.set("property", "final");
        })
        .unwrap();

    // WHEN it is merged
    let report = original.add_diff(&branch).unwrap();

    // THEN the entity exists under a new id with the edited value
    let merged = report.target_id(added);
    assert_ne!(merged, added);
    assert_eq!(
        original.resolve_reference(merged).unwrap().str_field("property"),
        Some("final")
    );
    assert!(original.resolve_reference(added).is_err());
    assert!(!report.has_conflicts());
    assert_eq!(original.changes().len(), 2);
}

#[test]
fn test_modify_of_locally_removed_entity_is_dropped() {
    // GIVEN a shared middle
    let mut original = new_builder();
    let middle = add_middle(&mut original, Some("shared"));
    let mut branch = original.fork().unwrap();

    // AND the branch edits it while the original removes it
    branch
        .modify_entity::<MiddleEntity, _>(middle, |m| {
            m.set("property", "edited");
        })
        .unwrap();
    original.remove_entity(middle).unwrap();

    // WHEN merging
    let report = original.add_diff(&branch).unwrap();

    // THEN the removal wins and the edit is reported
    assert!(!original.current().contains(middle));
    assert_eq!(report.skipped, 1);
    assert_eq!(
        report.conflicts,
        vec![MergeConflict::RemovedEntityModified { entity_id: middle }]
    );
}

#[test]
fn test_remove_of_locally_modified_entity_wins() {
    // GIVEN LeftEntity -> {middle}
    let mut original = new_builder();
    let middle = add_middle(&mut original, Some("shared"));
    let left = add_left(&mut original, &[middle]);
    let mut branch = original
        .fork()
        .unwrap()
        .with_config(entigraph_core::EngineConfig {
            removal: RemovalMode::Cascade,
            ..Default::default()
        });

    // AND the branch removes middle while the original edits it
    branch.remove_entity(middle).unwrap();
    original
        .modify_entity::<MiddleEntity, _>(middle, |m| {
            m.set("property", "local");
        })
        .unwrap();

    // WHEN merging
    let report = original.add_diff(&branch).unwrap();

    // THEN the entity is gone, its parent detached, and the overlap reported
    assert!(!original.current().contains(middle));
    assert!(original
        .resolve_reference(left)
        .unwrap()
        .references("children")
        .is_empty());
    assert_eq!(
        report.conflicts,
        vec![MergeConflict::ModifiedEntityRemoved { entity_id: middle }]
    );
    validate_snapshot(original.current()).unwrap();
}

#[test]
fn test_remove_on_both_sides_is_a_no_op() {
    let mut original = new_builder();
    let middle = add_middle(&mut original, None);
    let mut branch = original.fork().unwrap();

    branch.remove_entity(middle).unwrap();
    original.remove_entity(middle).unwrap();
    let report = original.add_diff(&branch).unwrap();

    assert_eq!(report.replayed, 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(
        report.conflicts,
        vec![MergeConflict::AlreadyRemoved { entity_id: middle }]
    );
}

#[test]
fn test_failed_merge_leaves_target_unchanged() {
    // GIVEN an unreferenced middle and an empty left
    let mut original = new_builder();
    let middle = add_middle(&mut original, None);
    let left = add_left(&mut original, &[]);
    let mut branch = original.fork().unwrap();

    // AND the branch links the middle while the original removes it
    branch
        .modify_entity::<LeftEntity, _>(left, |l| {
            l.set_children([middle]);
        })
        .unwrap();
    original.remove_entity(middle).unwrap();
    let before = original.current().clone();
    let log_len = original.changes().len();

    // WHEN merging
    let result = original.add_diff(&branch);

    // THEN the dangling link aborts the whole merge
    assert!(matches!(result, Err(GraphError::DanglingReference { .. })));
    assert_eq!(original.current(), &before);
    assert_eq!(original.changes().len(), log_len);
}

#[test]
fn test_merge_across_schemas_is_rejected() {
    let other = Arc::new(
        Schema::new()
            .with_type(EntityType::concrete("Other").field("name", FieldKind::String))
            .unwrap(),
    );
    let mut original = new_builder();
    let branch = Builder::new(other);

    let result = original.add_diff(&branch);

    assert!(matches!(result, Err(GraphError::MergeRejected { .. })));
}

#[test]
fn test_merging_an_empty_branch_changes_nothing() {
    let mut original = new_builder();
    add_middle(&mut original, Some("x"));
    let branch = original.fork().unwrap();
    let before = original.to_storage().unwrap();

    let report = original.add_diff(&branch).unwrap();

    assert_eq!(report.replayed, 0);
    assert_eq!(original.to_storage().unwrap(), before);
}

#[test]
fn test_cascade_detachment_counts_as_a_local_write() {
    // GIVEN LeftEntity -> {a, b} shared by both sides
    let mut original = new_builder();
    let a = add_middle(&mut original, Some("a"));
    let b = add_middle(&mut original, Some("b"));
    let left = add_left(&mut original, &[a, b]);
    let mut branch = original.fork().unwrap();

    // AND the original cascades `a` out of the children
    original.remove_entity_with(a, &CascadePolicy).unwrap();
    assert_eq!(child_properties(&original, left), vec![Some("b".to_string())]);

    // AND the branch replaces the children without touching `a`
    let c = add_middle(&mut branch, Some("c"));
    branch
        .modify_entity::<LeftEntity, _>(left, |l| {
            l.set_children([b, c]);
        })
        .unwrap();

    // WHEN merging
    let report = original.add_diff(&branch).unwrap();

    // THEN the branch's collection wins and the overwrite is reported
    assert_eq!(
        child_properties(&original, left),
        vec![Some("b".to_string()), Some("c".to_string())]
    );
    assert_eq!(
        report.conflicts,
        vec![MergeConflict::FieldOverwritten {
            entity_id: left,
            field: "children".to_string(),
        }]
    );
}
