//! Replaying one builder's change log onto another.
//!
//! ## Rules
//!
//! Source records are replayed in order, after everything the target already
//! holds:
//!
//! - `Add`: the entity is created in the target under a fresh id. Later
//!   source records naming the old id are rewritten through the remap table.
//! - `Modify`: only the written fields and references are applied, so the
//!   source wins field by field (last writer wins). If the target also wrote
//!   the same name, a `FieldOverwritten` conflict is reported. A collection
//!   the target shrank by cascading a removal counts as written. If the entity
//!   no longer exists in the target, the record is dropped and reported as
//!   `RemovedEntityModified`.
//! - `Remove`: always cascades, detaching the entity from target collections
//!   that still reference it. If the target had modified the entity, this is
//!   reported as `ModifiedEntityRemoved`. If the entity is already gone, the
//!   record is a no-op reported as `AlreadyRemoved`.
//!
//! A record that would leave a reference pointing at a missing entity fails
//! the whole merge with `DanglingReference`; the target is left untouched.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use super::model::{MergeConflict, MergeReport};
use crate::apply::apply;
use crate::builder::Builder;
use crate::changes::Change;
use crate::errors::{GraphError, Result};
use crate::logging_facility::elapsed_ms;
use crate::model::EntityId;
use crate::store::Snapshot;
use crate::types::schema::EVENT_MERGE_CONFLICT;
use crate::{log_op_end, log_op_error, log_op_start};

/// Replay `source`'s change log onto `target`
///
/// # Errors
///
/// Returns `MergeRejected` if the builders use different schemas, or the
/// first validation error raised by a replayed record. On error `target` is
/// unchanged.
pub fn add_diff(target: &mut Builder, source: &Builder) -> Result<MergeReport> {
    let started = Instant::now();
    log_op_start!("add_diff", change_count = source.log.len());

    match replay(target, source) {
        Ok(report) => {
            if target.config.report_merge_conflicts {
                for conflict in &report.conflicts {
                    tracing::warn!(
                        op = "add_diff",
                        event = EVENT_MERGE_CONFLICT,
                        conflict = conflict.kind_name(),
                        entity_id = %conflict.entity_id(),
                    );
                }
            }
            log_op_end!(
                "add_diff",
                duration_ms = elapsed_ms(started),
                conflict_count = report.conflicts.len(),
            );
            Ok(report)
        }
        Err(err) => {
            log_op_error!("add_diff", err.clone(), duration_ms = elapsed_ms(started));
            Err(err)
        }
    }
}

fn replay(target: &mut Builder, source: &Builder) -> Result<MergeReport> {
    let (ours, theirs) = (target.schema(), source.schema());
    if !Arc::ptr_eq(ours, theirs) && ours != theirs {
        return Err(GraphError::MergeRejected {
            reason: "source and target builders use different schemas".to_string(),
        });
    }

    let touched = touched_by(&target.base, &target.working, &target.log);
    let mut working = target.working.clone();
    let mut appended = Vec::with_capacity(source.log.len());
    let mut report = MergeReport::default();

    for change in &source.log {
        let replayed = match change {
            Change::Add {
                id,
                entity_type,
                fields,
                references,
            } => {
                let fresh = EntityId::new();
                report.remapped.insert(*id, fresh);
                Change::Add {
                    id: fresh,
                    entity_type: entity_type.clone(),
                    fields: fields.clone(),
                    references: remap_references(references, &report.remapped),
                }
            }

            Change::Modify {
                id,
                fields,
                references,
            } => {
                let id = report.target_id(*id);
                if !working.contains(id) {
                    report
                        .conflicts
                        .push(MergeConflict::RemovedEntityModified { entity_id: id });
                    report.skipped += 1;
                    continue;
                }
                if let Some(ours) = touched.get(&id) {
                    for name in fields.keys().chain(references.keys()) {
                        if ours.contains(name.as_str()) {
                            report.conflicts.push(MergeConflict::FieldOverwritten {
                                entity_id: id,
                                field: name.clone(),
                            });
                        }
                    }
                }
                Change::Modify {
                    id,
                    fields: fields.clone(),
                    references: remap_references(references, &report.remapped),
                }
            }

            Change::Remove { id, .. } => {
                let id = report.target_id(*id);
                if !working.contains(id) {
                    report
                        .conflicts
                        .push(MergeConflict::AlreadyRemoved { entity_id: id });
                    report.skipped += 1;
                    continue;
                }
                if touched.contains_key(&id) {
                    report
                        .conflicts
                        .push(MergeConflict::ModifiedEntityRemoved { entity_id: id });
                }
                Change::Remove { id, cascade: true }
            }
        };

        working = apply(working, &replayed)?;
        appended.push(replayed);
        report.replayed += 1;
    }

    target.working = working;
    target.log.extend(appended);
    Ok(report)
}

/// Names each entity had written by `log`
///
/// Covers the names of `Modify` records and the reference collections a
/// `Remove` detached the removed entity from. Candidate referrers come from
/// `base` and from the references the log itself wrote; one counts only if
/// `working` no longer lists the removed id.
fn touched_by<'a>(
    base: &'a Snapshot,
    working: &Snapshot,
    log: &'a [Change],
) -> HashMap<EntityId, BTreeSet<&'a str>> {
    let mut written_refs: HashMap<EntityId, Vec<(EntityId, &'a str)>> = HashMap::new();
    for change in log {
        if let Change::Add { id, references, .. } | Change::Modify { id, references, .. } = change {
            for (name, targets) in references {
                for target in targets {
                    written_refs.entry(*target).or_default().push((*id, name.as_str()));
                }
            }
        }
    }

    let mut touched: HashMap<EntityId, BTreeSet<&'a str>> = HashMap::new();
    for change in log {
        match change {
            Change::Modify { id, .. } => {
                touched.entry(*id).or_default().extend(change.touched());
            }
            Change::Remove { id, .. } => {
                let from_base = base
                    .referrers(*id)
                    .map(|back_ref| (back_ref.source, back_ref.field.as_str()));
                let from_log = written_refs.get(id).into_iter().flatten().copied();
                for (parent, field) in from_base.chain(from_log) {
                    let detached = working
                        .resolve_reference(parent)
                        .is_ok_and(|entity| !entity.references(field).contains(id));
                    if detached {
                        touched.entry(parent).or_default().insert(field);
                    }
                }
            }
            Change::Add { .. } => {}
        }
    }
    touched
}

fn remap_references(
    references: &BTreeMap<String, Vec<EntityId>>,
    remapped: &BTreeMap<EntityId, EntityId>,
) -> BTreeMap<String, Vec<EntityId>> {
    references
        .iter()
        .map(|(name, targets)| {
            let targets = targets
                .iter()
                .map(|t| remapped.get(t).copied().unwrap_or(*t))
                .collect();
            (name.clone(), targets)
        })
        .collect()
}
