//! Merge report and snapshot diff output types.
//!
//! Collections use `BTreeMap` / `BTreeSet` or id-sorted `Vec`s so serialized
//! output is deterministic.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::model::EntityId;

/// Outcome of `Builder::add_diff`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeReport {
    /// Source records applied to the target
    pub replayed: usize,
    /// Source records skipped because their entity was already gone
    pub skipped: usize,
    /// Source-side id -> id allocated in the target, for source-added entities
    pub remapped: BTreeMap<EntityId, EntityId>,
    /// Overlapping edits, in replay order
    pub conflicts: Vec<MergeConflict>,
}

impl MergeReport {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// Where a source-side id lives in the target
    pub fn target_id(&self, source_id: EntityId) -> EntityId {
        self.remapped.get(&source_id).copied().unwrap_or(source_id)
    }
}

/// A non-fatal overlap between target and source edits
///
/// Ids are target-side ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MergeConflict {
    /// Both sides wrote the field; the source value was kept
    FieldOverwritten { entity_id: EntityId, field: String },
    /// Source modified an entity the target removed; the modification was dropped
    RemovedEntityModified { entity_id: EntityId },
    /// Source removed an entity the target modified; the entity was removed
    ModifiedEntityRemoved { entity_id: EntityId },
    /// Both sides removed the entity
    AlreadyRemoved { entity_id: EntityId },
}

impl MergeConflict {
    pub fn entity_id(&self) -> EntityId {
        match self {
            MergeConflict::FieldOverwritten { entity_id, .. }
            | MergeConflict::RemovedEntityModified { entity_id }
            | MergeConflict::ModifiedEntityRemoved { entity_id }
            | MergeConflict::AlreadyRemoved { entity_id } => *entity_id,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            MergeConflict::FieldOverwritten { .. } => "field_overwritten",
            MergeConflict::RemovedEntityModified { .. } => "removed_entity_modified",
            MergeConflict::ModifiedEntityRemoved { .. } => "modified_entity_removed",
            MergeConflict::AlreadyRemoved { .. } => "already_removed",
        }
    }
}

/// Entity-level difference between two snapshots
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDiff {
    /// Ids present only in `b`
    pub added: Vec<EntityId>,
    /// Ids present only in `a`
    pub removed: Vec<EntityId>,
    /// Ids present in both with different content
    pub modified: Vec<EntityDelta>,
    pub a_digest: String,
    pub b_digest: String,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

/// Names of the fields and references that differ for one entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDelta {
    pub entity_id: EntityId,
    pub fields: BTreeSet<String>,
    pub references: BTreeSet<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_id_falls_back_to_source_id() {
        let (kept, source, target) = (EntityId::new(), EntityId::new(), EntityId::new());
        let report = MergeReport {
            remapped: BTreeMap::from([(source, target)]),
            ..MergeReport::default()
        };
        assert_eq!(report.target_id(source), target);
        assert_eq!(report.target_id(kept), kept);
        assert!(!report.has_conflicts());
    }

    #[test]
    fn test_conflict_serializes_with_kind_tag() {
        let conflict = MergeConflict::FieldOverwritten {
            entity_id: EntityId::new(),
            field: "children".into(),
        };
        let json = serde_json::to_value(&conflict).unwrap();
        assert_eq!(json["kind"], conflict.kind_name());
        assert_eq!(json["field"], "children");
    }

    #[test]
    fn test_report_round_trips_through_json() {
        let report = MergeReport {
            replayed: 2,
            skipped: 0,
            remapped: BTreeMap::from([(EntityId::new(), EntityId::new())]),
            conflicts: vec![MergeConflict::AlreadyRemoved {
                entity_id: EntityId::new(),
            }],
        };
        let json = serde_json::to_string(&report).unwrap();
        let back: MergeReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
