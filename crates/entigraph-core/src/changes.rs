//! Change records kept by a builder
//!
//! Every successful builder operation appends one `Change`. The log is what
//! `add_diff` replays onto another builder, and it can be serialized for
//! inspection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{EntityId, Value};

/// A single recorded mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Change {
    /// Entity created with its full initial content
    Add {
        id: EntityId,
        entity_type: String,
        fields: BTreeMap<String, Value>,
        references: BTreeMap<String, Vec<EntityId>>,
    },

    /// Only the fields and reference collections that were written;
    /// `None` clears an optional field
    Modify {
        id: EntityId,
        fields: BTreeMap<String, Option<Value>>,
        references: BTreeMap<String, Vec<EntityId>>,
    },

    /// Entity removed; with `cascade`, referrers were detached first
    Remove { id: EntityId, cascade: bool },
}

impl Change {
    pub fn entity_id(&self) -> EntityId {
        match self {
            Change::Add { id, .. } | Change::Modify { id, .. } | Change::Remove { id, .. } => *id,
        }
    }

    /// Name of the builder operation that produced this change
    pub fn op_name(&self) -> &'static str {
        match self {
            Change::Add { .. } => "add_entity",
            Change::Modify { .. } => "modify_entity",
            Change::Remove { .. } => "remove_entity",
        }
    }

    /// Field and reference names written by a `Modify`; empty otherwise
    pub fn touched(&self) -> impl Iterator<Item = &str> {
        let (fields, references) = match self {
            Change::Modify {
                fields, references, ..
            } => (Some(fields), Some(references)),
            _ => (None, None),
        };
        fields
            .into_iter()
            .flat_map(|f| f.keys())
            .chain(references.into_iter().flat_map(|r| r.keys()))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touched_lists_modified_names_only() {
        let id = EntityId::new();
        let modify = Change::Modify {
            id,
            fields: BTreeMap::from([("property".to_string(), None)]),
            references: BTreeMap::from([("children".to_string(), vec![])]),
        };
        let touched: Vec<_> = modify.touched().collect();
        assert_eq!(touched, vec!["property", "children"]);

        let remove = Change::Remove { id, cascade: false };
        assert_eq!(remove.touched().count(), 0);
        assert_eq!(remove.entity_id(), id);
        assert_eq!(remove.op_name(), "remove_entity");
    }

    #[test]
    fn test_serialized_form_is_tagged_by_op() {
        let change = Change::Remove {
            id: EntityId::new(),
            cascade: true,
        };
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["op"], "remove");
        assert_eq!(json["cascade"], true);
    }
}
