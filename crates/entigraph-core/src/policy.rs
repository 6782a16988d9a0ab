//! Removal policy trait and implementations
//!
//! A `RemovalPolicy` decides what `Builder::remove_entity` does when the entity
//! being removed is still referenced by others: reject the removal, or
//! cascade by detaching it from every referring collection first.

use std::collections::HashSet;

use crate::config::RemovalMode;
use crate::model::Entity;

/// Policy trait consulted once per removal
pub trait RemovalPolicy {
    /// `true` to detach the entity from its referrers and remove it,
    /// `false` to reject the removal while referrers exist
    fn cascade(&self, entity: &Entity) -> bool;
}

/// Never cascade: referenced entities cannot be removed
///
/// ```
/// use entigraph_core::policy::{RejectReferencedPolicy, RemovalPolicy};
/// # use entigraph_core::model::{EntityType, Schema};
/// # use entigraph_core::builder::{Builder, NewEntity};
/// # use std::sync::Arc;
/// # let schema = Arc::new(Schema::new().with_type(EntityType::concrete("Tag")).unwrap());
/// # let mut builder = Builder::new(schema);
/// # let id = builder.add_entity(NewEntity::new("Tag")).unwrap();
/// # let entity = builder.resolve_reference(id).unwrap();
/// assert!(!RejectReferencedPolicy.cascade(entity));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectReferencedPolicy;

impl RemovalPolicy for RejectReferencedPolicy {
    fn cascade(&self, _entity: &Entity) -> bool {
        false
    }
}

/// Always cascade
#[derive(Debug, Clone, Copy, Default)]
pub struct CascadePolicy;

impl RemovalPolicy for CascadePolicy {
    fn cascade(&self, _entity: &Entity) -> bool {
        true
    }
}

/// Cascade only for entities whose runtime type is in the given set
#[derive(Debug, Clone, Default)]
pub struct SelectedCascadePolicy {
    entity_types: HashSet<String>,
}

impl SelectedCascadePolicy {
    pub fn new(entity_types: HashSet<String>) -> Self {
        Self { entity_types }
    }

    pub fn with_types<I, S>(entity_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(entity_types.into_iter().map(Into::into).collect())
    }
}

impl RemovalPolicy for SelectedCascadePolicy {
    fn cascade(&self, entity: &Entity) -> bool {
        self.entity_types.contains(entity.entity_type())
    }
}

/// The configured default mode acts as a policy of its own
impl RemovalPolicy for RemovalMode {
    fn cascade(&self, _entity: &Entity) -> bool {
        matches!(self, RemovalMode::Cascade)
    }
}
