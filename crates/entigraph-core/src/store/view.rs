use std::sync::Arc;

use super::snapshot::Snapshot;
use crate::model::{Entity, EntityId};

/// Structural view of an entity
///
/// Types that declare (or inherit) a children collection are composites;
/// everything else is a leaf.
#[derive(Debug, Clone, Copy)]
pub enum EntityView<'s> {
    Composite(CompositeView<'s>),
    Leaf(LeafView<'s>),
}

impl<'s> EntityView<'s> {
    pub fn entity(&self) -> &'s Arc<Entity> {
        match self {
            EntityView::Composite(view) => view.entity,
            EntityView::Leaf(view) => view.entity,
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, EntityView::Composite(_))
    }

    pub fn as_composite(&self) -> Option<&CompositeView<'s>> {
        match self {
            EntityView::Composite(view) => Some(view),
            EntityView::Leaf(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CompositeView<'s> {
    snapshot: &'s Snapshot,
    entity: &'s Arc<Entity>,
    field: &'s str,
}

impl<'s> CompositeView<'s> {
    pub(crate) fn new(snapshot: &'s Snapshot, entity: &'s Arc<Entity>, field: &'s str) -> Self {
        Self {
            snapshot,
            entity,
            field,
        }
    }

    pub fn entity(&self) -> &'s Arc<Entity> {
        self.entity
    }

    /// Name of the reference field holding the children
    pub fn children_field(&self) -> &'s str {
        self.field
    }

    pub fn child_ids(&self) -> &'s [EntityId] {
        self.entity.references(self.field)
    }

    /// Children in declared order
    pub fn children(&self) -> impl Iterator<Item = &'s Arc<Entity>> + 's {
        let snapshot = self.snapshot;
        self.child_ids()
            .iter()
            .filter_map(move |id| snapshot.resolve_reference(*id).ok())
    }

    pub fn child_views(&self) -> impl Iterator<Item = EntityView<'s>> + 's {
        let snapshot = self.snapshot;
        self.child_ids()
            .iter()
            .filter_map(move |id| snapshot.view(*id).ok())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LeafView<'s> {
    entity: &'s Arc<Entity>,
}

impl<'s> LeafView<'s> {
    pub(crate) fn new(entity: &'s Arc<Entity>) -> Self {
        Self { entity }
    }

    pub fn entity(&self) -> &'s Arc<Entity> {
        self.entity
    }
}
