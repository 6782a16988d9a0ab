use std::sync::Arc;

use crate::model::{Entity, EntityId};

#[derive(Debug, Clone)]
struct Slot {
    seq: u64,
    entity: Arc<Entity>,
}

/// All entities of one concrete type
///
/// Both maps are persistent, so cloning a bucket is O(1) and a modified copy
/// shares every untouched entity with the original.
#[derive(Debug, Clone, Default)]
pub(crate) struct TypeBucket {
    order: im::OrdMap<u64, EntityId>,
    slots: im::HashMap<EntityId, Slot>,
}

impl TypeBucket {
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn get(&self, id: &EntityId) -> Option<&Arc<Entity>> {
        self.slots.get(id).map(|slot| &slot.entity)
    }

    /// Entities with their creation sequence, oldest first
    pub(crate) fn iter(&self) -> impl Iterator<Item = (u64, &Arc<Entity>)> + '_ {
        self.order
            .iter()
            .filter_map(move |(seq, id)| self.slots.get(id).map(|slot| (*seq, &slot.entity)))
    }

    pub(crate) fn insert(&mut self, seq: u64, entity: Arc<Entity>) {
        let id = entity.id();
        self.order.insert(seq, id);
        self.slots.insert(id, Slot { seq, entity });
    }

    /// Swap in a new version, keeping the creation position.
    /// Returns the previous version.
    pub(crate) fn replace(&mut self, entity: Arc<Entity>) -> Option<Arc<Entity>> {
        let id = entity.id();
        let seq = self.slots.get(&id)?.seq;
        self.slots
            .insert(id, Slot { seq, entity })
            .map(|previous| previous.entity)
    }

    pub(crate) fn remove(&mut self, id: &EntityId) -> Option<Arc<Entity>> {
        let slot = self.slots.remove(id)?;
        self.order.remove(&slot.seq);
        Some(slot.entity)
    }
}
