use std::iter::Peekable;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::bucket::TypeBucket;
use super::digest::compute_snapshot_digest;
use super::view::{CompositeView, EntityView, LeafView};
use crate::errors::{GraphError, Result};
use crate::model::{Entity, EntityId, EntityKind, Schema};

/// One incoming edge: `source` refers to the indexed entity through `field`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackRef {
    pub source: EntityId,
    pub field: String,
}

/// Immutable, shareable version of the entity graph
///
/// Snapshots are produced by `Builder::to_storage` and are never mutated
/// afterwards. Cloning is O(1): every collection inside is persistent, and
/// buckets and entities sit behind `Arc`s, so two versions that differ in a
/// few entities share everything else. Snapshots are `Send + Sync` and may be
/// read from any number of threads.
#[derive(Debug, Clone)]
pub struct Snapshot {
    schema: Arc<Schema>,
    /// Concrete type name -> entities of exactly that type
    buckets: im::OrdMap<String, Arc<TypeBucket>>,
    /// Entity id -> concrete type name (its bucket)
    locations: im::HashMap<EntityId, String>,
    /// Target id -> entities referring to it
    back_refs: im::HashMap<EntityId, im::OrdSet<BackRef>>,
    next_seq: u64,
    materialized_at: DateTime<Utc>,
}

type Cursor<'s> = Peekable<Box<dyn Iterator<Item = (u64, &'s Arc<Entity>)> + 's>>;

/// Lazy iterator over every entity whose runtime type is a given type or one
/// of its subtypes, in creation order
///
/// Merges the per-type buckets on the fly; nothing is collected up front.
pub struct EntitiesOfType<'s> {
    cursors: Vec<Cursor<'s>>,
}

impl<'s> Iterator for EntitiesOfType<'s> {
    type Item = &'s Arc<Entity>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self
            .cursors
            .iter_mut()
            .enumerate()
            .filter_map(|(i, cursor)| cursor.peek().map(|(seq, _)| (i, *seq)))
            .min_by_key(|(_, seq)| *seq)
            .map(|(i, _)| i)?;
        self.cursors[index].next().map(|(_, entity)| entity)
    }
}

impl Snapshot {
    /// Snapshot with no entities
    pub fn empty(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            buckets: im::OrdMap::new(),
            locations: im::HashMap::new(),
            back_refs: im::HashMap::new(),
            next_seq: 0,
            materialized_at: Utc::now(),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.locations.contains_key(&id)
    }

    /// When this version was produced by `Builder::to_storage`
    pub fn materialized_at(&self) -> DateTime<Utc> {
        self.materialized_at
    }

    /// Look up an entity by id
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` if no entity with that id exists.
    pub fn resolve_reference(&self, id: EntityId) -> Result<&Arc<Entity>> {
        let not_found = || GraphError::EntityNotFound {
            entity_id: id.to_string(),
        };
        let type_name = self.locations.get(&id).ok_or_else(not_found)?;
        self.buckets
            .get(type_name)
            .and_then(|bucket| bucket.get(&id))
            .ok_or_else(not_found)
    }

    /// All entities whose runtime type is `type_name` or a subtype of it
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntityType` if the schema has no such type.
    pub fn entities_of_type(&self, type_name: &str) -> Result<EntitiesOfType<'_>> {
        self.schema.get(type_name)?;
        let cursors = self
            .schema
            .subtypes_of(type_name)
            .into_iter()
            .filter_map(|name| self.buckets.get(name))
            .map(|bucket| {
                let entities: Box<dyn Iterator<Item = (u64, &Arc<Entity>)> + '_> =
                    Box::new(bucket.iter());
                entities.peekable()
            })
            .collect();
        Ok(EntitiesOfType { cursors })
    }

    /// Typed form of [`Snapshot::entities_of_type`]
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntityType` if `T` was never registered.
    pub fn entities<T: EntityKind>(&self) -> Result<EntitiesOfType<'_>> {
        self.entities_of_type(T::NAME)
    }

    /// Every entity, grouped by concrete type name then creation order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Entity>> + '_ {
        self.buckets
            .values()
            .flat_map(|bucket| bucket.iter().map(|(_, entity)| entity))
    }

    /// Entities that reference `id`, with the field they reference it through
    pub fn referrers(&self, id: EntityId) -> impl Iterator<Item = &BackRef> + '_ {
        self.back_refs.get(&id).into_iter().flat_map(|set| set.iter())
    }

    /// Composite or leaf view of an entity
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` if no entity with that id exists.
    pub fn view(&self, id: EntityId) -> Result<EntityView<'_>> {
        let entity = self.resolve_reference(id)?;
        Ok(match self.schema.children_reference(entity.entity_type()) {
            Some(def) => EntityView::Composite(CompositeView::new(self, entity, &def.name)),
            None => EntityView::Leaf(LeafView::new(entity)),
        })
    }

    /// Whether both versions hold the very same bucket allocation for a type
    pub fn shares_bucket_with(&self, other: &Snapshot, type_name: &str) -> bool {
        match (self.buckets.get(type_name), other.buckets.get(type_name)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Content digest; see [`compute_snapshot_digest`]
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if an entity cannot be encoded.
    pub fn digest(&self) -> Result<String> {
        compute_snapshot_digest(self)
    }

    // ===== Crate-internal mutation, used on working copies only =====

    pub(crate) fn insert_new(&mut self, entity: Entity) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.link(&entity);
        self.locations.insert(entity.id, entity.entity_type.clone());
        let type_name = entity.entity_type.clone();
        self.update_bucket(&type_name, |bucket| bucket.insert(seq, Arc::new(entity)));
    }

    /// Swap in a new version of an existing entity; returns the old one
    pub(crate) fn replace(&mut self, entity: Entity) -> Result<Arc<Entity>> {
        let previous = Arc::clone(self.resolve_reference(entity.id)?);
        if previous.entity_type != entity.entity_type {
            return Err(GraphError::Internal {
                message: format!("entity {} cannot change its runtime type", entity.id),
            });
        }
        self.unlink(&previous);
        self.link(&entity);
        let type_name = entity.entity_type.clone();
        self.update_bucket(&type_name, |bucket| bucket.replace(Arc::new(entity)));
        Ok(previous)
    }

    /// Drop an entity and its outgoing edges. Incoming edges must already
    /// be gone.
    pub(crate) fn remove(&mut self, id: EntityId) -> Result<Arc<Entity>> {
        let entity = Arc::clone(self.resolve_reference(id)?);
        self.unlink(&entity);
        self.locations.remove(&id);
        self.update_bucket(entity.entity_type(), |bucket| bucket.remove(&id));
        Ok(entity)
    }

    pub(crate) fn stamped(mut self) -> Self {
        self.materialized_at = Utc::now();
        self
    }

    pub(crate) fn back_ref_index(
        &self,
    ) -> impl Iterator<Item = (&EntityId, &im::OrdSet<BackRef>)> + '_ {
        self.back_refs.iter()
    }

    fn update_bucket<R>(&mut self, type_name: &str, f: impl FnOnce(&mut TypeBucket) -> R) -> R {
        let mut bucket = self
            .buckets
            .get(type_name)
            .map(|existing| (**existing).clone())
            .unwrap_or_default();
        let out = f(&mut bucket);
        if bucket.is_empty() {
            self.buckets.remove(type_name);
        } else {
            self.buckets.insert(type_name.to_string(), Arc::new(bucket));
        }
        out
    }

    fn link(&mut self, entity: &Entity) {
        for (field, target) in entity.outgoing() {
            let mut set = self.back_refs.get(&target).cloned().unwrap_or_default();
            set.insert(BackRef {
                source: entity.id,
                field: field.to_string(),
            });
            self.back_refs.insert(target, set);
        }
    }

    fn unlink(&mut self, entity: &Entity) {
        for (field, target) in entity.outgoing() {
            let Some(mut set) = self.back_refs.get(&target).cloned() else {
                continue;
            };
            set.remove(&BackRef {
                source: entity.id,
                field: field.to_string(),
            });
            if set.is_empty() {
                self.back_refs.remove(&target);
            } else {
                self.back_refs.insert(target, set);
            }
        }
    }
}

/// Entity-for-entity equality; `materialized_at` is ignored
impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.iter().all(|entity| {
                other
                    .resolve_reference(entity.id)
                    .is_ok_and(|theirs| Arc::ptr_eq(theirs, entity) || theirs == entity)
            })
    }
}
