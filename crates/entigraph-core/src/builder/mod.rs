//! Mutable working copies of a snapshot.
//!
//! A [`Builder`] starts from a snapshot (or from nothing), accepts add, modify
//! and remove operations, and records each one in a change log. Reads see
//! the builder's own writes. `to_storage` materializes the current state as a
//! new immutable snapshot without consuming the builder, and `add_diff`
//! replays another builder's log onto this one.

mod modifiable;

pub use modifiable::Modifiable;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::apply::apply;
use crate::changes::Change;
use crate::config::EngineConfig;
use crate::diff::{merge, MergeReport};
use crate::errors::{GraphError, Result};
use crate::logging_facility::elapsed_ms;
use crate::model::{Entity, EntityId, EntityKind, Schema, Value};
use crate::policy::RemovalPolicy;
use crate::rules::validation;
use crate::store::{EntitiesOfType, EntityView, Snapshot};
use crate::{log_op_end, log_op_error, log_op_start};

/// Initial content for `Builder::add_entity`
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntity {
    pub(crate) entity_type: String,
    pub(crate) fields: BTreeMap<String, Value>,
    pub(crate) references: BTreeMap<String, Vec<EntityId>>,
}

impl NewEntity {
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            fields: BTreeMap::new(),
            references: BTreeMap::new(),
        }
    }

    pub fn of<T: EntityKind>() -> Self {
        Self::new(T::NAME)
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_references(
        mut self,
        name: impl Into<String>,
        targets: impl IntoIterator<Item = EntityId>,
    ) -> Self {
        self.references
            .insert(name.into(), targets.into_iter().collect());
        self
    }
}

/// Working copy of the entity graph
///
/// Construction is O(1) regardless of the base snapshot's size: the working
/// state is a persistent clone that only diverges where it is written.
/// A builder is owned by one thread at a time; fork it to work in parallel.
#[derive(Debug)]
pub struct Builder {
    pub(crate) base: Snapshot,
    pub(crate) working: Snapshot,
    pub(crate) log: Vec<Change>,
    pub(crate) config: EngineConfig,
}

impl Builder {
    /// Empty builder over `schema`
    pub fn new(schema: Arc<Schema>) -> Self {
        Self::from_snapshot(&Snapshot::empty(schema))
    }

    /// Builder whose initial state is `snapshot`; the snapshot itself is
    /// never affected by later writes
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            base: snapshot.clone(),
            working: snapshot.clone(),
            log: Vec::new(),
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn schema(&self) -> &Arc<Schema> {
        self.working.schema()
    }

    /// The snapshot this builder started from
    pub fn base(&self) -> &Snapshot {
        &self.base
    }

    /// Current working state, including unmaterialized writes
    pub fn current(&self) -> &Snapshot {
        &self.working
    }

    /// Recorded changes, oldest first
    pub fn changes(&self) -> &[Change] {
        &self.log
    }

    pub fn has_changes(&self) -> bool {
        !self.log.is_empty()
    }

    /// Create an entity and return its fresh id
    ///
    /// # Errors
    ///
    /// Returns a schema violation (`UnknownEntityType`, `AbstractInstantiation`,
    /// `MissingField`, `FieldKindMismatch`, ...) or `DanglingReference` if a
    /// referenced entity does not exist. Nothing is recorded on failure.
    pub fn add_entity(&mut self, entity: NewEntity) -> Result<EntityId> {
        let started = Instant::now();
        log_op_start!("add_entity", entity_type = entity.entity_type.as_str());

        let id = EntityId::new();
        let result = self
            .commit(Change::Add {
                id,
                entity_type: entity.entity_type,
                fields: entity.fields,
                references: entity.references,
            })
            .map(|()| id);
        finish("add_entity", started, result)
    }

    /// Modify an entity through a typed handle
    ///
    /// `T` may be the entity's runtime type or any ancestor, abstract types
    /// included. Only the fields and references the closure writes are
    /// recorded; a closure that writes nothing records nothing.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` if `id` does not exist, `TypeMismatch` if the
    /// runtime type is not `T` or a subtype of it, and the usual schema and
    /// reference errors for the written values.
    pub fn modify_entity<T, F>(&mut self, id: EntityId, mutator: F) -> Result<()>
    where
        T: EntityKind,
        F: FnOnce(&mut Modifiable<'_, T>),
    {
        let started = Instant::now();
        log_op_start!("modify_entity", entity_id = %id, handle = T::NAME);
        let result = self.modify_typed(id, mutator);
        finish("modify_entity", started, result)
    }

    /// Remove an entity using the configured removal mode
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` if `id` does not exist, or `ReferencedEntity`
    /// if it is still referenced and the mode is `Reject`.
    pub fn remove_entity(&mut self, id: EntityId) -> Result<()> {
        let mode = self.config.removal;
        self.remove_entity_with(id, &mode)
    }

    /// Remove an entity, letting `policy` decide whether to cascade
    ///
    /// # Errors
    ///
    /// Same as [`Builder::remove_entity`].
    pub fn remove_entity_with(&mut self, id: EntityId, policy: &dyn RemovalPolicy) -> Result<()> {
        let started = Instant::now();
        log_op_start!("remove_entity", entity_id = %id);
        let result = self.remove_with_policy(id, policy);
        finish("remove_entity", started, result)
    }

    /// # Errors
    ///
    /// Returns `EntityNotFound` if no entity with that id exists.
    pub fn resolve_reference(&self, id: EntityId) -> Result<&Arc<Entity>> {
        self.working.resolve_reference(id)
    }

    /// # Errors
    ///
    /// Returns `UnknownEntityType` if the schema has no such type.
    pub fn entities_of_type(&self, type_name: &str) -> Result<EntitiesOfType<'_>> {
        self.working.entities_of_type(type_name)
    }

    /// # Errors
    ///
    /// Returns `UnknownEntityType` if `T` was never registered.
    pub fn entities<T: EntityKind>(&self) -> Result<EntitiesOfType<'_>> {
        self.working.entities::<T>()
    }

    /// # Errors
    ///
    /// Returns `EntityNotFound` if no entity with that id exists.
    pub fn view(&self, id: EntityId) -> Result<EntityView<'_>> {
        self.working.view(id)
    }

    /// Materialize the current state as an immutable snapshot
    ///
    /// Does not consume or reset the builder; calling it again without
    /// further writes yields an equal snapshot.
    ///
    /// # Errors
    ///
    /// With `validate_on_materialize`, returns the first invariant violation
    /// found (`DanglingReference`, `BackReferenceMismatch`, ...).
    pub fn to_storage(&self) -> Result<Snapshot> {
        let started = Instant::now();
        log_op_start!("to_storage", change_count = self.log.len());
        let result = self.materialize();
        if let Ok(snapshot) = &result {
            tracing::debug!(op = "to_storage", entity_count = snapshot.len());
        }
        finish("to_storage", started, result)
    }

    /// Independent builder starting from this builder's current state
    ///
    /// # Errors
    ///
    /// Same as [`Builder::to_storage`].
    pub fn fork(&self) -> Result<Builder> {
        Ok(Builder::from_snapshot(&self.to_storage()?).with_config(self.config.clone()))
    }

    /// Replay `source`'s change log onto this builder
    ///
    /// See [`merge::add_diff`] for the conflict rules.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while replaying; this builder is left
    /// exactly as it was.
    pub fn add_diff(&mut self, source: &Builder) -> Result<MergeReport> {
        merge::add_diff(self, source)
    }

    fn modify_typed<T, F>(&mut self, id: EntityId, mutator: F) -> Result<()>
    where
        T: EntityKind,
        F: FnOnce(&mut Modifiable<'_, T>),
    {
        let schema = Arc::clone(self.working.schema());
        schema.get(T::NAME)?;

        let current = Arc::clone(self.working.resolve_reference(id)?);
        if !schema.is_subtype(current.entity_type(), T::NAME) {
            return Err(GraphError::TypeMismatch {
                entity_id: id.to_string(),
                expected: T::NAME.to_string(),
                actual: current.entity_type().to_string(),
            });
        }

        let mut handle = Modifiable::<T>::new(&schema, &current);
        mutator(&mut handle);
        let (fields, references) = handle.into_delta()?;
        if fields.is_empty() && references.is_empty() {
            return Ok(());
        }

        self.commit(Change::Modify {
            id,
            fields,
            references,
        })
    }

    fn remove_with_policy(&mut self, id: EntityId, policy: &dyn RemovalPolicy) -> Result<()> {
        let entity = Arc::clone(self.working.resolve_reference(id)?);
        let cascade = policy.cascade(&entity);
        self.commit(Change::Remove { id, cascade })
    }

    fn materialize(&self) -> Result<Snapshot> {
        if self.config.validate_on_materialize {
            validation::validate_snapshot(&self.working)?;
        }
        Ok(self.working.clone().stamped())
    }

    /// Apply to the working state and record; on error neither happens
    fn commit(&mut self, change: Change) -> Result<()> {
        self.working = apply(self.working.clone(), &change)?;
        self.log.push(change);
        Ok(())
    }
}

impl From<&Snapshot> for Builder {
    fn from(snapshot: &Snapshot) -> Self {
        Builder::from_snapshot(snapshot)
    }
}

fn finish<R>(op: &'static str, started: Instant, result: Result<R>) -> Result<R> {
    let duration_ms = elapsed_ms(started);
    match &result {
        Ok(_) => {
            log_op_end!(op, duration_ms = duration_ms);
        }
        Err(err) => {
            log_op_error!(op, err.clone(), duration_ms = duration_ms);
        }
    }
    result
}
