use std::sync::Arc;

use entigraph_core::{Builder, EntityId, EntityKind, EntityType, FieldKind, NewEntity, Schema};

/// Root of the test hierarchy
#[allow(dead_code)]
pub struct BaseEntity;

impl EntityKind for BaseEntity {
    const NAME: &'static str = "BaseEntity";
    fn entity_type() -> EntityType {
        EntityType::abstract_type(Self::NAME)
    }
}

/// Abstract composite: any subtype holds ordered `children`
#[allow(dead_code)]
pub struct CompositeBaseEntity;

impl EntityKind for CompositeBaseEntity {
    const NAME: &'static str = "CompositeBaseEntity";
    fn entity_type() -> EntityType {
        EntityType::abstract_type(Self::NAME)
            .extends(BaseEntity::NAME)
            .children("children", BaseEntity::NAME)
    }
}

#[allow(dead_code)]
pub struct LeftEntity;

impl EntityKind for LeftEntity {
    const NAME: &'static str = "LeftEntity";
    fn entity_type() -> EntityType {
        EntityType::concrete(Self::NAME).extends(CompositeBaseEntity::NAME)
    }
}

#[allow(dead_code)]
pub struct RightEntity;

impl EntityKind for RightEntity {
    const NAME: &'static str = "RightEntity";
    fn entity_type() -> EntityType {
        EntityType::concrete(Self::NAME).extends(CompositeBaseEntity::NAME)
    }
}

/// Leaf with an optional string `property`
#[allow(dead_code)]
pub struct MiddleEntity;

impl EntityKind for MiddleEntity {
    const NAME: &'static str = "MiddleEntity";
    fn entity_type() -> EntityType {
        EntityType::concrete(Self::NAME)
            .extends(BaseEntity::NAME)
            .optional_field("property", FieldKind::String)
    }
}

#[allow(dead_code)]
pub fn test_schema() -> Arc<Schema> {
    let mut schema = Schema::new();
    schema.register_kind::<BaseEntity>().unwrap();
    schema.register_kind::<CompositeBaseEntity>().unwrap();
    schema.register_kind::<LeftEntity>().unwrap();
    schema.register_kind::<RightEntity>().unwrap();
    schema.register_kind::<MiddleEntity>().unwrap();
    Arc::new(schema)
}

#[allow(dead_code)]
pub fn new_builder() -> Builder {
    Builder::new(test_schema())
}

/// Add a MiddleEntity, with `property` set when given
#[allow(dead_code)]
pub fn add_middle(builder: &mut Builder, property: Option<&str>) -> EntityId {
    let mut entity = NewEntity::of::<MiddleEntity>();
    if let Some(property) = property {
        entity = entity.with_field("property", property);
    }
    builder.add_entity(entity).unwrap()
}

#[allow(dead_code)]
pub fn add_left(builder: &mut Builder, children: &[EntityId]) -> EntityId {
    builder
        .add_entity(NewEntity::of::<LeftEntity>().with_references("children", children.to_vec()))
        .unwrap()
}

#[allow(dead_code)]
pub fn add_right(builder: &mut Builder, children: &[EntityId]) -> EntityId {
    builder
        .add_entity(NewEntity::of::<RightEntity>().with_references("children", children.to_vec()))
        .unwrap()
}

/// `property` values of a composite's children, in order
#[allow(dead_code)]
pub fn child_properties(builder: &Builder, composite: EntityId) -> Vec<Option<String>> {
    let view = builder.view(composite).unwrap();
    let composite = view.as_composite().expect("composite view");
    composite
        .children()
        .map(|child| child.str_field("property").map(str::to_string))
        .collect()
}
