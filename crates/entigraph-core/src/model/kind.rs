use super::schema::EntityType;

/// Compile-time handle for an entity type
///
/// Implementors are zero-sized markers that name a registered type and know
/// how to declare it. They give typed access to `Builder::modify_entity` and
/// `Snapshot::entities` without passing type names around as strings.
pub trait EntityKind {
    /// Registered type name
    const NAME: &'static str;

    /// Declaration used when registering this kind with a `Schema`
    fn entity_type() -> EntityType;
}
