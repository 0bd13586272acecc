//! End-to-end entity lifecycle: detached -> active -> removed -> dead.

use ecs_runtime::{ComponentTypeDescriptor, FieldSchema, World, KIND_NUMBER};

#[test]
fn entity_moves_through_every_lifecycle_state() {
    let mut world = World::new();
    let position = world
        .register_component(
            ComponentTypeDescriptor::new(0, "Position")
                .with_field(FieldSchema::new("x", KIND_NUMBER).with_default(ecs_runtime::FieldData::Number(0.0))),
        )
        .unwrap();

    let detached = world.create_detached_entity();
    assert!(!world.is_alive(detached) || world.get_entity_by_uuid(&uuid::Uuid::nil()).is_none());
    // Detached entities exist in the arena but are not resolvable by UUID yet.
    let uuid_before_activation = world.entity_uuid(detached).unwrap();

    world.add_entity(detached);
    assert!(world.is_alive(detached));
    let found = world
        .get_entity_by_uuid(&uuid::Uuid::parse_str(&uuid_before_activation).unwrap())
        .unwrap();
    assert_eq!(found, detached);

    world.create_component(detached, position, None).unwrap();
    assert!(world.has_component(detached, position));

    world.despawn_immediate(detached).unwrap();
    assert!(!world.is_alive(detached));
    assert!(world
        .get_entity_by_uuid(&uuid::Uuid::parse_str(&uuid_before_activation).unwrap())
        .is_none());
}

#[test]
fn deferred_despawn_only_takes_effect_after_execute() {
    let mut world = World::new();
    let entity = world.create_entity();
    world.despawn_deferred(entity);
    assert!(world.is_alive(entity), "deferred despawn must not be immediate");

    world.execute(0.016, 0.0).unwrap();
    assert!(!world.is_alive(entity));
}
