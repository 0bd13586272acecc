//! An entity carrying a system-state component survives its own disposal
//! as a ghost until that component is explicitly removed.

use ecs_runtime::{ComponentTypeDescriptor, World};

#[test]
fn ghost_entity_keeps_system_state_component_until_removed() {
    let mut world = World::new();
    let system_state = world
        .register_component(ComponentTypeDescriptor::new(0, "Linked").system_state())
        .unwrap();
    let regular = world
        .register_component(ComponentTypeDescriptor::new(0, "Position").tag())
        .unwrap();

    let entity = world.create_entity();
    world.create_component(entity, system_state, None).unwrap();
    world.create_component(entity, regular, None).unwrap();

    world.despawn_deferred(entity);
    world.execute(0.016, 0.0).unwrap();

    assert!(world.is_alive(entity), "ghost survives while system-state remains");
    assert!(!world.has_component(entity, regular), "ordinary components are torn down");
    assert!(world.has_component(entity, system_state), "the system-state component survives");

    world.remove_component(entity, system_state, true);
    assert!(!world.is_alive(entity), "removing the last system-state component finalizes disposal");
}
