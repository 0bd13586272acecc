//! Criterion benchmarks for query membership maintenance and a
//! multi-system tick over a populated world.

use criterion::{criterion_group, criterion_main, Criterion};
use ecs_runtime::{ComponentTypeDescriptor, FieldData, FieldSchema, System, SystemQueryConfig, World, KIND_NUMBER};
use std::any::Any;
use std::hint::black_box;

struct MoveSystem {
    position: ecs_runtime::ComponentTypeId,
    velocity: ecs_runtime::ComponentTypeId,
}

impl System for MoveSystem {
    fn name(&self) -> &str {
        "move"
    }

    fn query_config(&self) -> SystemQueryConfig {
        SystemQueryConfig::new(vec![self.position, self.velocity])
    }

    fn execute(&mut self, world: &mut World, delta: f64, _time: f64) {
        let key = world.ensure_query(&[self.position, self.velocity], &[], false).unwrap();
        let entities = world.query_entities(&key).unwrap().to_vec();
        for entity in entities {
            let dx = {
                let vel = world.get_component(entity, self.velocity).unwrap();
                match vel.get("x") {
                    Some(FieldData::Number(n)) => *n,
                    _ => 0.0,
                }
            };
            let mut pos = world.get_mutable_component(entity, self.position).unwrap();
            let current = match pos.get("x") {
                Some(FieldData::Number(n)) => *n,
                _ => 0.0,
            };
            pos.set("x", FieldData::Number(current + dx * delta));
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn populated_world(entity_count: usize) -> World {
    let mut world = World::new();
    let position = world
        .register_component(
            ComponentTypeDescriptor::new(0, "Position")
                .with_field(FieldSchema::new("x", KIND_NUMBER).with_default(FieldData::Number(0.0))),
        )
        .unwrap();
    let velocity = world
        .register_component(
            ComponentTypeDescriptor::new(0, "Velocity")
                .with_field(FieldSchema::new("x", KIND_NUMBER).with_default(FieldData::Number(1.0))),
        )
        .unwrap();

    world
        .register_system(Box::new(MoveSystem { position, velocity }), 0)
        .unwrap();

    for i in 0..entity_count {
        let entity = world.create_entity();
        world.create_component(entity, position, None).unwrap();
        if i % 2 == 0 {
            world.create_component(entity, velocity, None).unwrap();
        }
    }
    world
}

fn bench_query_membership_maintenance(c: &mut Criterion) {
    c.bench_function("query_reconcile_on_component_toggle", |b| {
        let mut world = populated_world(1_000);
        let position = world.component_type_id("Position").unwrap();
        let velocity = world.component_type_id("Velocity").unwrap();
        let entity = world.create_entity();
        world.create_component(entity, position, None).unwrap();

        b.iter(|| {
            world.create_component(entity, velocity, None).unwrap();
            world.remove_component(entity, velocity, true);
            black_box(&world);
        });
    });
}

fn bench_multi_system_tick(c: &mut Criterion) {
    c.bench_function("tick_1000_entities", |b| {
        let mut world = populated_world(1_000);
        b.iter(|| {
            world.execute(0.016, 0.0).unwrap();
        });
    });
}

criterion_group!(benches, bench_query_membership_maintenance, bench_multi_system_tick);
criterion_main!(benches);
