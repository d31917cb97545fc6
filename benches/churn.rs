//! Structural churn and chunk iteration.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use entity_chunks::{Component, World};

const ENTITY_COUNT: usize = 100_000;

#[derive(Default, Clone, Copy, Component)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}

#[derive(Default, Clone, Copy, Component)]
struct Velocity {
    x: f32,
    y: f32,
    z: f32,
}

#[derive(Default, Clone, Copy, Component)]
struct Frozen;

fn populated_world() -> World {
    let mut world = World::new();
    for e in world.create_many_immediate(ENTITY_COUNT) {
        world.insert_component_immediate(e, Position { x: 1.0, y: 2.0, z: 3.0 });
        world.insert_component_immediate(e, Velocity { x: 0.1, y: 0.2, z: 0.3 });
    }
    world
}

fn bench_create_destroy(c: &mut Criterion) {
    c.bench_function("create_destroy_100k", |b| {
        b.iter_batched(
            World::new,
            |mut world| {
                let entities = world.create_many_immediate(ENTITY_COUNT);
                black_box(world.destroy_many_immediate(&entities))
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_add_remove(c: &mut Criterion) {
    let mut world = populated_world();
    let entities: Vec<_> = world
        .archetypes()
        .iter()
        .flat_map(|a| a.chunks())
        .flat_map(|chunk| chunk.entities().iter().copied())
        .step_by(10)
        .collect();

    c.bench_function("add_remove_tag_10k", |b| {
        b.iter(|| {
            for &e in &entities {
                world.add_component_immediate::<Frozen>(e);
            }
            for &e in &entities {
                world.remove_component_immediate::<Frozen>(e);
            }
            black_box(world.entity_count())
        });
    });
}

fn bench_chunk_iteration(c: &mut Criterion) {
    let mut world = populated_world();
    let ids: Vec<_> = world
        .archetypes()
        .iter()
        .filter(|a| a.contains::<Position>() && a.contains::<Velocity>())
        .map(|a| a.id())
        .collect();

    c.bench_function("integrate_100k", |b| {
        b.iter(|| {
            for &id in &ids {
                let chunk_count = world.archetypes().get_by_id(id).map_or(0, |a| a.chunk_count());
                for index in 0..chunk_count {
                    let vel: Vec<Velocity> = match world.archetypes().get_by_id(id).and_then(|a| a.get_chunk(index)) {
                        Some(chunk) => chunk.column::<Velocity>().unwrap_or_default().to_vec(),
                        None => continue,
                    };
                    let Some(positions) = world.column_mut::<Position>(id, index) else {
                        continue;
                    };
                    for (p, v) in positions.iter_mut().zip(&vel) {
                        p.x += v.x * 0.016;
                        p.y += v.y * 0.016;
                        p.z += v.z * 0.016;
                    }
                }
            }
            black_box(world.entity_count())
        });
    });
}

criterion_group!(benches, bench_create_destroy, bench_add_remove, bench_chunk_iteration);
criterion_main!(benches);
