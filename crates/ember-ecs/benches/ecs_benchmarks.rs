//! Criterion benchmarks for the hot paths: chunk iteration, bulk creation,
//! and command-buffer flushes.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ember_ecs::prelude::*;
use serde_json::json;

fn world_with(n: u32) -> (World, ComponentTypeId, QueryId) {
    let mut world = World::new();
    let position = world
        .register_component(
            "position",
            Schema::new().field("x", FieldKind::F32).field("y", FieldKind::F32),
        )
        .unwrap();
    let mut commands = CommandBuffer::new();
    commands.create_entities(vec![(position, json!({"x": 1.0, "y": 2.0}))], n);
    commands.flush(&mut world).unwrap();
    let query = world.create_query(QuerySpec::new().with(position));
    (world, position, query)
}

fn bench_iteration(c: &mut Criterion) {
    let (world, position, query) = world_with(10_000);
    c.bench_function("iterate_10k_rows", |b| {
        b.iter(|| {
            let mut sum = 0.0f32;
            for chunk in world.read_chunks(query, 0) {
                let xs = chunk.column(position, "x").unwrap().as_f32().unwrap();
                for row in 0..chunk.count() {
                    sum += xs[row];
                }
            }
            black_box(sum)
        })
    });
}

fn bench_bulk_create(c: &mut Criterion) {
    c.bench_function("create_batch_1k", |b| {
        b.iter(|| {
            let (world, _, _) = world_with(1_000);
            black_box(world.entity_count())
        })
    });
}

fn bench_flush_moves(c: &mut Criterion) {
    c.bench_function("flush_1k_tag_moves", |b| {
        b.iter(|| {
            let (mut world, _, query) = world_with(1_000);
            let tag = world.register_tag("hot").unwrap();
            let entities = world.query_entities(query);
            let mut commands = CommandBuffer::new();
            for e in entities {
                commands.add_component(e, tag, serde_json::Value::Null);
            }
            commands.flush(&mut world).unwrap();
            black_box(world.archetype_count())
        })
    });
}

criterion_group!(
    benches,
    bench_iteration,
    bench_bulk_create,
    bench_flush_moves
);
criterion_main!(benches);
