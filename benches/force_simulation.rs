use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use egui::{Pos2, Rect, Vec2};
use egui_casegraph::{
    Edge, ForceSimulation, Graph, Hierarchical, LayoutSnapshot, Node, Orientation,
    SettingsSimulation,
};
use std::hint::black_box;
use std::time::Duration;

fn make_snapshot(num_nodes: usize, num_edges: usize) -> LayoutSnapshot {
    let mut g = Graph::new();
    for i in 0..num_nodes {
        // spread nodes along a line to start
        g.add_node(Node::new(format!("n{i}"), "entity").with_location(Pos2::new(i as f32 * 5.0, 0.0)))
            .unwrap();
    }
    // a chain for determinism, then some extra edges up to num_edges
    let mut edges = 0;
    for i in 1..num_nodes {
        g.add_edge(Edge::new(format!("c{i}"), format!("n{}", i - 1), format!("n{i}")))
            .unwrap();
        edges += 1;
    }
    let mut i = 0usize;
    while edges < num_edges && num_nodes >= 2 {
        let a = i % num_nodes;
        let b = (i * 37 + 11) % num_nodes;
        if a != b {
            g.add_edge(Edge::new(format!("x{i}"), format!("n{a}"), format!("n{b}")))
                .unwrap();
            edges += 1;
        }
        i += 1;
    }
    g.layout_snapshot(Vec2::splat(12.0))
}

fn bench_force_tick(c: &mut Criterion) {
    let view = Rect::from_center_size(Pos2::ZERO, Vec2::new(1200.0, 800.0));
    let settings = SettingsSimulation::default();
    let mut group = c.benchmark_group("force_ticks");
    group.sample_size(10);
    group.measurement_time(Duration::from_millis(600));
    group.warm_up_time(Duration::from_millis(200));

    let small = make_snapshot(500, 1000);
    group.bench_function("n500_m1000_ticks100", |b| {
        b.iter_batched(
            || ForceSimulation::new(&small, &settings, view).unwrap(),
            |mut sim| {
                for _ in 0..100 {
                    sim.tick();
                }
                black_box(sim);
            },
            BatchSize::SmallInput,
        );
    });

    let large = make_snapshot(10000, 20000);
    group.bench_function("n10000_m20000_ticks1", |b| {
        b.iter_batched(
            || ForceSimulation::new(&large, &settings, view).unwrap(),
            |mut sim| {
                sim.tick();
                black_box(sim);
            },
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

fn bench_hierarchical(c: &mut Criterion) {
    let snapshot = make_snapshot(500, 700);
    let layout = Hierarchical::new(&SettingsSimulation::default(), Orientation::TopDown);
    let mut group = c.benchmark_group("hierarchical");
    group.sample_size(10);
    group.bench_function("n500_m700", |b| {
        b.iter(|| black_box(layout.layout(&snapshot, Pos2::ZERO).unwrap()));
    });
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default().configure_from_args();
    targets = bench_force_tick, bench_hierarchical
}
criterion_main!(benches);
