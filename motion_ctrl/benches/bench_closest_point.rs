//! # Path Evaluation Benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use motion_lib::{path_follow::closest_point, CubicPath};
use nalgebra::Vector2;

fn path_benchmark(c: &mut Criterion) {
    // ---- Build an S shaped test path ----

    let path = CubicPath::new([
        0.0, 2.0, 0.0, 0.0,
        0.0, 0.0, 3.0, -2.0
    ])
    .unwrap();

    let position_m = Vector2::new(1.2, 0.4);

    // Closest point search, run once per path following step
    c.bench_function("path_follow::closest_point", |b| {
        b.iter(|| closest_point(black_box(&path), black_box(&position_m)))
    });

    // Full arc length, run once at the start of each trajectory
    c.bench_function("CubicPath::arc_length", |b| {
        b.iter(|| black_box(&path).arc_length(black_box(1.0)))
    });
}

criterion_group!(benches, path_benchmark);
criterion_main!(benches);
