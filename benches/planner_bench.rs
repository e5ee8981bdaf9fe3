// Benchmark for raster planning and command parsing
// Run with: cargo bench

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use stage_laser::command::{ShapeRequest, SubmissionLimits};
use stage_laser::motion::planner::{Fill, FillDirection, Shape, plan};

fn bench_raster_plan(c: &mut Criterion) {
    let fill = Fill { interval: 5.0, direction: FillDirection::Vertical };
    let shape = Shape::Rectangle { x: 50_000.0, y: 50_000.0, fill: Some(fill) };
    c.bench_function("plan 10k-pass raster", |b| {
        b.iter(|| {
            let waypoints = plan(black_box(&shape), 1000);
            assert_eq!(waypoints.len(), 20_002);
        });
    });
}

fn bench_parse_submission(c: &mut Criterion) {
    let limits = SubmissionLimits::default();
    let commands: Vec<String> = (1..1000)
        .map(|i| format!("rectangle, {}, {}, {}", i * 10, i * 5, i))
        .collect();
    c.bench_function("parse 1k shape commands", |b| {
        b.iter(|| {
            let ok = commands
                .iter()
                .filter(|cmd| ShapeRequest::parse(black_box(cmd), None, &limits).is_ok())
                .count();
            assert_eq!(ok, 999);
        });
    });
}

criterion_group!(benches, bench_raster_plan, bench_parse_submission);
criterion_main!(benches);
