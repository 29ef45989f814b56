//! Cache strategy benchmarks
//!
//! Compares keeping the signal group on the instance with keeping it in the
//! type's side table, for group access and for changing assignments.
//!
//! Run with: cargo bench --bench cache_strategy

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use evented_core::{CacheStrategy, EventedConfig, EventedType, Field, Record, RecordShape};

struct Point {
    x: f64,
    y: f64,
}

impl Point {
    fn x() -> Field<Self, f64> {
        Field::new("x", |p| &p.x, |p| &mut p.x)
    }

    fn y() -> Field<Self, f64> {
        Field::new("y", |p| &p.y, |p| &mut p.y)
    }
}

impl Record for Point {
    fn shape() -> RecordShape<Self> {
        RecordShape::mutable().field(Point::x()).field(Point::y())
    }
}

fn configured(strategy: CacheStrategy) -> EventedType<Point> {
    let config = EventedConfig::new().cache_on_instance(strategy == CacheStrategy::OnInstance);
    // Benchmarks abort on a broken configuration.
    EventedType::configure(&config).expect("point configures")
}

const STRATEGIES: [CacheStrategy; 2] = [CacheStrategy::OnInstance, CacheStrategy::SideTable];

fn bench_events_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("events_access");
    for strategy in STRATEGIES {
        let ty = configured(strategy);
        let point = ty.wrap(Point { x: 0.0, y: 0.0 });
        point.events().expect("group builds");

        let id = BenchmarkId::from_parameter(format!("{strategy:?}"));
        group.bench_with_input(id, &point, |b, point| b.iter(|| black_box(point.events())));
    }
    group.finish();
}

fn bench_changing_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("changing_set");
    for strategy in STRATEGIES {
        let ty = configured(strategy);
        let mut point = ty.wrap(Point { x: 0.0, y: 0.0 });
        point
            .events()
            .expect("group builds")
            .field(Point::x())
            .expect("x is tracked")
            .connect(|x| {
                black_box(x);
            });

        let mut next = 0.0;
        group.bench_function(BenchmarkId::from_parameter(format!("{strategy:?}")), |b| {
            b.iter(|| {
                next += 1.0;
                black_box(point.set(Point::x(), next))
            })
        });
    }
    group.finish();
}

fn bench_first_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("first_access");
    for strategy in STRATEGIES {
        let ty = configured(strategy);
        group.bench_function(BenchmarkId::from_parameter(format!("{strategy:?}")), |b| {
            b.iter(|| {
                let point = ty.wrap(Point { x: 0.0, y: 0.0 });
                black_box(point.events().map(|events| events.len()))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_events_access, bench_changing_set, bench_first_access);
criterion_main!(benches);
