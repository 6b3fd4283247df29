//! Matrix-profile hot-path benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use strider_array::Array;
use strider_matrix::{mass, matrix_profile, stomp};

fn synthetic_series(n: usize) -> Array {
    let data: Vec<f64> = (0..n)
        .map(|k| (k as f64 * 0.17).sin() + 0.3 * (k as f64 * 0.03).cos())
        .collect();
    Array::from_vector(&data).expect("series construction")
}

fn bench_self_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("self_join");
    for &n in &[512usize, 2048] {
        let t = synthetic_series(n);
        group.bench_with_input(BenchmarkId::new("scamp", n), &t, |b, t| {
            b.iter(|| matrix_profile(black_box(t), 64, None).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("stomp", n), &t, |b, t| {
            b.iter(|| stomp(black_box(t), 64, None).unwrap())
        });
    }
    group.finish();
}

fn bench_mass(c: &mut Criterion) {
    let t = synthetic_series(4096);
    let q = synthetic_series(128).reshape(&[128, 1]).unwrap();
    c.bench_function("mass_4096x128", |b| {
        b.iter(|| mass(black_box(&q), black_box(&t)).unwrap())
    });
}

criterion_group!(benches, bench_self_join, bench_mass);
criterion_main!(benches);
