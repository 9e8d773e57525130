use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use genesig::normalize::{center, z_scores, CenterMethod};
use genesig::stats::LowessParams;
use genesig::MaskedVec;

/// An MA cloud with a curved intensity trend
fn ma_cloud(n: u32) -> (MaskedVec, MaskedVec) {
    let (m, a): (Vec<f64>, Vec<f64>) = (0..n)
        .map(|i| {
            let a = 1.0 + 3.0 * f64::from(i) / f64::from(n);
            let m = 0.3 * (a - 2.5).powi(2) + 0.2 * (f64::from(i) * 0.37).sin();
            (m, a)
        })
        .unzip();
    (MaskedVec::from_values(m), MaskedVec::from_values(a))
}

fn center_benchmark(c: &mut Criterion) {
    let params = LowessParams::default().with_anchors(500);
    let mut group = c.benchmark_group("center");
    for n in [2_000u32, 10_000] {
        let (m, a) = ma_cloud(n);
        let input = (m.clone(), a.clone());
        group.bench_with_input(BenchmarkId::new("fast lowess", n), &input, |b, (m, a)| {
            b.iter(|| center(black_box(m), black_box(a), CenterMethod::FastLowess, &params))
        });
        if n <= 2_000 {
            group.bench_with_input(BenchmarkId::new("full lowess", n), &(m, a), |b, (m, a)| {
                b.iter(|| center(black_box(m), black_box(a), CenterMethod::FullLowess, &params))
            });
        }
    }
    group.finish();
}

fn z_score_benchmark(c: &mut Criterion) {
    let (m, a) = ma_cloud(20_000);
    c.bench_function("z-scores 20k", |b| {
        b.iter(|| z_scores(black_box(&m), black_box(&a), 1.0 / 3.0))
    });
}

criterion_group! {
    name = lowess;
    config = Criterion::default().sample_size(10).measurement_time(Duration::from_secs(10));
    targets = center_benchmark, z_score_benchmark
}
criterion_main!(lowess);
