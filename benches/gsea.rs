use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use genesig::{
    ExpressionMatrix, GeneSet, GeneSetCollection, GseaConfig, GseaEngine, NoProgress,
    PermutationMode, Sample,
};

const GENES: usize = 2_000;

fn matrix(per_class: usize) -> ExpressionMatrix {
    let mut rng = StdRng::seed_from_u64(3);
    let genes: Vec<String> = (0..GENES).map(|g| format!("gene{g}")).collect();
    let samples = (0..2 * per_class)
        .map(|s| {
            let class = if s < per_class { "tumor" } else { "normal" };
            let shift = if s < per_class { 2.0 } else { 0.0 };
            let values: Vec<f64> = (0..GENES)
                .map(|g| {
                    let up = if g < 100 { shift } else { 0.0 };
                    8.0 + up + rng.random_range(-2.0..2.0)
                })
                .collect();
            Sample::new(&format!("s{s}"), values).with_label("class", class)
        })
        .collect();
    ExpressionMatrix::new(genes, samples).expect("valid matrix")
}

fn collection() -> GeneSetCollection {
    GeneSetCollection::from_sets((0..200).map(|set| {
        let members: Vec<String> = (0..25)
            .map(|k| format!("gene{}", (set * 11 + k * 79) % GENES))
            .collect();
        GeneSet::new(["bench"], &format!("set {set}"), members)
    }))
    .expect("unique set names")
}

/// `RUST_LOG=debug` shows the log output of the engine
fn init_logging() {
    if std::env::var_os("RUST_LOG").is_some() {
        let _ = simple_logger::SimpleLogger::new().env().init();
    }
}

fn class_label_benchmark(c: &mut Criterion) {
    init_logging();
    let matrix = matrix(10);
    let sets = collection();
    let config = GseaConfig::default().with_permutations(100, PermutationMode::ClassLabel);
    let engine = GseaEngine::new(config).expect("valid config");

    c.bench_function("GSEA class label 100", |b| {
        b.iter(|| {
            engine
                .run(black_box(&matrix), "class", &sets, &NoProgress, None)
                .expect("gsea succeeds")
                .len()
        })
    });
}

fn preranked_benchmark(c: &mut Criterion) {
    init_logging();
    let ranking: Vec<(String, f64)> = (0..GENES)
        .map(|g| (format!("gene{g}"), 1.0 - 2.0 * rank_fraction(g)))
        .collect();
    let sets = collection();
    let config = GseaConfig::default().with_permutations(1_000, PermutationMode::GeneOrder);
    let engine = GseaEngine::new(config).expect("valid config");

    c.bench_function("GSEA preranked 1000", |b| {
        b.iter(|| {
            engine
                .gsea_preranked(black_box(&ranking), &sets, &NoProgress, None)
                .expect("gsea succeeds")
                .len()
        })
    });
}

#[allow(clippy::cast_precision_loss)]
fn rank_fraction(g: usize) -> f64 {
    g as f64 / GENES as f64
}

criterion_group! {
    name = gsea;
    config = Criterion::default().sample_size(10).measurement_time(Duration::from_secs(20));
    targets = class_label_benchmark, preranked_benchmark
}
criterion_main!(gsea);
