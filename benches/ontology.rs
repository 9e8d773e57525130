use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use genesig::{
    AnnotationRecord, EvidenceCode, EvidenceMask, GoGraph, GoTermId, Namespace, Relation,
    TermRecord,
};

/// A DAG where every term below the root has one or two parents with a lower id
fn synthetic_terms(n: u32) -> Vec<TermRecord> {
    (1..=n)
        .map(|id| {
            let record = TermRecord::new(id, &format!("term {id}"), Namespace::BiologicalProcess);
            match id {
                1 => record,
                2 | 3 => record.with_parent(1u32, Relation::IsA),
                _ => record
                    .with_parent(id / 2, Relation::IsA)
                    .with_parent(id / 3, Relation::PartOf),
            }
        })
        .collect()
}

fn synthetic_annotations(n_terms: u32, n_genes: u32) -> Vec<AnnotationRecord> {
    (0..n_genes)
        .flat_map(|gene| {
            let name = format!("gene{gene}");
            (0..3u32).map(move |k| {
                let term = 1 + (gene * 7 + k * 131) % n_terms;
                AnnotationRecord::new(&name, term, EvidenceCode::Ida)
            })
        })
        .collect()
}

fn load_benchmark(c: &mut Criterion) {
    let terms = synthetic_terms(20_000);
    let annotations = synthetic_annotations(20_000, 10_000);
    c.bench_function("load graph", |b| {
        b.iter(|| {
            let (graph, _) =
                GoGraph::load(black_box(terms.clone()), black_box(annotations.clone()));
            graph.len()
        })
    });
}

fn closure_benchmark(c: &mut Criterion) {
    let (graph, _) = GoGraph::load(synthetic_terms(20_000), synthetic_annotations(20_000, 10_000));
    let ids: Vec<GoTermId> = (10_000..10_500u32).map(GoTermId::from).collect();

    c.bench_function("ancestors", |b| {
        b.iter(|| {
            ids.iter()
                .map(|id| graph.ancestors(black_box(*id)).map_or(0, |a| a.len()))
                .sum::<usize>()
        })
    });

    c.bench_function("genes annotated to root", |b| {
        b.iter(|| {
            graph
                .genes_annotated_to(
                    black_box(GoTermId::from(1u32)),
                    EvidenceMask::all(),
                    None,
                    true,
                )
                .map_or(0, |genes| genes.len())
        })
    });
}

criterion_group! {
    name = ontology;
    config = Criterion::default().sample_size(20).measurement_time(Duration::from_secs(10));
    targets = load_benchmark, closure_benchmark
}
criterion_main!(ontology);
