use criterion::{Criterion, criterion_group, criterion_main};
use markdown_review_engine::{generate_changes, normalize, to_portable_annotations};
mod common;

fn bench_diff_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff");
    group.sample_size(10);

    let old = common::generate_markdown_content(100);
    let new = common::generate_edited_content(100);

    group.bench_function("normalize", |b| {
        b.iter(|| std::hint::black_box(normalize(std::hint::black_box(&old))));
    });

    group.bench_function("generate_changes", |b| {
        b.iter(|| {
            std::hint::black_box(generate_changes(
                std::hint::black_box(&old),
                std::hint::black_box(&new),
            ))
        });
    });

    let changes = generate_changes(&old, &new);
    group.bench_function("portable_annotations", |b| {
        b.iter(|| std::hint::black_box(to_portable_annotations(&old, std::hint::black_box(&changes))));
    });

    group.finish();
}

criterion_group!(benches, bench_diff_operations);
criterion_main!(benches);
