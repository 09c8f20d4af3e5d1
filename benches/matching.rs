use std::sync::Arc;
use std::time::Instant;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use seatmap::{
    AliasTable, Matcher, Pipeline, PostcodeRecord, Representative, RepresentativeIndex, RunOptions, SourceRow,
};

const AREAS: usize = 650;
const ROWS: u64 = 200_000;

fn roster() -> Vec<Representative> {
    (0..AREAS)
        .map(|i| {
            Representative::new(
                i.to_string(),
                format!("Member {i}"),
                format!("Northfield Borough Area {i}"),
                "Independent",
            )
        })
        .collect()
}

fn rows() -> impl Iterator<Item = Result<SourceRow, seatmap::SourceError>> {
    (0..ROWS).map(|i| {
        // One in ten names misses the exact tier so the cache sees fuzzy work.
        let area = if i % 10 == 0 {
            format!("Area {} Northfield", i % AREAS as u64)
        } else {
            format!("Northfield Borough Area {}", i % AREAS as u64)
        };
        Ok(SourceRow::Record(PostcodeRecord {
            row: i + 2,
            postcode: format!("NF{} {}AB", i % 99, i % 10),
            area_name: area,
            is_active: true,
            auxiliary: Vec::new(),
        }))
    })
}

fn bench_match_area(c: &mut Criterion) {
    let index = RepresentativeIndex::build(&roster()).unwrap();
    let matcher = Matcher::new(Arc::new(index), Arc::new(AliasTable::boundary_review_2024()));

    let mut group = c.benchmark_group("matching");
    group.throughput(Throughput::Elements(1));
    group.bench_function("exact", |b| {
        b.iter(|| matcher.match_area("Northfield Borough Area 321"));
    });
    group.bench_function("fuzzy_fallthrough", |b| {
        b.iter(|| matcher.match_area("Area 321 Northfield Borough"));
    });
    group.bench_function("unmatched", |b| {
        b.iter(|| matcher.match_area("Nowhere In Particular"));
    });
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);
    group.throughput(Throughput::Elements(ROWS));

    for workers in [1usize, 4] {
        group.bench_function(format!("run_{workers}_workers"), |b| {
            b.iter_custom(|iters| {
                let pipeline = Pipeline::new(
                    &roster(),
                    AliasTable::new(),
                    RunOptions {
                        match_workers: workers,
                        progress_interval: 0,
                        ..RunOptions::default()
                    },
                )
                .unwrap();

                let start = Instant::now();
                for _ in 0..iters {
                    let _ = pipeline.run(rows()).unwrap();
                }
                start.elapsed()
            });
        });
    }
    group.finish();
}

criterion_group!(matching, bench_match_area, bench_pipeline);
criterion_main!(matching);
