//! Sorting performance benchmarks.
//!
//! Measures a full filter-group-sort pass of the local provider for number,
//! stack and string criteria across dataset sizes.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use futures::executor::block_on;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Value, json};

use ranktable::column::NumberFilter;
use ranktable::{ColumnDesc, ColumnId, DataProvider, LocalDataProvider, Parent, RankingId};

/// Generate rows with two numeric fields, a name and a category.
fn generate_rows(rows: usize) -> Vec<Value> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..rows)
        .map(|i| {
            let missing = rng.gen_ratio(1, 50);
            json!({
                "name": format!("item_{:06}", rng.gen_range(0..rows * 10)),
                "a": if missing { Value::Null } else { json!(rng.gen_range(0.0..100.0)) },
                "b": rng.gen_range(0.0..100.0),
                "kind": ["x", "y", "z"][i % 3],
            })
        })
        .collect()
}

fn descs() -> Vec<ColumnDesc> {
    vec![
        ColumnDesc::field("string", "name"),
        ColumnDesc::field("number", "a").with_domain([0.0, 100.0]),
        ColumnDesc::field("number", "b").with_domain([0.0, 100.0]),
        ColumnDesc::field("categorical", "kind").with_categories(["x", "y", "z"]),
    ]
}

fn setup(rows: usize, criterion: &str) -> (LocalDataProvider, RankingId, ColumnId) {
    let mut provider = LocalDataProvider::new(generate_rows(rows), descs());
    let core = provider.core_mut();
    let r = core.push_ranking();
    let column = match criterion {
        "string" => core.push(r, &descs()[0]),
        "number" => core.push(r, &descs()[1]),
        _ => {
            let stack = core.push(r, &ColumnDesc::new("stack", "Combined"));
            if let Some(stack) = stack {
                for desc in &descs()[1..3] {
                    if let Some(child) = core.create(desc) {
                        core.tree_mut().push(Parent::Column(stack), child);
                    }
                }
                core.tree_mut().set_weights(stack, &[0.3, 0.7]);
            }
            stack
        }
    };
    let column = column.expect("column");
    core.tree_mut().sort_by(r, Some(column), false);
    (provider, r, column)
}

/// Benchmark sorting by each kind of criterion.
fn bench_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort");

    for rows in [1_000, 10_000, 100_000].iter() {
        group.throughput(Throughput::Elements(*rows as u64));
        for criterion in ["number", "stack", "string"] {
            let (provider, r, _) = setup(*rows, criterion);
            group.bench_with_input(BenchmarkId::new(criterion, rows), &r, |b, &r| {
                b.iter(|| black_box(block_on(provider.sort(r)).expect("sort")))
            });
        }
    }

    group.finish();
}

/// Benchmark sorting with an active filter and grouping.
fn bench_filtered_grouped(c: &mut Criterion) {
    let mut group = c.benchmark_group("filtered_grouped");

    for rows in [10_000, 100_000].iter() {
        let (mut provider, r, column) = setup(*rows, "number");
        let core = provider.core_mut();
        let kind = core.push(r, &descs()[3]).expect("kind column");
        core.tree_mut().group_by(r, Some(kind));
        core.tree_mut()
            .set_number_filter(column, NumberFilter::between(25.0, 75.0));

        group.throughput(Throughput::Elements(*rows as u64));
        group.bench_with_input(BenchmarkId::new("rows", rows), &r, |b, &r| {
            b.iter(|| black_box(block_on(provider.sort(r)).expect("sort")))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_sort, bench_filtered_grouped);
criterion_main!(benches);
