use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use beamkd::catalog::{DEFAULT_RULE_SET, RuleSetCatalog};
use beamkd::datatype::AttributeKind;
use beamkd::interface::CancelToken;
use beamkd::measure::MeasureRegistry;
use beamkd::search::{BeamSearch, SearchParams};
use beamkd::statements::StatementMatrix;
use beamkd::table::{Attribute, DataTable, ImportOptions};

// deterministic pseudo random values
fn lcg(seed: &mut u64) -> u64 {
    *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    *seed >> 33
}

fn table(records: usize) -> DataTable {
    let mut attributes: Vec<Attribute> =
        (0..6).map(|i| Attribute::new(format!("m{i}"), AttributeKind::Numeric { range: None })).collect();
    attributes.push(Attribute::new("c", AttributeKind::Categoric { categories: None }));
    let mut seed = 42;
    let rows: Vec<Vec<String>> = (0..records)
        .map(|_| {
            let mut row: Vec<String> = (0..6).map(|_| ((lcg(&mut seed) % 1000) as f64 / 10.0 - 20.0).to_string()).collect();
            row.push(["x", "y", "z", "w"][(lcg(&mut seed) % 4) as usize].to_string());
            row
        })
        .collect();
    DataTable::from_rows("bench", attributes, &rows, None, &ImportOptions::default()).expect("table")
}

fn statements_benchmark(c: &mut Criterion) {
    let table = table(5_000);
    let rules = RuleSetCatalog::default().resolve(DEFAULT_RULE_SET).expect("rules");
    c.bench_function("build statements", |b| {
        b.iter(|| StatementMatrix::build("bench_statements", black_box(&table), black_box(&rules)).expect("matrix"))
    });
}

fn search_benchmark(c: &mut Criterion) {
    let table = table(5_000);
    let rules = RuleSetCatalog::default().resolve(DEFAULT_RULE_SET).expect("rules");
    let matrix = StatementMatrix::build("bench_statements", &table, &rules).expect("matrix");
    let registry = MeasureRegistry::default();
    for parallel in [false, true] {
        let params = SearchParams { beam_width: 20, max_depth: 3, parallel, ..SearchParams::default() };
        let search = BeamSearch::new(params, &registry).expect("search");
        let name = if parallel { "beam search (parallel)" } else { "beam search (sequential)" };
        c.bench_function(name, |b| b.iter(|| search.run(black_box(&matrix), &CancelToken::new()).expect("result")));
    }
}

criterion_group!(benches, statements_benchmark, search_benchmark);
criterion_main!(benches);
