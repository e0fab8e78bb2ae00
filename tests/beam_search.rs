use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use beamkd::catalog::RuleSetCatalog;
use beamkd::datatype::AttributeKind;
use beamkd::export::export_results;
use beamkd::interface::{CancelToken, SearchInterface};
use beamkd::mapper::{MapperRule, RuleKind};
use beamkd::measure::{MeasureRegistry, QualityMeasure};
use beamkd::search::{BeamSearch, MinSupport, SearchParams};
use beamkd::statements::StatementMatrix;
use beamkd::table::{Attribute, DataTable, ImportOptions};

fn five_records() -> StatementMatrix {
    let attributes = vec![
        Attribute::new("x", AttributeKind::Numeric { range: None }),
        Attribute::new("y", AttributeKind::Categoric { categories: None }),
    ];
    let rows = vec![vec!["3", "a"], vec!["7", "b"], vec!["12", "a"], vec!["15", "b"], vec!["20", "a"]];
    let table = DataTable::from_rows("five", attributes, &rows, None, &ImportOptions::default()).expect("table");
    let rules = vec![
        MapperRule::targeting(RuleKind::Cutoffs { thresholds: vec![10.0] }, "x"),
        MapperRule::new(RuleKind::CategoricEquality),
    ];
    StatementMatrix::build("five_statements", &table, &rules).expect("matrix")
}

/// 40 records over four attributes with a planted pattern: `a` is even exactly when `b=yes`.
fn planted() -> StatementMatrix {
    let attributes = vec![
        Attribute::new("a", AttributeKind::Integer),
        Attribute::new("b", AttributeKind::Categoric { categories: None }),
        Attribute::new("c", AttributeKind::Numeric { range: None }),
        Attribute::new("d", AttributeKind::Categoric { categories: None }),
    ];
    let rows: Vec<Vec<String>> = (0..40)
        .map(|i| {
            vec![
                i.to_string(),
                if i % 2 == 0 { "yes" } else { "no" }.to_string(),
                ((i * 7) % 13).to_string(),
                ["p", "q", "r"][i % 3].to_string(),
            ]
        })
        .collect();
    let labels: Vec<Vec<String>> = (0..40).map(|i| if i % 4 == 0 { vec!["target".to_string()] } else { vec![] }).collect();
    let table = DataTable::from_rows("planted", attributes, &rows, Some(labels), &ImportOptions::default()).expect("table");
    let rules = RuleSetCatalog::default().resolve("CATEGORIC_EQUALITY|{EVEN_ODD,IRREGULAR_2_CUTOFFS_CLUSTERING}").expect("rules");
    StatementMatrix::build("planted_statements", &table, &rules).expect("matrix")
}

fn search(matrix: &StatementMatrix, params: SearchParams) -> beamkd::search::SearchResult {
    BeamSearch::new(params, &MeasureRegistry::default())
        .expect("valid parameters")
        .run(matrix, &CancelToken::new())
        .expect("search runs")
}

#[test]
fn five_record_scenario() {
    let matrix = five_records();
    let names: Vec<&str> = matrix.statements().iter().map(|s| s.name()).collect();
    assert_eq!(names, ["x<10", "x>=10", "y=a", "y=b"]);
    let params = SearchParams { beam_width: 2, max_depth: 2, min_support: MinSupport::Fraction(0.2), ..SearchParams::default() };
    let result = search(&matrix, params);
    assert!(!result.candidates.is_empty());
    assert!(result.candidates.iter().all(|c| c.support >= 1), "support below one record");
    assert!(result.beam_sizes.iter().all(|&size| size <= 2), "beam sizes {:?}", result.beam_sizes);
    assert_eq!(result.depth_reached, 2);

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("five.results");
    export_results(&result, &path).expect("export");
    let text = fs::read_to_string(&path).expect("read back");
    let rows: Vec<&str> = text.lines().filter(|l| !l.starts_with('#')).skip(1).collect();
    assert_eq!(rows.len(), result.candidates.len());
    for row in rows {
        let support: u64 = row.split('\t').nth(2).expect("support column").parse().expect("a count");
        assert!(support >= 1, "{row}");
    }
}

#[test]
fn support_never_grows_when_adding_statements() {
    let matrix = planted();
    let params = SearchParams { beam_width: 10, max_depth: 3, num_results: 50, ..SearchParams::default() };
    let result = search(&matrix, params);
    for candidate in &result.candidates {
        let mut support = matrix.support(candidate.statements[0]).expect("column").clone();
        for &i in &candidate.statements[1..] {
            support &= matrix.support(i).expect("column");
        }
        assert_eq!(support.len(), candidate.support, "reported support matches the conjunction");
        for extra in 0..matrix.len() {
            if candidate.statements.contains(&extra) {
                continue;
            }
            let extended = &support & matrix.support(extra).expect("column");
            assert!(extended.len() <= support.len());
        }
    }
}

#[test]
fn beam_never_exceeds_width() {
    let matrix = planted();
    for width in [1, 3, 7] {
        let result = search(&matrix, SearchParams { beam_width: width, max_depth: 4, ..SearchParams::default() });
        assert!(result.beam_sizes.iter().all(|&size| size <= width), "width {width}: {:?}", result.beam_sizes);
    }
}

#[test]
fn minimum_support_prunes() {
    let matrix = planted();
    let params = SearchParams { min_support: MinSupport::Count(8), max_depth: 4, num_results: 100, ..SearchParams::default() };
    let result = search(&matrix, params);
    assert!(result.nodes_pruned > 0);
    assert!(result.nodes_created >= result.nodes_pruned);
    assert!(result.candidates.iter().all(|c| c.support >= 8));
    let fraction = SearchParams { min_support: MinSupport::Fraction(0.25), max_depth: 4, num_results: 100, ..SearchParams::default() };
    assert!(search(&matrix, fraction).candidates.iter().all(|c| c.support >= 10));
}

#[test]
fn results_are_ranked_and_never_empty_conjunctions() {
    let matrix = planted();
    let result = search(&matrix, SearchParams { num_results: 15, ..SearchParams::default() });
    assert!(result.candidates.len() <= 15);
    assert!(result.candidates.iter().all(|c| !c.statements.is_empty()));
    assert!(result.candidates.windows(2).all(|w| w[0].quality >= w[1].quality));
    let distinct: HashSet<&Vec<usize>> = result.candidates.iter().map(|c| &c.statements).collect();
    assert_eq!(distinct.len(), result.candidates.len(), "no candidate reported twice");
    assert_eq!(result.baseline, 0.0, "lift of the empty conjunction");
}

#[test]
fn distinct_attributes_are_respected() {
    let matrix = planted();
    let attribute = |i: usize| matrix.statement(i).and_then(|s| s.attribute()).expect("attribute");
    let params = SearchParams { max_depth: 2, num_results: 1000, measure: "frequency".into(), ..SearchParams::default() };
    let result = search(&matrix, params.clone());
    for candidate in &result.candidates {
        let attributes: HashSet<&str> = candidate.statements.iter().map(|&i| attribute(i)).collect();
        assert_eq!(attributes.len(), candidate.statements.len(), "{:?}", candidate.names);
    }
    let mixed = search(&matrix, SearchParams { distinct_attributes: false, ..params });
    assert!(mixed.candidates.iter().any(|c| {
        let attributes: HashSet<&str> = c.statements.iter().map(|&i| attribute(i)).collect();
        attributes.len() < c.statements.len()
    }));
}

#[test]
fn parallel_and_sequential_agree() {
    let matrix = planted();
    let parallel = search(&matrix, SearchParams { parallel: true, ..SearchParams::default() });
    let sequential = search(&matrix, SearchParams { parallel: false, ..SearchParams::default() });
    assert_eq!(parallel.candidates, sequential.candidates);
    assert_eq!(parallel.beam_sizes, sequential.beam_sizes);
}

#[test]
fn target_measures_find_the_planted_label() {
    let matrix = planted();
    let params = SearchParams { measure: "wracc".into(), target: Some("target".into()), max_depth: 2, ..SearchParams::default() };
    let result = search(&matrix, params);
    let best = &result.candidates[0];
    assert!(best.quality > 0.0);
    // every target record has an even index, so the best subgroup is made of even records
    assert!(best.names.iter().any(|n| n == "a%2=0" || n == "b=yes"), "{:?}", best.names);
}

#[test]
fn invalid_parameters_fail_before_searching() {
    let registry = MeasureRegistry::default();
    let invalid = [
        SearchParams { beam_width: 0, ..SearchParams::default() },
        SearchParams { max_depth: 0, ..SearchParams::default() },
        SearchParams { num_results: 0, ..SearchParams::default() },
        SearchParams { min_support: MinSupport::Fraction(-0.1), ..SearchParams::default() },
        SearchParams { min_support: MinSupport::Fraction(1.5), ..SearchParams::default() },
        SearchParams { measure: "accuracy".into(), ..SearchParams::default() },
        SearchParams { measure: "wracc".into(), target: None, ..SearchParams::default() },
    ];
    for params in invalid {
        let e = BeamSearch::new(params.clone(), &registry).expect_err("invalid");
        assert!(e.to_string().starts_with("Configuration error"), "{params:?}: {e}");
    }
    let unknown_label = SearchParams { measure: "wracc".into(), target: Some("nobody".into()), ..SearchParams::default() };
    let e = BeamSearch::new(unknown_label, &registry)
        .expect("parameters are fine")
        .run(&planted(), &CancelToken::new())
        .expect_err("label occurs nowhere");
    assert!(e.to_string().contains("nobody"), "{e}");
}

#[test]
fn cancelled_search_returns_flagged_partial_result() {
    let matrix = planted();
    let token = CancelToken::new();
    token.cancel();
    let result = BeamSearch::new(SearchParams::default(), &MeasureRegistry::default())
        .expect("valid")
        .run(&matrix, &token)
        .expect("cancellation is not an error");
    assert!(result.cancelled);
    assert_eq!(result.depth_reached, 0);
    assert!(result.candidates.is_empty());
}

#[test]
fn background_search_matches_direct_run() {
    let matrix = Arc::new(planted());
    let interface = SearchInterface::default();
    let handle = interface.start(Arc::clone(&matrix), SearchParams::default()).expect("starts");
    let background = handle.join().expect("joins");
    assert!(!background.cancelled);
    let direct = search(&matrix, SearchParams::default());
    assert_eq!(background.candidates, direct.candidates);
    let e = interface.start(matrix, SearchParams { beam_width: 0, ..SearchParams::default() });
    assert!(e.is_err(), "invalid parameters are rejected at start");
}

#[test]
fn running_search_stops_when_cancelled() {
    let (started, first_score) = mpsc::channel();
    let released = Arc::new(AtomicBool::new(false));
    let gate = Arc::clone(&released);
    let mut registry = MeasureRegistry::default();
    registry
        .register(QualityMeasure::new("gated", false, move |s| {
            let _ = started.send(());
            while !gate.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
            s.support as f64
        }))
        .expect("register");
    let interface = SearchInterface::new(Arc::new(registry));
    let params = SearchParams { measure: "gated".into(), max_depth: 4, parallel: false, ..SearchParams::default() };
    let handle = interface.start(Arc::new(planted()), params).expect("starts");

    first_score.recv().expect("the search is scoring");
    assert!(!handle.is_finished());
    handle.cancel();
    released.store(true, Ordering::SeqCst);
    let result = handle.join().expect("cancellation is not an error");
    assert!(result.cancelled);
    assert!(result.depth_reached < 4, "stopped at depth {}", result.depth_reached);
}

#[test]
fn undefined_scores_rank_last() {
    let mut registry = MeasureRegistry::default();
    registry
        .register(QualityMeasure::new("even_support", false, |s| {
            if s.support % 2 == 1 { f64::NAN } else { s.support as f64 }
        }))
        .expect("register");
    let params = SearchParams { measure: "even_support".into(), beam_width: 4, max_depth: 2, ..SearchParams::default() };
    let result = BeamSearch::new(params, &registry)
        .expect("valid")
        .run(&five_records(), &CancelToken::new())
        .expect("search runs");
    assert_eq!(result.candidates[0].quality, 2.0);
    assert!(result.candidates.iter().all(|c| !c.quality.is_nan()));
    let last = result.candidates.last().expect("candidates");
    assert_eq!(last.quality, f64::NEG_INFINITY);
    assert_eq!(last.support % 2, 1);
}
