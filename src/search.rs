//! Beam search over conjunctions of statements.
//!
//! Starting from the empty conjunction, every depth extends each candidate of
//! the current beam by one statement with a larger column index than any it
//! already holds, drops extensions below the minimum support, scores the rest
//! and keeps the best `beam_width` of them as the next beam. The best
//! candidates seen at any depth form the result.

use std::cmp::Ordering;
use std::time::Instant;

use rayon::prelude::*;
use roaring::RoaringTreemap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{MinerError, Result};
use crate::interface::CancelToken;
use crate::measure::{CandidateStats, LIFT, MeasureRegistry, QualityMeasure};
use crate::statements::StatementMatrix;

pub const ASSOCIATION_BEAMSEARCH: &str = "ASSOCIATION_BEAMSEARCH";

// ------------- Parameters -------------
/// Minimum support, either as a record count or as a fraction of the population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MinSupport {
    Count(u64),
    Fraction(f64),
}

impl MinSupport {
    /// Smallest number of records a candidate must cover.
    pub fn records(&self, population: u64) -> u64 {
        match self {
            MinSupport::Count(c) => *c,
            MinSupport::Fraction(f) => (f * population as f64 - 1e-9).ceil().max(0.0) as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    pub beam_width: usize,
    pub max_depth: usize,
    pub min_support: MinSupport,
    pub num_results: usize,
    pub measure: String,
    pub target: Option<String>,
    pub distinct_attributes: bool,
    pub parallel: bool,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            beam_width: 20,
            max_depth: 5,
            min_support: MinSupport::Count(1),
            num_results: 10,
            measure: LIFT.to_string(),
            target: None,
            distinct_attributes: true,
            parallel: true,
        }
    }
}

impl SearchParams {
    pub fn validate(&self) -> Result<()> {
        let fail = |message: String| Err(MinerError::configuration(message));
        if self.beam_width == 0 {
            return fail("beam_width must be at least 1".into());
        }
        if self.max_depth == 0 {
            return fail("max_depth must be at least 1".into());
        }
        if self.num_results == 0 {
            return fail("num_results must be at least 1".into());
        }
        if let MinSupport::Fraction(f) = self.min_support {
            if !(0.0..=1.0).contains(&f) {
                return fail(format!("min_support fraction {f} is outside [0, 1]"));
            }
        }
        Ok(())
    }
}

// ------------- Results -------------
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Column indices, ascending.
    pub statements: Vec<usize>,
    pub names: Vec<String>,
    pub support: u64,
    pub quality: f64,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub matrix: String,
    pub matrix_fingerprint: String,
    pub measure: String,
    pub population: u64,
    /// Quality of the empty conjunction.
    pub baseline: f64,
    /// Best first, at most `num_results`.
    pub candidates: Vec<Candidate>,
    /// Retained beam size at depths 1, 2, ...
    pub beam_sizes: Vec<usize>,
    pub nodes_created: u64,
    pub nodes_pruned: u64,
    pub depth_reached: usize,
    pub cancelled: bool,
}

// ------------- Search -------------
struct Node {
    statements: Vec<usize>,
    groups: Vec<usize>,
    support: RoaringTreemap,
    quality: f64,
}

fn rank(a: &Node, b: &Node) -> Ordering {
    b.quality.total_cmp(&a.quality).then_with(|| a.statements.cmp(&b.statements))
}

#[derive(Debug, Clone)]
pub struct BeamSearch {
    params: SearchParams,
    measure: QualityMeasure,
}

impl BeamSearch {
    pub fn new(params: SearchParams, measures: &MeasureRegistry) -> Result<Self> {
        params.validate()?;
        let measure = measures.get(&params.measure)?;
        if measure.needs_target() && params.target.is_none() {
            return Err(MinerError::configuration(format!(
                "quality measure '{}' needs a target label",
                measure.name()
            )));
        }
        Ok(Self { params, measure })
    }

    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    pub fn run(&self, matrix: &StatementMatrix, cancel: &CancelToken) -> Result<SearchResult> {
        let started = Instant::now();
        let params = &self.params;
        let population = matrix.population();
        let target = match &params.target {
            Some(label) => Some(matrix.label_support(label).ok_or_else(|| {
                MinerError::configuration(format!("target label '{label}' occurs in no record of matrix '{}'", matrix.id()))
            })?),
            None => None,
        };
        let min_count = params.min_support.records(population).max(1);
        let frequencies: Vec<f64> = matrix
            .statements()
            .iter()
            .map(|s| if population == 0 { 0.0 } else { s.support().len() as f64 / population as f64 })
            .collect();
        // statements sharing a source attribute share a group
        let mut attributes: Vec<&str> = Vec::new();
        let groups: Vec<usize> = matrix
            .statements()
            .iter()
            .enumerate()
            .map(|(i, s)| match s.attribute() {
                Some(a) => match attributes.iter().position(|known| *known == a) {
                    Some(g) => g,
                    None => {
                        attributes.push(a);
                        attributes.len() - 1
                    }
                },
                None => matrix.len() + i,
            })
            .collect();

        let score = |statements: &[usize], support: &RoaringTreemap| -> f64 {
            let stats = CandidateStats {
                support: support.len(),
                population,
                frequencies: statements.iter().map(|&i| frequencies[i]).collect(),
                target_hits: target.map(|t| (support & t).len()),
                target_total: target.map(|t| t.len()),
            };
            match self.measure.score(&stats) {
                quality if quality.is_nan() => f64::NEG_INFINITY,
                quality => quality,
            }
        };
        let expand = |node: &Node| -> (Vec<Node>, u64, u64) {
            let first = node.statements.last().map_or(0, |last| last + 1);
            let mut successors = Vec::new();
            let (mut created, mut pruned) = (0u64, 0u64);
            for next in first..matrix.len() {
                if params.distinct_attributes && node.groups.contains(&groups[next]) {
                    continue;
                }
                let Some(column) = matrix.support(next) else { continue };
                created += 1;
                let support = &node.support & column;
                if support.len() < min_count {
                    pruned += 1;
                    continue;
                }
                let mut statements = node.statements.clone();
                statements.push(next);
                let mut node_groups = node.groups.clone();
                node_groups.push(groups[next]);
                let quality = score(&statements, &support);
                successors.push(Node { statements, groups: node_groups, support, quality });
            }
            (successors, created, pruned)
        };

        let mut everything = RoaringTreemap::new();
        everything.insert_range(0..population);
        let baseline = score(&[], &everything);
        let mut beam = vec![Node { statements: Vec::new(), groups: Vec::new(), support: everything, quality: baseline }];
        let mut best: Vec<Node> = Vec::new();
        let mut beam_sizes = Vec::new();
        let (mut nodes_created, mut nodes_pruned) = (0u64, 0u64);
        let mut cancelled = false;

        for depth in 1..=params.max_depth {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let expanded: Vec<(Vec<Node>, u64, u64)> = if params.parallel {
                beam.par_iter().map(&expand).collect()
            } else {
                beam.iter().map(&expand).collect()
            };
            let mut successors = Vec::new();
            for (nodes, created, pruned) in expanded {
                successors.extend(nodes);
                nodes_created += created;
                nodes_pruned += pruned;
            }
            if successors.is_empty() {
                debug!(depth, "no successor reaches the minimum support");
                break;
            }
            successors.sort_by(rank);

            best.extend(successors.iter().take(params.num_results).map(|n| Node {
                statements: n.statements.clone(),
                groups: Vec::new(),
                support: n.support.clone(),
                quality: n.quality,
            }));
            best.sort_by(rank);
            best.truncate(params.num_results);

            successors.truncate(params.beam_width);
            beam = successors;
            beam_sizes.push(beam.len());
            debug!(depth, beam = beam.len(), best = best.first().map(|n| n.quality), "depth complete");
        }

        let candidates = best
            .into_iter()
            .map(|n| Candidate {
                names: n.statements.iter().filter_map(|&i| matrix.name(i).map(str::to_string)).collect(),
                statements: n.statements,
                support: n.support.len(),
                quality: n.quality,
            })
            .collect::<Vec<_>>();
        info!(
            matrix = matrix.id(),
            measure = self.measure.name(),
            candidates = candidates.len(),
            nodes_created,
            nodes_pruned,
            cancelled,
            ms = started.elapsed().as_millis() as u64,
            "beam search complete"
        );
        Ok(SearchResult {
            matrix: matrix.id().to_string(),
            matrix_fingerprint: matrix.fingerprint(),
            measure: self.measure.name().to_string(),
            population,
            baseline,
            candidates,
            depth_reached: beam_sizes.len(),
            beam_sizes,
            nodes_created,
            nodes_pruned,
            cancelled,
        })
    }
}
