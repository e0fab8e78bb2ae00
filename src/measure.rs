//! Quality measures for candidates.
//!
//! A measure is a pure function of a candidate's [`CandidateStats`]. Measures are
//! looked up by name in a [`MeasureRegistry`]; further ones can be registered.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{MinerError, Result};
use crate::table::NameHasher;

pub const LIFT: &str = "lift";
pub const NEGATIVE_LIFT: &str = "negative_lift";
pub const ABSOLUTE_LIFT: &str = "absolute_lift";
pub const FREQUENCY: &str = "frequency";
pub const AREA: &str = "area";
pub const WRACC: &str = "wracc";
pub const TARGET_SHARE: &str = "target_share";

/// Everything a measure may look at.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateStats {
    /// Records satisfying the conjunction.
    pub support: u64,
    pub population: u64,
    /// Relative frequency of each statement of the candidate on its own.
    pub frequencies: Vec<f64>,
    /// Records in the support carrying the target label.
    pub target_hits: Option<u64>,
    /// Records in the population carrying the target label.
    pub target_total: Option<u64>,
}

impl CandidateStats {
    pub fn size(&self) -> usize {
        self.frequencies.len()
    }
    pub fn frequency(&self) -> f64 {
        if self.population == 0 { 0.0 } else { self.support as f64 / self.population as f64 }
    }
    /// Frequency expected if all statements were independent.
    pub fn expected_frequency(&self) -> f64 {
        self.frequencies.iter().product()
    }
    pub fn target_share(&self) -> f64 {
        match self.target_hits {
            Some(hits) if self.support > 0 => hits as f64 / self.support as f64,
            _ => 0.0,
        }
    }
    pub fn baseline_target_share(&self) -> f64 {
        match self.target_total {
            Some(total) if self.population > 0 => total as f64 / self.population as f64,
            _ => 0.0,
        }
    }
}

pub type ScoreFn = dyn Fn(&CandidateStats) -> f64 + Send + Sync;

#[derive(Clone)]
pub struct QualityMeasure {
    name: String,
    needs_target: bool,
    score: Arc<ScoreFn>,
}

impl QualityMeasure {
    pub fn new(name: &str, needs_target: bool, score: impl Fn(&CandidateStats) -> f64 + Send + Sync + 'static) -> Self {
        Self { name: name.to_string(), needs_target, score: Arc::new(score) }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    /// True when the measure reads the target label counts.
    pub fn needs_target(&self) -> bool {
        self.needs_target
    }
    pub fn score(&self, stats: &CandidateStats) -> f64 {
        (self.score)(stats)
    }
}

impl fmt::Debug for QualityMeasure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("QualityMeasure").field("name", &self.name).field("needs_target", &self.needs_target).finish()
    }
}

pub fn lift(stats: &CandidateStats) -> f64 {
    let k = stats.size() as i32;
    (stats.frequency() - stats.expected_frequency()) / 2f64.powi(k - 2)
}

pub fn wracc(stats: &CandidateStats) -> f64 {
    if stats.support == 0 {
        return 0.0;
    }
    stats.frequency() * (stats.target_share() - stats.baseline_target_share())
}

#[derive(Debug, Clone)]
pub struct MeasureRegistry {
    measures: HashMap<String, QualityMeasure, NameHasher>,
}

impl Default for MeasureRegistry {
    fn default() -> Self {
        let mut measures = HashMap::<String, QualityMeasure, NameHasher>::default();
        let builtins = [
            QualityMeasure::new(LIFT, false, lift),
            QualityMeasure::new(NEGATIVE_LIFT, false, |s| -lift(s)),
            QualityMeasure::new(ABSOLUTE_LIFT, false, |s| lift(s).abs()),
            QualityMeasure::new(FREQUENCY, false, CandidateStats::frequency),
            QualityMeasure::new(AREA, false, |s| (s.support as f64) * s.size() as f64),
            QualityMeasure::new(WRACC, true, wracc),
            QualityMeasure::new(TARGET_SHARE, true, CandidateStats::target_share),
        ];
        for measure in builtins {
            measures.insert(measure.name.clone(), measure);
        }
        Self { measures }
    }
}

impl MeasureRegistry {
    pub fn register(&mut self, measure: QualityMeasure) -> Result<()> {
        if self.measures.contains_key(&measure.name) {
            return Err(MinerError::configuration(format!("quality measure '{}' is already registered", measure.name)));
        }
        self.measures.insert(measure.name.clone(), measure);
        Ok(())
    }
    pub fn get(&self, name: &str) -> Result<QualityMeasure> {
        self.measures.get(name).cloned().ok_or_else(|| {
            MinerError::configuration(format!(
                "unknown quality measure '{name}' (known: {})",
                self.names().join(", ")
            ))
        })
    }
    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.measures.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
