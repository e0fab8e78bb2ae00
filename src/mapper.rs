//! Attribute-to-statement mappers.
//!
//! A [`MapperRule`] looks at one attribute of a [`DataTable`] and emits zero or
//! more [`StatementDef`]s, each a named [`Predicate`] over that attribute's value.
//! Rules are either generic (applied to every attribute of a fitting kind) or
//! targeted at one named attribute.

use std::fmt;

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::datatype::{AttributeKind, Value};
use crate::error::{MinerError, Result};
use crate::table::DataTable;

const KMEANS_ITERATIONS: usize = 25;

// ------------- Predicate -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateField {
    Year,
    Month,
    Weekday,
}

/// A test on a single value. Numeric comparisons also apply to ordinal ranks.
/// Missing values never satisfy a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    LessThan(f64),
    LessOrEquals(f64),
    GreaterThan(f64),
    GreaterOrEquals(f64),
    InClosedInterval(f64, f64),
    EqualTo(f64),
    Category(String),
    NotCategory(String),
    InCategories(Vec<String>),
    DivisibleBy(i64),
    NotDivisibleBy(i64),
    DateField(DateField, u32),
}

impl Predicate {
    pub fn holds(&self, value: &Value) -> bool {
        let number = match value {
            Value::Numeric(v) => Some(*v),
            Value::Ordinal(rank) => Some(*rank as f64),
            _ => None,
        };
        match (self, value) {
            (_, Value::Missing) => false,
            (Predicate::Category(c), Value::Categoric(s)) => c == s,
            (Predicate::NotCategory(c), Value::Categoric(s)) => c != s,
            (Predicate::InCategories(cs), Value::Categoric(s)) => cs.iter().any(|c| c == s),
            (Predicate::DateField(field, expected), Value::Date(d)) => {
                let actual = match field {
                    DateField::Year => d.year() as u32,
                    DateField::Month => d.month(),
                    DateField::Weekday => d.weekday().num_days_from_monday(),
                };
                actual == *expected
            }
            (Predicate::DivisibleBy(k), Value::Numeric(v)) => v.fract() == 0.0 && (*v as i64) % k == 0,
            (Predicate::NotDivisibleBy(k), Value::Numeric(v)) => v.fract() == 0.0 && (*v as i64) % k != 0,
            _ => match (self, number) {
                (Predicate::LessThan(t), Some(v)) => v < *t,
                (Predicate::LessOrEquals(t), Some(v)) => v <= *t,
                (Predicate::GreaterThan(t), Some(v)) => v > *t,
                (Predicate::GreaterOrEquals(t), Some(v)) => v >= *t,
                (Predicate::InClosedInterval(lo, hi), Some(v)) => *lo <= v && v <= *hi,
                (Predicate::EqualTo(t), Some(v)) => v == *t,
                _ => false,
            },
        }
    }
}

/// A statement as emitted by a rule, before it is evaluated on the table.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementDef {
    pub name: String,
    pub attribute: usize,
    pub predicate: Predicate,
}

// ------------- Rules -------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleKind {
    CategoricEquality,
    CategoricInequality,
    SmartDiscreteOrdinal,
    AboveMedian,
    PositiveAndNegative,
    StdevBands,
    /// Named cut-offs found by one-dimensional k-means.
    Clustering { cutoffs: usize },
    EvenOdd,
    YearMonthWeekday,
    /// Explicit thresholds, each yielding `< t` and `>= t`.
    Cutoffs { thresholds: Vec<f64> },
    /// One named statement for membership in a set of categories.
    InSet { name: String, values: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapperRule {
    #[serde(flatten)]
    kind: RuleKind,
    #[serde(default)]
    attribute: Option<String>,
}

fn cutoff_names(cutoffs: usize) -> Option<&'static [&'static str]> {
    match cutoffs {
        2 => Some(&["low", "high"]),
        4 => Some(&["very low", "low", "high", "very high"]),
        6 => Some(&["extremely low", "very low", "low", "high", "very high", "extremely high"]),
        8 => Some(&["extremely low", "very low", "low", "reduced", "increased", "high", "very high", "extremely high"]),
        _ => None,
    }
}

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

impl MapperRule {
    pub fn new(kind: RuleKind) -> Self {
        Self { kind, attribute: None }
    }
    pub fn targeting(kind: RuleKind, attribute: impl Into<String>) -> Self {
        Self { kind, attribute: Some(attribute.into()) }
    }
    pub fn kind(&self) -> &RuleKind {
        &self.kind
    }
    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }
    pub fn name(&self) -> String {
        match &self.kind {
            RuleKind::CategoricEquality => "CATEGORIC_EQUALITY".into(),
            RuleKind::CategoricInequality => "CATEGORIC_INEQUALITY".into(),
            RuleKind::SmartDiscreteOrdinal => "SMART_DISCRETE_ORDINAL".into(),
            RuleKind::AboveMedian => "ABOVE_MEDIAN".into(),
            RuleKind::PositiveAndNegative => "POSITIVE_AND_NEGATIVE".into(),
            RuleKind::StdevBands => "STDEV_BANDS".into(),
            RuleKind::Clustering { cutoffs } => format!("IRREGULAR_{cutoffs}_CUTOFFS_CLUSTERING"),
            RuleKind::EvenOdd => "EVEN_ODD".into(),
            RuleKind::YearMonthWeekday => "YEAR_MONTH_WEEKDAY".into(),
            RuleKind::Cutoffs { .. } => "CUTOFFS".into(),
            RuleKind::InSet { name, .. } => format!("IN_SET:{name}"),
        }
    }
    /// Two rules with the same identity never coexist in a resolved rule list.
    pub fn identity(&self) -> (String, Option<String>) {
        (self.name(), self.attribute.clone())
    }
    /// Checks parameters that do not depend on a table.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| Err(MinerError::configuration(format!("rule '{self}': {reason}")));
        match &self.kind {
            RuleKind::Clustering { cutoffs } if cutoff_names(*cutoffs).is_none() => {
                fail(format!("{cutoffs} cut-offs are not supported (use 2, 4, 6 or 8)"))
            }
            RuleKind::Cutoffs { thresholds } if thresholds.is_empty() || thresholds.iter().any(|t| !t.is_finite()) => {
                fail("thresholds must be a non-empty list of finite numbers".into())
            }
            RuleKind::InSet { values, .. } if values.is_empty() => fail("category set is empty".into()),
            RuleKind::Cutoffs { .. } | RuleKind::InSet { .. } if self.attribute.is_none() => {
                fail("needs a target attribute".into())
            }
            _ => Ok(()),
        }
    }
    fn applicable(&self, kind: &AttributeKind) -> bool {
        match &self.kind {
            RuleKind::CategoricEquality | RuleKind::CategoricInequality | RuleKind::InSet { .. } => {
                matches!(kind, AttributeKind::Categoric { .. })
            }
            RuleKind::SmartDiscreteOrdinal | RuleKind::AboveMedian => matches!(kind, AttributeKind::Ordinal { .. }),
            RuleKind::PositiveAndNegative
            | RuleKind::StdevBands
            | RuleKind::Clustering { .. }
            | RuleKind::Cutoffs { .. } => kind.is_metric(),
            RuleKind::EvenOdd => matches!(kind, AttributeKind::Integer),
            RuleKind::YearMonthWeekday => matches!(kind, AttributeKind::Date),
        }
    }
    /// Checks that a targeted rule names an existing attribute it can handle.
    pub fn check_target(&self, table: &DataTable) -> Result<()> {
        if let Some(target) = &self.attribute {
            let index = table.attribute_index(target).ok_or_else(|| {
                MinerError::configuration(format!("rule '{self}' targets unknown attribute '{target}' of table '{}'", table.id()))
            })?;
            let kind = table.attributes()[index].kind();
            if !self.applicable(kind) {
                return Err(MinerError::configuration(format!(
                    "rule '{self}' cannot be applied to {kind} attribute '{target}'"
                )));
            }
        }
        Ok(())
    }

    /// Emits the statements this rule defines for one attribute of a table.
    pub fn apply(&self, table: &DataTable, attribute: usize) -> Vec<StatementDef> {
        let attr = &table.attributes()[attribute];
        if self.attribute.as_deref().is_some_and(|target| target != attr.name()) || !self.applicable(attr.kind()) {
            return Vec::new();
        }
        let stats = table.statistics(attribute);
        let name = attr.name();
        let mut out = Vec::new();
        let mut push = |suffix: String, predicate: Predicate| {
            out.push(StatementDef { name: format!("{name}{suffix}"), attribute, predicate });
        };
        match &self.kind {
            RuleKind::CategoricEquality => {
                for c in &stats.categories {
                    push(format!("={c}"), Predicate::Category(c.clone()));
                }
            }
            RuleKind::CategoricInequality => {
                for c in &stats.categories {
                    push(format!("!={c}"), Predicate::NotCategory(c.clone()));
                }
            }
            RuleKind::SmartDiscreteOrdinal => {
                if let AttributeKind::Ordinal { order } = attr.kind() {
                    for (rank, level) in order.iter().enumerate() {
                        push(format!(">={level}"), Predicate::GreaterOrEquals(rank as f64));
                        push(format!("<={level}"), Predicate::LessOrEquals(rank as f64));
                    }
                }
            }
            RuleKind::AboveMedian => {
                if let (AttributeKind::Ordinal { order }, Some(median)) = (attr.kind(), stats.median) {
                    let rank = median.floor() as usize;
                    if let Some(level) = order.get(rank) {
                        push(format!(">{level}"), Predicate::GreaterThan(rank as f64));
                    }
                }
            }
            RuleKind::PositiveAndNegative => {
                if let (Some(min), Some(max)) = (stats.min, stats.max) {
                    if min <= 0.0 && max >= 0.0 {
                        if min < 0.0 {
                            push("=negative".into(), Predicate::LessThan(0.0));
                        }
                        if max > 0.0 {
                            push("=positive".into(), Predicate::GreaterThan(0.0));
                        }
                        push("=0.0".into(), Predicate::EqualTo(0.0));
                    }
                }
            }
            RuleKind::StdevBands => {
                if let (Some(mean), Some(sd)) = (stats.mean, stats.std_dev) {
                    push("=very low".into(), Predicate::LessThan(mean - 1.5 * sd));
                    push("=not very low".into(), Predicate::GreaterOrEquals(mean - 1.5 * sd));
                    push("=low".into(), Predicate::LessThan(mean - 0.5 * sd));
                    push("=normal".into(), Predicate::InClosedInterval(mean - 0.5 * sd, mean + 0.5 * sd));
                    push("=high".into(), Predicate::GreaterThan(mean + 0.5 * sd));
                    push("=very high".into(), Predicate::GreaterThan(mean + 1.5 * sd));
                    push("=not very high".into(), Predicate::LessOrEquals(mean + 1.5 * sd));
                }
            }
            RuleKind::Clustering { cutoffs } => {
                if let Some(names) = cutoff_names(*cutoffs) {
                    let cuts = kmeans_cut_points(&stats.sorted, names.len() + 1, KMEANS_ITERATIONS);
                    if cuts.len() == names.len() {
                        let half = names.len() / 2;
                        for (i, (cut, label)) in cuts.iter().zip(names).enumerate() {
                            if i < half {
                                push(format!("={label}"), Predicate::LessThan(*cut));
                                push(format!("=not {label}"), Predicate::GreaterOrEquals(*cut));
                            } else {
                                push(format!("={label}"), Predicate::GreaterThan(*cut));
                                push(format!("=not {label}"), Predicate::LessOrEquals(*cut));
                            }
                        }
                    }
                }
            }
            RuleKind::EvenOdd => {
                push("%2=0".into(), Predicate::DivisibleBy(2));
                push("%2!=0".into(), Predicate::NotDivisibleBy(2));
            }
            RuleKind::YearMonthWeekday => {
                let dates: Vec<_> = table
                    .column(attribute)
                    .iter()
                    .filter_map(|v| match v {
                        Value::Date(d) => Some(*d),
                        _ => None,
                    })
                    .collect();
                let mut years: Vec<i32> = dates.iter().map(|d| d.year()).collect();
                years.sort_unstable();
                years.dedup();
                let mut months: Vec<u32> = dates.iter().map(|d| d.month()).collect();
                months.sort_unstable();
                months.dedup();
                let mut weekdays: Vec<u32> = dates.iter().map(|d| d.weekday().num_days_from_monday()).collect();
                weekdays.sort_unstable();
                weekdays.dedup();
                for y in years {
                    push(format!(".year={y}"), Predicate::DateField(DateField::Year, y as u32));
                }
                for m in months {
                    push(format!(".month={m}"), Predicate::DateField(DateField::Month, m));
                }
                for w in weekdays {
                    push(format!(".weekday={}", WEEKDAYS[w as usize % 7]), Predicate::DateField(DateField::Weekday, w));
                }
            }
            RuleKind::Cutoffs { thresholds } => {
                for t in thresholds {
                    push(format!("<{t}"), Predicate::LessThan(*t));
                    push(format!(">={t}"), Predicate::GreaterOrEquals(*t));
                }
            }
            RuleKind::InSet { name: set, values } => {
                push(format!("={set}"), Predicate::InCategories(values.clone()));
            }
        }
        out
    }
}

impl fmt::Display for MapperRule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.attribute {
            Some(a) => write!(f, "{}@{}", self.name(), a),
            None => write!(f, "{}", self.name()),
        }
    }
}

// ------------- k-means cut points -------------
/// Splits ascending `sorted` values into `k` contiguous clusters by one-dimensional
/// k-means and returns the `k - 1` cut points between neighbouring clusters. A
/// value `v` belongs to cluster `j` when `cuts[j-1] < v <= cuts[j]`.
pub fn kmeans_cut_points(sorted: &[f64], k: usize, max_iterations: usize) -> Vec<f64> {
    if sorted.is_empty() || k < 2 {
        return Vec::new();
    }
    let n = sorted.len();
    let last = sorted[n - 1];
    // start from equal frequency bins
    let mut cuts: Vec<f64> = (1..k).map(|i| sorted[((i * n) / k).saturating_sub(1).min(n - 1)]).collect();
    let mut means = vec![0.0; k];
    for iteration in 0..max_iterations {
        let mut sums = vec![0.0; k];
        let mut counts = vec![0usize; k];
        for &v in sorted {
            let j = cuts.partition_point(|&c| c < v);
            sums[j] += v;
            counts[j] += 1;
        }
        for j in 0..k {
            means[j] = if counts[j] > 0 {
                sums[j] / counts[j] as f64
            } else {
                let lower = if j == 0 { sorted[0] } else { cuts[j - 1] };
                let upper = if j == k - 1 { last } else { cuts[j] };
                (lower + upper) / 2.0
            };
        }
        let next: Vec<f64> = means.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
        if next == cuts {
            debug!(iteration, k, "k-means cut points converged");
            return cuts;
        }
        cuts = next;
    }
    warn!(k, max_iterations, "k-means search might not have converged; maximum number of iterations reached");
    cuts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kmeans_on_uniform_values_gives_equal_width_cuts() {
        let values: Vec<f64> = (1..=100).map(f64::from).collect();
        let cuts = kmeans_cut_points(&values, 5, 20);
        assert_eq!(cuts.len(), 4);
        for (cut, expected) in cuts.iter().zip([20.0, 40.0, 60.0, 80.0]) {
            assert!((cut - expected).abs() <= 1.0, "cut {cut} too far from {expected}");
        }
    }

    #[test]
    fn kmeans_separates_two_clumps() {
        let values = [1.0, 1.1, 1.2, 9.0, 9.1, 9.2];
        let cuts = kmeans_cut_points(&values, 2, 25);
        assert_eq!(cuts.len(), 1);
        assert!(cuts[0] > 1.2 && cuts[0] < 9.0);
    }

    #[test]
    fn kmeans_degenerate_inputs() {
        assert!(kmeans_cut_points(&[], 3, 10).is_empty());
        assert!(kmeans_cut_points(&[1.0, 2.0], 1, 10).is_empty());
        assert_eq!(kmeans_cut_points(&[4.0, 4.0, 4.0], 3, 10).len(), 2);
    }

    #[test]
    fn missing_values_never_hold() {
        for p in [Predicate::LessThan(1.0), Predicate::NotCategory("a".into()), Predicate::NotDivisibleBy(2)] {
            assert!(!p.holds(&Value::Missing));
        }
    }

    #[test]
    fn predicates_on_ordinal_ranks() {
        assert!(Predicate::GreaterOrEquals(1.0).holds(&Value::Ordinal(2)));
        assert!(!Predicate::LessOrEquals(1.0).holds(&Value::Ordinal(2)));
        assert!(Predicate::DivisibleBy(2).holds(&Value::Numeric(4.0)));
        assert!(Predicate::NotDivisibleBy(2).holds(&Value::Numeric(3.0)));
    }

    #[test]
    fn clustering_needs_supported_cutoffs() {
        assert!(MapperRule::new(RuleKind::Clustering { cutoffs: 4 }).validate().is_ok());
        assert!(MapperRule::new(RuleKind::Clustering { cutoffs: 5 }).validate().is_err());
        assert!(MapperRule::new(RuleKind::Cutoffs { thresholds: vec![10.0] }).validate().is_err());
        assert!(MapperRule::targeting(RuleKind::Cutoffs { thresholds: vec![10.0] }, "x").validate().is_ok());
    }
}
