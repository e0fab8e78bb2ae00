//! The tabular data store: named, typed attribute columns plus per-record group
//! labels. A [`DataTable`] is immutable once built; statement construction and
//! search only ever borrow it.

use std::collections::HashMap;

use serde::Deserialize;
use seahash::SeaHasher;
use std::hash::BuildHasherDefault;
use tracing::{debug, warn};

use crate::datatype::{AttributeKind, Value};
use crate::error::{MinerError, Result};

pub type NameHasher = BuildHasherDefault<SeaHasher>;

// ------------- Import options -------------
/// What to do with a record that does not fit the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    #[default]
    Abort,
    Skip,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    pub delimiter: char,
    pub missing_symbol: String,
    pub on_error: ErrorPolicy,
}
impl Default for ImportOptions {
    fn default() -> Self {
        Self { delimiter: ';', missing_symbol: "?".to_string(), on_error: ErrorPolicy::Abort }
    }
}

// ------------- Attribute -------------
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    name: String,
    kind: AttributeKind,
    description: String,
}
impl Attribute {
    pub fn new(name: impl Into<String>, kind: AttributeKind) -> Self {
        Self { name: name.into(), kind, description: String::new() }
    }
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn kind(&self) -> &AttributeKind {
        &self.kind
    }
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Summary of one column over its non-missing values.
#[derive(Debug, Clone, Default)]
pub struct AttributeStatistics {
    /// Non-missing numeric values (ordinal ranks for ordinal attributes) in ascending order.
    pub sorted: Vec<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub median: Option<f64>,
    /// Categoric labels, declared order first, then in order of first appearance.
    pub categories: Vec<String>,
    pub missing: usize,
}

impl AttributeStatistics {
    fn compute(attribute: &Attribute, column: &[Value]) -> Self {
        let mut stats = Self { missing: column.iter().filter(|v| v.is_missing()).count(), ..Self::default() };
        match attribute.kind() {
            AttributeKind::Categoric { categories } => {
                if let Some(declared) = categories {
                    stats.categories.extend(declared.iter().cloned());
                }
                for value in column {
                    if let Some(label) = value.as_str() {
                        if !stats.categories.iter().any(|c| c == label) {
                            stats.categories.push(label.to_string());
                        }
                    }
                }
            }
            AttributeKind::Numeric { .. } | AttributeKind::Integer | AttributeKind::Ordinal { .. } => {
                let mut sorted: Vec<f64> = column
                    .iter()
                    .filter_map(|v| match v {
                        Value::Numeric(x) => Some(*x),
                        Value::Ordinal(rank) => Some(*rank as f64),
                        _ => None,
                    })
                    .collect();
                sorted.sort_by(f64::total_cmp);
                if !sorted.is_empty() {
                    let n = sorted.len() as f64;
                    let mean = sorted.iter().sum::<f64>() / n;
                    let variance = if sorted.len() > 1 {
                        sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)
                    } else {
                        0.0
                    };
                    let mid = sorted.len() / 2;
                    let median = if sorted.len() % 2 == 0 { (sorted[mid - 1] + sorted[mid]) / 2.0 } else { sorted[mid] };
                    stats.min = sorted.first().copied();
                    stats.max = sorted.last().copied();
                    stats.mean = Some(mean);
                    stats.std_dev = Some(variance.sqrt());
                    stats.median = Some(median);
                }
                stats.sorted = sorted;
            }
            AttributeKind::Date | AttributeKind::Name => (),
        }
        stats
    }
}

// ------------- DataTable -------------
#[derive(Debug)]
pub struct DataTable {
    id: String,
    attributes: Vec<Attribute>,
    columns: Vec<Vec<Value>>,
    labels: Vec<Vec<String>>,
    statistics: Vec<AttributeStatistics>,
    lookup: HashMap<String, usize, NameHasher>,
}

impl DataTable {
    /// Builds a table from raw string rows, one cell per attribute. `labels`, when
    /// given, holds the group labels of each row and must have one entry per row.
    pub fn from_rows<S: AsRef<str>>(
        id: &str,
        attributes: Vec<Attribute>,
        rows: &[Vec<S>],
        labels: Option<Vec<Vec<String>>>,
        options: &ImportOptions,
    ) -> Result<Self> {
        let mut lookup = HashMap::<String, usize, NameHasher>::default();
        for (index, attribute) in attributes.iter().enumerate() {
            if lookup.insert(attribute.name().to_string(), index).is_some() {
                return Err(MinerError::configuration(format!(
                    "attribute '{}' is declared twice in table '{id}'",
                    attribute.name()
                )));
            }
        }
        if let Some(labels) = &labels {
            if labels.len() != rows.len() {
                return Err(MinerError::data_format(
                    format!("table '{id}' has {} records but {} group label rows", rows.len(), labels.len()),
                    None,
                ));
            }
        }

        let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(rows.len()); attributes.len()];
        let mut kept_labels = Vec::with_capacity(rows.len());
        let mut skipped = 0usize;
        'rows: for (record, row) in rows.iter().enumerate() {
            let parsed = if row.len() != attributes.len() {
                Err(format!("expected {} values but found {}", attributes.len(), row.len()))
            } else {
                let mut values = Vec::with_capacity(row.len());
                for (attribute, raw) in attributes.iter().zip(row) {
                    match attribute.kind().parse(raw.as_ref(), &options.missing_symbol) {
                        Ok(v) => values.push(v),
                        Err(reason) => {
                            let message = format!("attribute '{}' of table '{id}': {reason}", attribute.name());
                            match options.on_error {
                                ErrorPolicy::Abort => return Err(MinerError::data_format(message, Some(record))),
                                ErrorPolicy::Skip => {
                                    warn!(record, %message, "skipping record");
                                    skipped += 1;
                                    continue 'rows;
                                }
                            }
                        }
                    }
                }
                Ok(values)
            };
            match parsed {
                Ok(values) => {
                    for (column, value) in columns.iter_mut().zip(values) {
                        column.push(value);
                    }
                    kept_labels.push(labels.as_ref().map(|l| l[record].clone()).unwrap_or_default());
                }
                Err(reason) => {
                    let message = format!("table '{id}': {reason}");
                    match options.on_error {
                        ErrorPolicy::Abort => return Err(MinerError::data_format(message, Some(record))),
                        ErrorPolicy::Skip => {
                            warn!(record, %message, "skipping record");
                            skipped += 1;
                        }
                    }
                }
            }
        }
        if skipped > 0 {
            warn!(table = id, skipped, "records did not fit the schema and were skipped");
        }

        let statistics = attributes
            .iter()
            .zip(&columns)
            .map(|(a, c)| AttributeStatistics::compute(a, c))
            .collect();
        debug!(table = id, records = kept_labels.len(), attributes = attributes.len(), "table built");
        Ok(Self { id: id.to_string(), attributes, columns, labels: kept_labels, statistics, lookup })
    }

    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn len(&self) -> usize {
        self.labels.len()
    }
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }
    pub fn attribute_index(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }
    pub fn column(&self, attribute: usize) -> &[Value] {
        &self.columns[attribute]
    }
    pub fn value(&self, record: usize, attribute: usize) -> &Value {
        &self.columns[attribute][record]
    }
    pub fn statistics(&self, attribute: usize) -> &AttributeStatistics {
        &self.statistics[attribute]
    }
    pub fn labels(&self, record: usize) -> &[String] {
        &self.labels[record]
    }
    pub fn has_label(&self, record: usize, label: &str) -> bool {
        self.labels[record].iter().any(|l| l == label)
    }
    pub fn has_labels(&self) -> bool {
        self.labels.iter().any(|l| !l.is_empty())
    }
}
