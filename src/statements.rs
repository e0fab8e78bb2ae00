//! The statement matrix: one column per statement, one row per record.
//!
//! Columns are stored as support sets (the records a statement holds for) in
//! `RoaringTreemap`s, so that the support of a conjunction is the intersection of
//! its columns. Column order is attribute order of the table, then rule order,
//! then the order in which a rule emits its statements.

use std::collections::HashMap;

use bimap::BiMap;
use rayon::prelude::*;
use roaring::RoaringTreemap;
use tracing::{debug, info, warn};

use crate::error::{DegenerateStatementWarning, MinerError, Result};
use crate::mapper::{MapperRule, StatementDef};
use crate::table::{DataTable, NameHasher};

#[derive(Debug, Clone)]
pub struct Statement {
    name: String,
    attribute: Option<String>,
    rule: Option<String>,
    support: RoaringTreemap,
}
impl Statement {
    pub fn name(&self) -> &str {
        &self.name
    }
    /// Source attribute; unknown for matrices decoded from FIMI files.
    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }
    pub fn rule(&self) -> Option<&str> {
        self.rule.as_deref()
    }
    pub fn support(&self) -> &RoaringTreemap {
        &self.support
    }
}

#[derive(Debug)]
pub struct StatementMatrix {
    id: String,
    table_id: Option<String>,
    population: u64,
    statements: Vec<Statement>,
    index: BiMap<String, usize>,
    labels: HashMap<String, RoaringTreemap, NameHasher>,
    warnings: Vec<DegenerateStatementWarning>,
}

impl StatementMatrix {
    /// Applies the rules to every attribute of the table.
    pub fn build(id: &str, table: &DataTable, rules: &[MapperRule]) -> Result<Self> {
        for rule in rules {
            rule.check_target(table)?;
        }
        let definitions: Vec<(StatementDef, String)> = (0..table.attributes().len())
            .flat_map(move |attribute| {
                rules
                    .iter()
                    .flat_map(move |rule| rule.apply(table, attribute).into_iter().map(move |d| (d, rule.to_string())))
            })
            .collect();

        let mut kept: Vec<(StatementDef, String)> = Vec::with_capacity(definitions.len());
        let mut origin: HashMap<String, String, NameHasher> = HashMap::default();
        for (definition, rule) in definitions {
            if let Some(first) = origin.get(&definition.name) {
                debug!(statement = %definition.name, kept_from = %first, skipped_from = %rule, "duplicate statement name skipped");
                continue;
            }
            origin.insert(definition.name.clone(), rule.clone());
            kept.push((definition, rule));
        }

        let statements: Vec<Statement> = kept
            .into_par_iter()
            .map(|(definition, rule)| {
                let support: RoaringTreemap = table
                    .column(definition.attribute)
                    .iter()
                    .enumerate()
                    .filter(|(_, value)| definition.predicate.holds(value))
                    .map(|(record, _)| record as u64)
                    .collect();
                Statement {
                    attribute: Some(table.attributes()[definition.attribute].name().to_string()),
                    name: definition.name,
                    rule: Some(rule),
                    support,
                }
            })
            .collect();

        let mut labels = HashMap::<String, RoaringTreemap, NameHasher>::default();
        for record in 0..table.len() {
            for label in table.labels(record) {
                labels.entry(label.clone()).or_default().insert(record as u64);
            }
        }

        let matrix = Self::assemble(id, Some(table.id().to_string()), table.len() as u64, statements, labels)?;
        info!(
            matrix = id,
            table = table.id(),
            statements = matrix.len(),
            degenerate = matrix.warnings.len(),
            "statements built"
        );
        Ok(matrix)
    }

    fn assemble(
        id: &str,
        table_id: Option<String>,
        population: u64,
        statements: Vec<Statement>,
        labels: HashMap<String, RoaringTreemap, NameHasher>,
    ) -> Result<Self> {
        let mut index = BiMap::new();
        let mut warnings = Vec::new();
        for (i, statement) in statements.iter().enumerate() {
            if index.insert_no_overwrite(statement.name.clone(), i).is_err() {
                return Err(MinerError::data_format(
                    format!("statement '{}' appears twice in matrix '{id}'", statement.name),
                    None,
                ));
            }
            let support = statement.support.len();
            if support == 0 || support == population {
                let warning = DegenerateStatementWarning { statement: statement.name.clone(), support, population };
                warn!(matrix = id, "{warning}");
                warnings.push(warning);
            }
        }
        Ok(Self { id: id.to_string(), table_id, population, statements, index, labels, warnings })
    }

    /// Decodes a FIMI data/names export pair. Data lines hold 1-based column
    /// indices separated by whitespace; an empty line is a record with no true statement.
    pub fn from_fimi(id: &str, data: &str, names: &str) -> Result<Self> {
        let names: Vec<&str> = names.lines().map(str::trim_end).filter(|l| !l.is_empty()).collect();
        let mut supports = vec![RoaringTreemap::new(); names.len()];
        let mut population = 0u64;
        for (record, line) in data.lines().enumerate() {
            for token in line.split_whitespace() {
                let column: usize = token
                    .parse()
                    .map_err(|_| MinerError::data_format(format!("'{token}' is not a column index"), Some(record)))?;
                if column == 0 || column > names.len() {
                    return Err(MinerError::data_format(
                        format!("column {column} is outside 1..={} of the names file", names.len()),
                        Some(record),
                    ));
                }
                supports[column - 1].insert(record as u64);
            }
            population += 1;
        }
        let statements = names
            .into_iter()
            .zip(supports)
            .map(|(name, support)| Statement { name: name.to_string(), attribute: None, rule: None, support })
            .collect();
        Self::assemble(id, None, population, statements, HashMap::default())
    }

    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn table_id(&self) -> Option<&str> {
        self.table_id.as_deref()
    }
    /// Number of records.
    pub fn population(&self) -> u64 {
        self.population
    }
    /// Number of statements.
    pub fn len(&self) -> usize {
        self.statements.len()
    }
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }
    pub fn statement(&self, index: usize) -> Option<&Statement> {
        self.statements.get(index)
    }
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get_by_left(name).copied()
    }
    pub fn name(&self, index: usize) -> Option<&str> {
        self.index.get_by_right(&index).map(String::as_str)
    }
    pub fn support(&self, index: usize) -> Option<&RoaringTreemap> {
        self.statements.get(index).map(|s| &s.support)
    }
    pub fn holds(&self, statement: usize, record: u64) -> bool {
        self.statements.get(statement).is_some_and(|s| s.support.contains(record))
    }
    /// Indices of the statements true for a record, ascending.
    pub fn row_statements(&self, record: u64) -> Vec<usize> {
        self.statements
            .iter()
            .enumerate()
            .filter(|(_, s)| s.support.contains(record))
            .map(|(i, _)| i)
            .collect()
    }
    /// Records carrying a group label, if any record does.
    pub fn label_support(&self, label: &str) -> Option<&RoaringTreemap> {
        self.labels.get(label)
    }
    pub fn warnings(&self) -> &[DegenerateStatementWarning] {
        &self.warnings
    }

    /// Digest over statement names and support sets.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.population.to_le_bytes());
        for statement in &self.statements {
            hasher.update(statement.name.as_bytes());
            hasher.update(&[0]);
            for record in statement.support.iter() {
                hasher.update(&record.to_le_bytes());
            }
            hasher.update(&[0xff]);
        }
        hasher.finalize().to_hex().to_string()
    }
}
