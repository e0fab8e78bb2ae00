//! Named rule-sets and the mapper expression evaluator.
//!
//! An expression such as `DFT_ATTR_TO_STMNT_MAPS-{CATEGORIC_EQUALITY}|{STDEV_BANDS}`
//! starts from a base rule-set and folds modifier groups into it from left to right:
//! `-{..}` removes the rules of the named sets, `|{..}` adds them, replacing a rule
//! with the same identity in place.

use std::collections::HashMap;

use lazy_static::lazy_static;
use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;
use regex::Regex;
use tracing::debug;

use crate::error::{MinerError, Result};
use crate::mapper::{MapperRule, RuleKind};
use crate::table::NameHasher;

pub const DEFAULT_RULE_SET: &str = "DFT_ATTR_TO_STMNT_MAPS";
pub const EMPTY_RULE_SET: &str = "NONE";

lazy_static! {
    // '-' is an operator inside expressions and cannot be part of a set name
    static ref RULE_SET_NAME: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").unwrap();
}

#[derive(Parser)]
#[grammar = "mapper.pest"]
struct ExpressionParser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Remove,
    Union,
}

fn builtin_rules() -> Vec<MapperRule> {
    [
        RuleKind::CategoricEquality,
        RuleKind::CategoricInequality,
        RuleKind::SmartDiscreteOrdinal,
        RuleKind::AboveMedian,
        RuleKind::PositiveAndNegative,
        RuleKind::StdevBands,
        RuleKind::Clustering { cutoffs: 2 },
        RuleKind::Clustering { cutoffs: 4 },
        RuleKind::Clustering { cutoffs: 6 },
        RuleKind::EvenOdd,
        RuleKind::YearMonthWeekday,
    ]
    .into_iter()
    .map(MapperRule::new)
    .collect()
}

#[derive(Debug, Clone)]
pub struct RuleSetCatalog {
    sets: HashMap<String, Vec<MapperRule>, NameHasher>,
    order: Vec<String>,
}

impl Default for RuleSetCatalog {
    fn default() -> Self {
        let mut catalog = Self { sets: HashMap::default(), order: Vec::new() };
        catalog.insert(EMPTY_RULE_SET, Vec::new());
        catalog.insert(
            DEFAULT_RULE_SET,
            [
                RuleKind::CategoricEquality,
                RuleKind::SmartDiscreteOrdinal,
                RuleKind::Clustering { cutoffs: 4 },
                RuleKind::PositiveAndNegative,
                RuleKind::YearMonthWeekday,
            ]
            .into_iter()
            .map(MapperRule::new)
            .collect(),
        );
        for rule in builtin_rules() {
            catalog.insert(&rule.name(), vec![rule]);
        }
        catalog
    }
}

impl RuleSetCatalog {
    fn insert(&mut self, name: &str, rules: Vec<MapperRule>) {
        self.order.push(name.to_string());
        self.sets.insert(name.to_string(), rules);
    }

    /// Adds a user-defined rule-set. Names are unique across built-in and user sets.
    pub fn register(&mut self, name: &str, rules: Vec<MapperRule>) -> Result<()> {
        if !RULE_SET_NAME.is_match(name) {
            return Err(MinerError::configuration(format!("'{name}' is not a valid rule-set name")));
        }
        if self.sets.contains_key(name) {
            return Err(MinerError::configuration(format!("rule-set '{name}' is already defined")));
        }
        for rule in &rules {
            rule.validate()
                .map_err(|e| MinerError::configuration(format!("rule-set '{name}': {e}")))?;
        }
        let rules = dedup_group(rules, name)?;
        debug!(rule_set = name, rules = rules.len(), "rule-set registered");
        self.insert(name, rules);
        Ok(())
    }

    /// Rule-set names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&[MapperRule]> {
        self.sets.get(name).map(Vec::as_slice)
    }

    fn lookup(&self, name: &str, role: &str, expression: &str) -> Result<&[MapperRule]> {
        self.get(name).ok_or_else(|| {
            MinerError::configuration(format!("unknown {role} rule-set '{name}' in mapper expression '{expression}'"))
        })
    }

    /// Resolves a mapper expression to an ordered list of rules.
    pub fn resolve(&self, expression: &str) -> Result<Vec<MapperRule>> {
        let parsed = ExpressionParser::parse(Rule::expression, expression)
            .map_err(|e| MinerError::configuration(format!("malformed mapper expression '{expression}':\n{e}")))?
            .next()
            .ok_or_else(|| MinerError::configuration(format!("empty mapper expression '{expression}'")))?;

        let mut parts = parsed.into_inner();
        let base = parts
            .next()
            .ok_or_else(|| MinerError::configuration(format!("mapper expression '{expression}' has no base")))?;
        let mut rules = self.lookup(base.as_str(), "base", expression)?.to_vec();

        for part in parts {
            if part.as_rule() != Rule::modifier {
                continue;
            }
            let (op, names) = modifier(part);
            let mut group = Vec::new();
            for name in &names {
                group.extend_from_slice(self.lookup(name, "modifier", expression)?);
            }
            let group = dedup_group(group, &names.join(","))?;
            match op {
                Op::Remove => rules.retain(|r| !group.iter().any(|g| g.identity() == r.identity())),
                Op::Union => {
                    for rule in group {
                        match rules.iter().position(|r| r.identity() == rule.identity()) {
                            Some(i) => rules[i] = rule,
                            None => rules.push(rule),
                        }
                    }
                }
            }
        }
        debug!(expression, rules = rules.len(), "mapper expression resolved");
        Ok(rules)
    }
}

fn modifier(pair: Pair<Rule>) -> (Op, Vec<String>) {
    let mut op = Op::Union;
    let mut names = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::remove => op = Op::Remove,
            Rule::union => op = Op::Union,
            Rule::group => names.extend(inner.into_inner().map(|n| n.as_str().to_string())),
            _ => (),
        }
    }
    (op, names)
}

/// Drops exact repeats; two different rules with one identity cannot be resolved.
fn dedup_group(rules: Vec<MapperRule>, group: &str) -> Result<Vec<MapperRule>> {
    let mut kept: Vec<MapperRule> = Vec::with_capacity(rules.len());
    for rule in rules {
        match kept.iter().find(|k| k.identity() == rule.identity()) {
            Some(existing) if *existing == rule => (),
            Some(existing) => {
                return Err(MinerError::configuration(format!(
                    "conflicting rules '{existing}' in {{{group}}}: both define {} differently",
                    rule.attribute().unwrap_or("every attribute")
                )));
            }
            None => kept.push(rule),
        }
    }
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(rules: &[MapperRule]) -> Vec<String> {
        rules.iter().map(|r| r.to_string()).collect()
    }

    #[test]
    fn parses_whitespace_and_groups() {
        let catalog = RuleSetCatalog::default();
        let rules = catalog
            .resolve("DFT_ATTR_TO_STMNT_MAPS - {CATEGORIC_EQUALITY} | {CATEGORIC_INEQUALITY, EVEN_ODD}")
            .expect("resolves");
        assert_eq!(
            names(&rules),
            [
                "SMART_DISCRETE_ORDINAL",
                "IRREGULAR_4_CUTOFFS_CLUSTERING",
                "POSITIVE_AND_NEGATIVE",
                "YEAR_MONTH_WEEKDAY",
                "CATEGORIC_INEQUALITY",
                "EVEN_ODD"
            ]
        );
    }

    #[test]
    fn rejects_malformed_expressions() {
        let catalog = RuleSetCatalog::default();
        for bad in ["", "-{A}", "NONE|", "NONE|{}", "NONE|{A,}", "NONE+{A}", "1ABC"] {
            let e = catalog.resolve(bad).expect_err(bad);
            assert!(e.to_string().contains("mapper expression"), "{e}");
        }
    }
}
