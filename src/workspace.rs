//! Named artifacts of one pipeline run: tables, statement matrices and search
//! results, each kept under a user-chosen id.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{MinerError, Result};
use crate::search::SearchResult;
use crate::statements::StatementMatrix;
use crate::table::{DataTable, NameHasher};

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_.-]*$").unwrap();
}

pub fn check_identifier(id: &str) -> Result<()> {
    if IDENTIFIER.is_match(id) {
        Ok(())
    } else {
        Err(MinerError::configuration(format!("'{id}' is not a valid identifier")))
    }
}

#[derive(Debug)]
pub struct Keeper<T> {
    kind: &'static str,
    kept: HashMap<String, Arc<T>, NameHasher>,
}
impl<T> Keeper<T> {
    pub fn new(kind: &'static str) -> Self {
        Self { kind, kept: HashMap::default() }
    }
    /// Keeps the artifact unless the id is taken; returns what is kept under the id.
    pub fn keep(&mut self, id: &str, artifact: T) -> (Arc<T>, bool) {
        match self.kept.entry(id.to_string()) {
            Entry::Vacant(e) => (Arc::clone(e.insert(Arc::new(artifact))), false),
            Entry::Occupied(e) => (Arc::clone(e.get()), true),
        }
    }
    pub fn get(&self, id: &str) -> Result<Arc<T>> {
        self.kept
            .get(id)
            .map(Arc::clone)
            .ok_or_else(|| MinerError::configuration(format!("unknown {} id '{id}'", self.kind)))
    }
    pub fn remove(&mut self, id: &str) -> Option<Arc<T>> {
        self.kept.remove(id)
    }
    pub fn contains(&self, id: &str) -> bool {
        self.kept.contains_key(id)
    }
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.kept.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
    fn clear(&mut self) {
        self.kept.clear();
    }
}

#[derive(Debug)]
pub struct Workspace {
    pub tables: Keeper<DataTable>,
    pub matrices: Keeper<StatementMatrix>,
    pub results: Keeper<SearchResult>,
}

impl Default for Workspace {
    fn default() -> Self {
        Self { tables: Keeper::new("table"), matrices: Keeper::new("statement matrix"), results: Keeper::new("result") }
    }
}

fn keep_new<T>(keeper: &mut Keeper<T>, id: &str, artifact: T) -> Result<Arc<T>> {
    check_identifier(id)?;
    let (kept, previously_kept) = keeper.keep(id, artifact);
    if previously_kept {
        return Err(MinerError::configuration(format!("{} id '{id}' is already in use", keeper.kind)));
    }
    Ok(kept)
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }
    /// Ids are shared by all artifact kinds.
    fn check_unused(&self, id: &str) -> Result<()> {
        let owner = [
            (self.tables.kind, self.tables.contains(id)),
            (self.matrices.kind, self.matrices.contains(id)),
            (self.results.kind, self.results.contains(id)),
        ]
        .into_iter()
        .find_map(|(kind, taken)| taken.then_some(kind));
        match owner {
            Some(kind) => Err(MinerError::configuration(format!("id '{id}' is already in use by a {kind}"))),
            None => Ok(()),
        }
    }
    pub fn add_table(&mut self, table: DataTable) -> Result<Arc<DataTable>> {
        let id = table.id().to_string();
        self.check_unused(&id)?;
        keep_new(&mut self.tables, &id, table)
    }
    pub fn add_matrix(&mut self, matrix: StatementMatrix) -> Result<Arc<StatementMatrix>> {
        let id = matrix.id().to_string();
        self.check_unused(&id)?;
        keep_new(&mut self.matrices, &id, matrix)
    }
    pub fn add_result(&mut self, id: &str, result: SearchResult) -> Result<Arc<SearchResult>> {
        self.check_unused(id)?;
        keep_new(&mut self.results, id, result)
    }
    pub fn table(&self, id: &str) -> Result<Arc<DataTable>> {
        self.tables.get(id)
    }
    pub fn matrix(&self, id: &str) -> Result<Arc<StatementMatrix>> {
        self.matrices.get(id)
    }
    pub fn result(&self, id: &str) -> Result<Arc<SearchResult>> {
        self.results.get(id)
    }
    /// Drops every artifact.
    pub fn clear(&mut self) {
        self.tables.clear();
        self.matrices.clear();
        self.results.clear();
    }
}
