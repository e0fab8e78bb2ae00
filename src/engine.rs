//! Executes pipelines of commands against a [`Workspace`].
//!
//! Commands refer to earlier artifacts by id. The first failing command stops the
//! pipeline; artifacts built before it stay in the workspace.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use tracing::{error, info};

use crate::catalog::{DEFAULT_RULE_SET, RuleSetCatalog};
use crate::error::{MinerError, Result};
use crate::export::{self, ExportFormat};
use crate::import::import_table;
use crate::interface::SearchInterface;
use crate::measure::MeasureRegistry;
use crate::search::{ASSOCIATION_BEAMSEARCH, MinSupport, SearchParams};
use crate::settings::Settings;
use crate::statements::StatementMatrix;
use crate::table::ImportOptions;
use crate::workspace::Workspace;

fn default_mappers() -> String {
    DEFAULT_RULE_SET.to_string()
}
fn default_algorithm() -> String {
    ASSOCIATION_BEAMSEARCH.to_string()
}

/// Search parameters given on a search command; unset fields come from the settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchOverrides {
    pub beam_width: Option<usize>,
    pub max_depth: Option<usize>,
    pub min_support: Option<MinSupport>,
    pub num_results: Option<usize>,
    pub measure: Option<String>,
    pub target: Option<String>,
    pub distinct_attributes: Option<bool>,
    pub parallel: Option<bool>,
}

impl SearchOverrides {
    pub fn apply(&self, base: &SearchParams) -> SearchParams {
        SearchParams {
            beam_width: self.beam_width.unwrap_or(base.beam_width),
            max_depth: self.max_depth.unwrap_or(base.max_depth),
            min_support: self.min_support.unwrap_or(base.min_support),
            num_results: self.num_results.unwrap_or(base.num_results),
            measure: self.measure.clone().unwrap_or_else(|| base.measure.clone()),
            target: self.target.clone().or_else(|| base.target.clone()),
            distinct_attributes: self.distinct_attributes.unwrap_or(base.distinct_attributes),
            parallel: self.parallel.unwrap_or(base.parallel),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum Command {
    Import {
        id: String,
        data: PathBuf,
        attributes: PathBuf,
        #[serde(default)]
        groups: Option<PathBuf>,
    },
    Statements {
        id: String,
        table: String,
        #[serde(default = "default_mappers")]
        mappers: String,
    },
    Search {
        id: String,
        statements: String,
        #[serde(default = "default_algorithm")]
        algorithm: String,
        #[serde(default)]
        params: SearchOverrides,
    },
    Export {
        format: ExportFormat,
        id: String,
        path: PathBuf,
    },
}

impl Command {
    /// Id of the artifact the command creates or exports.
    pub fn id(&self) -> &str {
        match self {
            Command::Import { id, .. }
            | Command::Statements { id, .. }
            | Command::Search { id, .. }
            | Command::Export { id, .. } => id,
        }
    }
    pub fn name(&self) -> &'static str {
        match self {
            Command::Import { .. } => "import",
            Command::Statements { .. } => "statements",
            Command::Search { .. } => "search",
            Command::Export { .. } => "export",
        }
    }
}

pub struct Engine {
    workspace: Workspace,
    catalog: RuleSetCatalog,
    interface: SearchInterface,
    import: ImportOptions,
    search: SearchParams,
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            workspace: Workspace::new(),
            catalog: RuleSetCatalog::default(),
            interface: SearchInterface::default(),
            import: ImportOptions::default(),
            search: SearchParams::default(),
        }
    }
}

impl Engine {
    /// Builds an engine from settings, registering their rule-sets.
    pub fn new(settings: &Settings) -> Result<Self> {
        Self::with_measures(settings, MeasureRegistry::default())
    }

    pub fn with_measures(settings: &Settings, measures: MeasureRegistry) -> Result<Self> {
        let mut catalog = RuleSetCatalog::default();
        for (name, rules) in &settings.rule_sets {
            catalog.register(name, rules.clone())?;
        }
        Ok(Self {
            workspace: Workspace::new(),
            catalog,
            interface: SearchInterface::new(Arc::new(measures)),
            import: settings.import.clone(),
            search: settings.search.clone(),
        })
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }
    pub fn workspace_mut(&mut self) -> &mut Workspace {
        &mut self.workspace
    }
    pub fn catalog(&self) -> &RuleSetCatalog {
        &self.catalog
    }

    /// Runs the commands in order, stopping at the first failure.
    pub fn execute(&mut self, commands: &[Command]) -> Result<()> {
        let started = Instant::now();
        for (position, command) in commands.iter().enumerate() {
            if let Err(e) = self.run(command) {
                error!(position, command = command.name(), id = command.id(), "{e}");
                return Err(e);
            }
        }
        info!(commands = commands.len(), ms = started.elapsed().as_millis() as u64, "pipeline complete");
        Ok(())
    }

    pub fn run(&mut self, command: &Command) -> Result<()> {
        match command {
            Command::Import { id, data, attributes, groups } => {
                let table = import_table(id, data, attributes, groups.as_deref(), &self.import)?;
                self.workspace.add_table(table)?;
            }
            Command::Statements { id, table, mappers } => {
                let table = self.workspace.table(table)?;
                let rules = self.catalog.resolve(mappers)?;
                let matrix = StatementMatrix::build(id, &table, &rules)?;
                self.workspace.add_matrix(matrix)?;
            }
            Command::Search { id, statements, algorithm, params } => {
                if algorithm != ASSOCIATION_BEAMSEARCH {
                    return Err(MinerError::configuration(format!(
                        "unknown algorithm '{algorithm}' (only {ASSOCIATION_BEAMSEARCH} is available)"
                    )));
                }
                let matrix = self.workspace.matrix(statements)?;
                let handle = self.interface.start(matrix, params.apply(&self.search))?;
                let result = handle.join()?;
                self.workspace.add_result(id, result)?;
            }
            Command::Export { format, id, path } => match format {
                ExportFormat::FimiData => {
                    let matrix = self.workspace.matrix(id)?;
                    export::export_fimi_data(&matrix, path)?
                }
                ExportFormat::FimiNames => {
                    let matrix = self.workspace.matrix(id)?;
                    export::export_fimi_names(&matrix, path)?
                }
                ExportFormat::Results => {
                    let result = self.workspace.result(id)?;
                    export::export_results(&result, path)?
                }
            },
        }
        Ok(())
    }
}
