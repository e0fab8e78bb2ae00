//! Layered settings: built-in defaults, then an optional settings file, then a
//! pipeline file, then `BEAMKD_*` environment variables (`__` separates nested
//! keys, e.g. `BEAMKD_SEARCH__BEAM_WIDTH=10`).

use std::collections::BTreeMap;
use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use tracing::debug;

use crate::engine::Command;
use crate::error::Result;
use crate::mapper::MapperRule;
use crate::search::SearchParams;
use crate::table::ImportOptions;

pub const ENV_PREFIX: &str = "BEAMKD";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub import: ImportOptions,
    pub search: SearchParams,
    /// User rule-sets, registered next to the built-in ones.
    pub rule_sets: BTreeMap<String, Vec<MapperRule>>,
    pub commands: Vec<Command>,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            import: ImportOptions::default(),
            search: SearchParams::default(),
            rule_sets: BTreeMap::new(),
            commands: Vec::new(),
            log_filter: "info".to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from the given TOML files, later files overriding earlier ones.
    pub fn load(files: &[&Path]) -> Result<Self> {
        let mut builder = Config::builder();
        for file in files {
            builder = builder.add_source(File::from(*file).format(FileFormat::Toml).required(true));
        }
        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        debug!(files = files.len(), commands = settings.commands.len(), "settings loaded");
        Ok(settings)
    }

    /// Parses settings from TOML text, without files or environment.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()?)
    }
}
