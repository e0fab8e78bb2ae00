use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MinerError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },
    #[error("Data format error{}: {message}", record_suffix(.record))]
    DataFormat { message: String, record: Option<usize> },
    #[error("I/O error on '{}': {source}", .path.display())]
    Io { path: PathBuf, #[source] source: std::io::Error },
}

fn record_suffix(record: &Option<usize>) -> String {
    record.map(|r| format!(" in record {r}")).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, MinerError>;

impl MinerError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }
    pub fn data_format(message: impl Into<String>, record: Option<usize>) -> Self {
        Self::DataFormat { message: message.into(), record }
    }
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

// Helper conversions
impl From<config::ConfigError> for MinerError {
    fn from(e: config::ConfigError) -> Self { Self::configuration(e.to_string()) }
}
impl From<csv::Error> for MinerError {
    fn from(e: csv::Error) -> Self {
        let record = e.position().map(|p| p.record() as usize);
        Self::data_format(e.to_string(), record)
    }
}

/// A statement that is true for no record or for every record. Such statements
/// are kept in the matrix; this is only reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegenerateStatementWarning {
    pub statement: String,
    pub support: u64,
    pub population: u64,
}

impl std::fmt::Display for DegenerateStatementWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let kind = if self.support == 0 { "never" } else { "always" };
        write!(f, "statement '{}' is {} true ({}/{} records)", self.statement, kind, self.support, self.population)
    }
}
