//! beamkd – propositionalization and beam search for association and subgroup discovery.
//!
//! Tabular data is turned into a boolean *statement matrix* and then searched for
//! conjunctions of statements that score well under a quality measure:
//! * A [`table::DataTable`] holds typed attribute columns and per-record group labels.
//! * A [`mapper::MapperRule`] turns one attribute into named statements
//!   (`age<10`, `sex=f`, `income=very high`, ...).
//! * Rules are grouped into named rule-sets held by a [`catalog::RuleSetCatalog`];
//!   expressions like `DFT_ATTR_TO_STMNT_MAPS-{CATEGORIC_EQUALITY}|{STDEV_BANDS}`
//!   compose them.
//! * A [`statements::StatementMatrix`] keeps the support set of every statement as a
//!   roaring bitmap, so conjunctions are bitmap intersections.
//! * [`search::BeamSearch`] explores conjunctions depth by depth, keeping the best
//!   `beam_width` candidates per depth.
//!
//! ## Modules
//! * [`datatype`], [`table`], [`import`] – attribute kinds, the data store and CSV import.
//! * [`mapper`], [`catalog`] – statement mappers and rule-set composition
//!   (grammar in `mapper.pest`).
//! * [`statements`] – the statement matrix builder.
//! * [`measure`], [`search`], [`interface`] – quality measures, the beam search and
//!   a threaded runner with cooperative cancellation.
//! * [`export`] – FIMI data, FIMI names and result listings.
//! * [`workspace`], [`engine`], [`settings`] – named artifacts, pipelines of
//!   commands and layered configuration.
//!
//! ## Quick Start
//! ```
//! use beamkd::catalog::RuleSetCatalog;
//! use beamkd::datatype::AttributeKind;
//! use beamkd::interface::CancelToken;
//! use beamkd::mapper::{MapperRule, RuleKind};
//! use beamkd::measure::MeasureRegistry;
//! use beamkd::search::{BeamSearch, SearchParams};
//! use beamkd::statements::StatementMatrix;
//! use beamkd::table::{Attribute, DataTable, ImportOptions};
//!
//! let attributes = vec![
//!     Attribute::new("age", AttributeKind::Integer),
//!     Attribute::new("sex", AttributeKind::Categoric { categories: None }),
//! ];
//! let rows = vec![vec!["4", "f"], vec!["12", "m"], vec!["9", "f"], vec!["30", "m"], vec!["15", "f"]];
//! let table = DataTable::from_rows("people", attributes, &rows, None, &ImportOptions::default())?;
//!
//! let mut catalog = RuleSetCatalog::default();
//! catalog.register("AGE_CUTS", vec![MapperRule::targeting(RuleKind::Cutoffs { thresholds: vec![10.0] }, "age")])?;
//! let rules = catalog.resolve("CATEGORIC_EQUALITY|{AGE_CUTS}")?;
//! let matrix = StatementMatrix::build("people_statements", &table, &rules)?;
//! assert_eq!(matrix.position("age<10"), Some(0));
//!
//! let params = SearchParams { beam_width: 2, max_depth: 2, ..SearchParams::default() };
//! let result = BeamSearch::new(params, &MeasureRegistry::default())?.run(&matrix, &CancelToken::new())?;
//! assert!(result.beam_sizes.iter().all(|&size| size <= 2));
//! # Ok::<(), beamkd::error::MinerError>(())
//! ```

pub mod catalog;
pub mod datatype;
pub mod engine;
pub mod error;
pub mod export;
pub mod import;
pub mod interface;
pub mod mapper;
pub mod measure;
pub mod search;
pub mod settings;
pub mod statements;
pub mod table;
pub mod workspace;
