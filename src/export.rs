//! Text exports of statement matrices and search results.
//!
//! * FIMI data: one line per record holding the 1-based indices of the statements
//!   true for that record, ascending and separated by single spaces.
//! * FIMI names: one statement name per line, in column order.
//! * Results: a human-readable listing of mined candidates.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{MinerError, Result};
use crate::search::SearchResult;
use crate::statements::StatementMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    FimiData,
    FimiNames,
    Results,
}

pub fn write_fimi_data<W: Write>(matrix: &StatementMatrix, mut out: W) -> io::Result<()> {
    let mut rows: Vec<Vec<usize>> = vec![Vec::new(); matrix.population() as usize];
    for (column, statement) in matrix.statements().iter().enumerate() {
        for record in statement.support().iter() {
            rows[record as usize].push(column + 1);
        }
    }
    for row in rows {
        let line: Vec<String> = row.iter().map(usize::to_string).collect();
        writeln!(out, "{}", line.join(" "))?;
    }
    out.flush()
}

pub fn write_fimi_names<W: Write>(matrix: &StatementMatrix, mut out: W) -> io::Result<()> {
    for statement in matrix.statements() {
        writeln!(out, "{}", statement.name())?;
    }
    out.flush()
}

pub fn write_results<W: Write>(result: &SearchResult, mut out: W) -> io::Result<()> {
    writeln!(out, "# matrix: {}", result.matrix)?;
    writeln!(out, "# fingerprint: {}", result.matrix_fingerprint)?;
    writeln!(out, "# measure: {} (baseline {:.6})", result.measure, result.baseline)?;
    writeln!(out, "# records: {}", result.population)?;
    let sizes: Vec<String> = result.beam_sizes.iter().map(usize::to_string).collect();
    writeln!(
        out,
        "# depth reached: {} (beam sizes {}), nodes created: {}, pruned: {}",
        result.depth_reached,
        sizes.join(" "),
        result.nodes_created,
        result.nodes_pruned
    )?;
    if result.cancelled {
        writeln!(out, "# cancelled: results are partial")?;
    }
    writeln!(out, "rank\tquality\tsupport\tfrequency\tstatements")?;
    for (rank, candidate) in result.candidates.iter().enumerate() {
        let frequency = if result.population == 0 { 0.0 } else { candidate.support as f64 / result.population as f64 };
        writeln!(
            out,
            "{}\t{:.6}\t{}\t{:.4}\t{}",
            rank + 1,
            candidate.quality,
            candidate.support,
            frequency,
            candidate.names.join(" & ")
        )?;
    }
    out.flush()
}

fn to_file(path: &Path, write: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>) -> Result<()> {
    let file = File::create(path).map_err(|e| MinerError::io(path, e))?;
    let mut out = BufWriter::new(file);
    write(&mut out).map_err(|e| MinerError::io(path, e))?;
    info!(path = %path.display(), "export written");
    Ok(())
}

pub fn export_fimi_data(matrix: &StatementMatrix, path: &Path) -> Result<()> {
    to_file(path, |out| write_fimi_data(matrix, out))
}

pub fn export_fimi_names(matrix: &StatementMatrix, path: &Path) -> Result<()> {
    to_file(path, |out| write_fimi_names(matrix, out))
}

pub fn export_results(result: &SearchResult, path: &Path) -> Result<()> {
    to_file(path, |out| write_results(result, out))
}

/// Reads back a FIMI data/names pair written by the exports above.
pub fn read_fimi(id: &str, data: &Path, names: &Path) -> Result<StatementMatrix> {
    let data_text = fs::read_to_string(data).map_err(|e| MinerError::io(data, e))?;
    let names_text = fs::read_to_string(names).map_err(|e| MinerError::io(names, e))?;
    StatementMatrix::from_fimi(id, &data_text, &names_text)
}
