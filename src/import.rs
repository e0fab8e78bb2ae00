//! Delimited-file import of a [`DataTable`].
//!
//! Three files describe a table:
//! * the data file, one record per line and one field per attribute, no header;
//! * the attribute file, one attribute per line: `name;type;description[;levels]`
//!   where `type` is one of `numeric`, `integer`, `ordinal`, `categoric`, `date`,
//!   `name` and `levels` is a comma separated list (required for ordinals);
//! * an optional group file, one line per record listing that record's labels.
//!
//! Lines starting with `#` are comments in all three files. Empty lines are
//! skipped in the data and attribute files.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::info;

use crate::datatype::AttributeKind;
use crate::error::{MinerError, Result};
use crate::table::{Attribute, DataTable, ImportOptions};

fn reader<R: Read>(source: R, options: &ImportOptions) -> Result<csv::Reader<R>> {
    if !options.delimiter.is_ascii() {
        return Err(MinerError::configuration(format!(
            "delimiter '{}' must be a single ASCII character",
            options.delimiter
        )));
    }
    Ok(ReaderBuilder::new()
        .delimiter(options.delimiter as u8)
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(Trim::All)
        .from_reader(source))
}

fn records<R: Read>(source: R, options: &ImportOptions) -> Result<Vec<StringRecord>> {
    let mut rdr = reader(source, options)?;
    let mut rows = Vec::new();
    for record in rdr.records() {
        rows.push(record?);
    }
    Ok(rows)
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| MinerError::io(path, e))
}

/// Reads an attribute declaration file.
pub fn read_attributes<R: Read>(source: R, options: &ImportOptions) -> Result<Vec<Attribute>> {
    let mut attributes = Vec::new();
    for (line, record) in records(source, options)?.iter().enumerate() {
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        let name = record.get(0).unwrap_or_default();
        let token = record.get(1).ok_or_else(|| {
            MinerError::data_format(format!("attribute declaration '{name}' has no type"), Some(line))
        })?;
        if name.is_empty() {
            return Err(MinerError::data_format("attribute declaration without a name", Some(line)));
        }
        let kind = AttributeKind::from_schema(token, record.get(3))
            .map_err(|e| MinerError::data_format(format!("attribute '{name}': {e}"), Some(line)))?;
        attributes.push(Attribute::new(name, kind).with_description(record.get(2).unwrap_or_default()));
    }
    Ok(attributes)
}

/// Reads group labels, one line per record, so an empty line is a record
/// without labels. Empty fields are ignored.
pub fn read_groups<R: Read>(source: R, options: &ImportOptions) -> Result<Vec<Vec<String>>> {
    let mut groups = Vec::new();
    for line in BufReader::new(source).lines() {
        let line = line.map_err(|e| MinerError::data_format(format!("unreadable group line: {e}"), Some(groups.len())))?;
        if line.starts_with('#') {
            continue;
        }
        groups.push(
            line.split(options.delimiter)
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect(),
        );
    }
    Ok(groups)
}

/// Builds a table from in-memory sources.
pub fn table_from_readers<D: Read, A: Read, G: Read>(
    id: &str,
    data: D,
    attributes: A,
    groups: Option<G>,
    options: &ImportOptions,
) -> Result<DataTable> {
    let attributes = read_attributes(attributes, options)?;
    let rows: Vec<Vec<String>> = records(data, options)?
        .iter()
        .map(|r| r.iter().map(str::to_string).collect())
        .collect();
    let labels = match groups {
        Some(g) => Some(read_groups(g, options)?),
        None => None,
    };
    DataTable::from_rows(id, attributes, &rows, labels, options)
}

/// Imports a table from files on disk.
pub fn import_table(
    id: &str,
    data: &Path,
    attributes: &Path,
    groups: Option<&Path>,
    options: &ImportOptions,
) -> Result<DataTable> {
    let groups = groups.map(open).transpose()?;
    let table = table_from_readers(id, open(data)?, open(attributes)?, groups, options).map_err(|e| match e {
        MinerError::DataFormat { message, record } => {
            MinerError::data_format(format!("{message} (while importing '{}')", data.display()), record)
        }
        other => other,
    })?;
    info!(table = id, records = table.len(), attributes = table.attributes().len(), "table imported");
    Ok(table)
}
