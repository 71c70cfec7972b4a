//! CSV export of dataset tables
//!
//! Columns appear in the order they are first seen across rows. Rows that
//! end up with no columns (for example after filtering) are skipped.

use crate::crawler::Dataset;
use crate::output::OutputResult;
use crate::plugin::Row;
use csv::Writer;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A table assembled from rows with possibly different columns
#[derive(Debug, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<(usize, String)>>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from dataset rows, keeping only the selected columns
    pub fn from_rows<'a, I>(rows: I, filter: &ColumnFilter) -> Self
    where
        I: IntoIterator<Item = &'a Row>,
    {
        let mut table = Self::new();
        for row in rows {
            table.add_row(
                row.iter()
                    .filter(|(column, _)| filter.matches(column))
                    .map(|(column, value)| (column.clone(), value.clone())),
            );
        }
        table
    }

    pub fn add_row(&mut self, row: impl IntoIterator<Item = (String, String)>) {
        let mut cells = Vec::new();
        for (column, value) in row {
            let idx = match self.columns.iter().position(|c| *c == column) {
                Some(idx) => idx,
                None => {
                    self.columns.push(column);
                    self.columns.len() - 1
                }
            };
            cells.push((idx, value));
        }

        if !cells.is_empty() {
            cells.sort_by_key(|(idx, _)| *idx);
            self.rows.push(cells);
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Writes the header and all rows as CSV
    pub fn write(&self, out: impl Write) -> OutputResult<()> {
        let mut csv = Writer::from_writer(out);
        csv.write_record(&self.columns)?;

        for cells in &self.rows {
            let mut record = vec![""; self.columns.len()];
            for (idx, value) in cells {
                record[*idx] = value.as_str();
            }
            csv.write_record(&record)?;
        }

        csv.flush()?;
        Ok(())
    }
}

/// Case-insensitive substring filter on column names
///
/// An empty filter keeps every column.
#[derive(Debug, Clone, Default)]
pub struct ColumnFilter {
    needles: Vec<String>,
}

impl ColumnFilter {
    /// # Arguments
    ///
    /// * `needles` - Column name fragments; entries may hold comma separated lists
    pub fn new<S: AsRef<str>>(needles: &[S]) -> Self {
        let needles = needles
            .iter()
            .flat_map(|n| n.as_ref().split(','))
            .map(|n| n.trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .collect();
        Self { needles }
    }

    pub fn matches(&self, column: &str) -> bool {
        if self.needles.is_empty() {
            return true;
        }
        let column = column.to_lowercase();
        self.needles.iter().any(|needle| column.contains(needle))
    }
}

/// Turns a dataset key into a safe file stem
fn file_stem(key: &str) -> String {
    let stem: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "table".to_string()
    } else {
        stem
    }
}

/// Writes every dataset table to `<dir>/<key>.csv`
///
/// # Arguments
///
/// * `dataset` - The crawl result
/// * `dir` - Output directory, created if missing
/// * `filter` - Columns to keep
///
/// # Returns
///
/// Paths of the written files, in key order
pub fn write_dataset(
    dataset: &Dataset,
    dir: &Path,
    filter: &ColumnFilter,
) -> OutputResult<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    let mut written = Vec::new();
    for (key, rows) in dataset.iter() {
        let table = Table::from_rows(rows, filter);
        let path = dir.join(format!("{}.csv", file_stem(key)));
        table.write(File::create(&path)?)?;

        tracing::info!(
            "Wrote {} row(s) of '{}' to {}",
            table.row_count(),
            key,
            path.display()
        );
        written.push(path);
    }
    Ok(written)
}
