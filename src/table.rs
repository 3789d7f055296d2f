//! A small in-memory table for the CSV files exchanged with the simulation and the survey.
//!
//! Survey data and simulation output have open-ended column sets, so rows are kept as raw
//! [`StringRecord`]s and columns are looked up by name.
use crate::input::{input_err_msg, open_reader};
use anyhow::{Context, Result, ensure};
use csv::{ReaderBuilder, StringRecord};
use indexmap::IndexMap;
use itertools::Itertools;
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// A table of string values with named columns
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    headers: StringRecord,
    rows: Vec<StringRecord>,
}

/// Guess the delimiter of a CSV file from its header line.
///
/// MATSim writes semicolon-separated files, while survey data is usually comma-separated.
fn detect_delimiter(header_line: &[u8]) -> u8 {
    let count = |c| header_line.iter().filter(|&&b| b == c).count();
    if count(b';') > count(b',') {
        b';'
    } else {
        b','
    }
}

impl Table {
    /// Create a new table from headers and rows.
    ///
    /// Every row must have the same number of fields as the header.
    pub fn new<H, R>(headers: H, rows: R) -> Result<Self>
    where
        H: Into<StringRecord>,
        R: IntoIterator<Item = StringRecord>,
    {
        let headers = headers.into();
        let rows = rows.into_iter().collect_vec();
        for (idx, row) in rows.iter().enumerate() {
            ensure!(
                row.len() == headers.len(),
                "Row {idx} has {} fields but the header has {}",
                row.len(),
                headers.len()
            );
        }

        Ok(Self { headers, rows })
    }

    /// Read a table from a CSV file, which may be gzip-compressed.
    ///
    /// The delimiter (`,` or `;`) is detected from the header line.
    pub fn from_path(file_path: &Path) -> Result<Self> {
        let reader = open_reader(file_path)?;
        Self::from_reader(reader).with_context(|| input_err_msg(file_path))
    }

    /// Read a table from CSV data, detecting the delimiter
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = BufReader::new(reader);
        let mut header_line = Vec::new();
        reader.read_until(b'\n', &mut header_line)?;
        let delimiter = detect_delimiter(&header_line);

        // Put the header line back in front of the rest of the data
        let mut csv_reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .from_reader(header_line.as_slice().chain(reader));
        let headers = csv_reader.headers()?.clone();
        let rows: Vec<StringRecord> = csv_reader.records().try_collect()?;

        Ok(Self { headers, rows })
    }

    /// The column names
    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    /// Iterate over the rows of the table
    pub fn rows(&self) -> impl Iterator<Item = &StringRecord> {
        self.rows.iter()
    }

    /// The number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get the index of the named column
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|header| header == name)
            .with_context(|| format!("Missing column '{name}'"))
    }

    /// Iterate over the values of the named column
    pub fn column<'a>(&'a self, name: &str) -> Result<impl Iterator<Item = &'a str> + use<'a>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Keep only the rows for which `predicate` returns true
    pub fn retain<F>(&mut self, mut predicate: F)
    where
        F: FnMut(&StringRecord) -> bool,
    {
        self.rows.retain(|row| predicate(row));
    }

    /// Keep only the rows for which `predicate` returns `Ok(true)`, stopping at the first error
    pub fn try_retain<F>(&mut self, mut predicate: F) -> Result<()>
    where
        F: FnMut(&StringRecord) -> Result<bool>,
    {
        let mut kept = Vec::with_capacity(self.rows.len());
        for row in self.rows.drain(..) {
            if predicate(&row)? {
                kept.push(row);
            }
        }
        self.rows = kept;

        Ok(())
    }

    /// Replace values in the named column with the output of `f`.
    ///
    /// `f` returns `None` to leave a value untouched.
    pub fn map_column<F>(&mut self, name: &str, mut f: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let idx = self.column_index(name)?;
        for row in &mut self.rows {
            if let Some(new_value) = f(&row[idx]) {
                *row = row
                    .iter()
                    .enumerate()
                    .map(|(i, value)| if i == idx { new_value.as_str() } else { value })
                    .collect();
            }
        }

        Ok(())
    }

    /// Sum all numeric columns, grouped by the values of the column `by`.
    ///
    /// A column counts as numeric if every non-empty value in it parses as a float. Groups are
    /// sorted by key.
    pub fn group_sums(&self, by: &str) -> Result<GroupSums> {
        let by_idx = self.column_index(by)?;
        let numeric = (0..self.headers.len())
            .filter(|&idx| idx != by_idx)
            .filter(|&idx| {
                self.rows
                    .iter()
                    .map(|row| row[idx].trim())
                    .filter(|value| !value.is_empty())
                    .all(|value| value.parse::<f64>().is_ok())
            })
            .collect_vec();

        let mut groups: IndexMap<String, Vec<f64>> = IndexMap::new();
        for row in &self.rows {
            let sums = groups
                .entry(row[by_idx].to_string())
                .or_insert_with(|| vec![0.0; numeric.len()]);
            for (sum, &idx) in sums.iter_mut().zip(&numeric) {
                *sum += row[idx].trim().parse::<f64>().unwrap_or(0.0);
            }
        }
        groups.sort_unstable_keys();

        Ok(GroupSums {
            by: by.to_string(),
            columns: numeric
                .into_iter()
                .map(|idx| self.headers[idx].to_string())
                .collect(),
            groups,
        })
    }

    /// Write the table to a comma-separated file
    pub fn write_csv(&self, file_path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(file_path)
            .with_context(|| format!("Failed to create {}", file_path.display()))?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;

        Ok(())
    }
}

/// Sums of numeric columns per group, as produced by [`Table::group_sums`]
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSums {
    /// The name of the column the table was grouped by
    pub by: String,
    /// The names of the summed columns
    pub columns: Vec<String>,
    /// The sums for each group, in the same order as `columns`
    pub groups: IndexMap<String, Vec<f64>>,
}

impl fmt::Display for GroupSums {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key_width = self
            .groups
            .keys()
            .map(String::len)
            .chain([self.by.len()])
            .max()
            .unwrap_or_default();
        let widths = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                self.groups
                    .values()
                    .map(|sums| format!("{:.6}", sums[i]).len())
                    .chain([column.len()])
                    .max()
                    .unwrap_or_default()
            })
            .collect_vec();

        write!(f, "{:key_width$}", self.by)?;
        for (column, &width) in self.columns.iter().zip(&widths) {
            write!(f, "  {column:>width$}")?;
        }
        writeln!(f)?;

        for (key, sums) in &self.groups {
            write!(f, "{key:key_width$}")?;
            for (sum, &width) in sums.iter().zip(&widths) {
                write!(f, "  {sum:>width$.6}")?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}
