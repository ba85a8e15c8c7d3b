use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use ndarray::Array1;

use crate::{Error, Result};

pub const DEPTH: &str = "depth";
pub const ORGANIC_LAB: &str = "organic_lab";
pub const MINERAL_LAB: &str = "mineral_lab";
pub const TOTAL_ICE_LAB: &str = "totalice_lab";

const PHASE_A_CT: &str = "phaseA_CT";
const PHASE_B_CT: &str = "phaseB_CT";
const EXCESS_ICE_CT: &str = "excessice_CT";
const PORE_ICE_CT: &str = "poreice_CT";
const TOTAL_ICE_CT: &str = "totalice_CT";
const ORGANIC_CT: &str = "organic_CT";
const MINERAL_CT: &str = "mineral_CT";

/// The two CT datasets share a schema up to a column suffix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// One row per laboratory sample, lab and CT columns side by side
    Sample,
    /// CT-only profile at scan resolution
    High,
}

impl Resolution {
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Sample => "",
            Self::High => "_hr",
        }
    }

    fn column(self, stem: &str) -> String {
        format!("{stem}{}", self.suffix())
    }

    pub fn phase_a(self) -> String {
        self.column(PHASE_A_CT)
    }

    pub fn phase_b(self) -> String {
        self.column(PHASE_B_CT)
    }

    pub fn excess_ice(self) -> String {
        self.column(EXCESS_ICE_CT)
    }

    /// Names of the derived columns, in the order they are appended on export
    pub fn prediction_columns(self) -> [String; 4] {
        [
            self.column(PORE_ICE_CT),
            self.column(TOTAL_ICE_CT),
            self.column(ORGANIC_CT),
            self.column(MINERAL_CT),
        ]
    }
}

/// A CSV table held as raw text.
///
/// Cells are kept verbatim so that a table written back out reproduces its original columns
/// exactly. Numeric columns are parsed on request with [`Table::column`].
#[derive(Clone, Debug)]
pub struct Table {
    source: PathBuf,
    pub(crate) headers: Vec<String>,
    pub(crate) rows: Vec<Vec<String>>,
}

impl Table {
    /// Read the table at `path`, discarding `header_rows_skipped` rows before the header row.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, is not valid CSV, has no header row after
    /// skipping, or contains rows whose length differs from the header.
    pub fn from_file(path: &Path, header_rows_skipped: usize) -> Result<Self> {
        let file = File::open(path).map_err(|source| Error::Io {
            path: path.to_owned(),
            source,
        })?;
        let table = Self::from_reader(file, header_rows_skipped, path)?;
        log::info!(
            "read {} rows x {} columns from {}",
            table.len(),
            table.headers.len(),
            path.display()
        );
        Ok(table)
    }

    /// As [`Table::from_file`], for any reader. `source` is only used in diagnostics.
    ///
    /// # Errors
    /// See [`Table::from_file`].
    pub fn from_reader<R: Read>(
        reader: R,
        header_rows_skipped: usize,
        source: &Path,
    ) -> Result<Self> {
        // The leading rows need not match the header width (units, long descriptions)
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut records = rdr.records();
        let mut headers = None;
        for _ in 0..=header_rows_skipped {
            headers = records.next().transpose().map_err(|err| Error::Csv {
                path: source.to_owned(),
                source: err,
            })?;
            if headers.is_none() {
                break;
            }
        }
        let headers: Vec<String> = headers
            .ok_or_else(|| Error::MissingHeader {
                path: source.to_owned(),
                skipped: header_rows_skipped,
            })?
            .iter()
            .map(ToOwned::to_owned)
            .collect();

        let mut rows = vec![];
        for (row, record) in records.enumerate() {
            let record = record.map_err(|err| Error::Csv {
                path: source.to_owned(),
                source: err,
            })?;
            if record.len() != headers.len() {
                return Err(Error::RaggedRow {
                    row,
                    expected: headers.len(),
                    found: record.len(),
                });
            }
            rows.push(record.iter().map(ToOwned::to_owned).collect());
        }

        Ok(Self {
            source: source.to_owned(),
            headers,
            rows,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_index(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|header| header == name)
            .ok_or_else(|| Error::MissingColumn {
                column: name.to_owned(),
                path: self.source.clone(),
            })
    }

    /// Parse the column `name` as floating point values.
    ///
    /// Empty cells are read as `NaN`, mirroring how missing values appear in exported profiles.
    ///
    /// # Errors
    /// Returns an error if the column is absent or a non-empty cell is not a number.
    pub fn column(&self, name: &str) -> Result<Array1<f64>> {
        let index = self.column_index(name)?;
        self.rows
            .iter()
            .enumerate()
            .map(|(row, fields)| {
                let value = fields[index].trim();
                if value.is_empty() {
                    return Ok(f64::NAN);
                }
                value.parse::<f64>().map_err(|_| Error::NonNumeric {
                    column: name.to_owned(),
                    row,
                    value: value.to_owned(),
                })
            })
            .collect()
    }

    /// Selection mask of the rows whose `column` value is strictly below `threshold`
    ///
    /// # Errors
    /// Returns an error if `column` is absent or not numeric.
    pub fn mask_below(&self, column: &str, threshold: f64) -> Result<Vec<bool>> {
        Ok(self
            .column(column)?
            .iter()
            .map(|&value| value < threshold)
            .collect())
    }
}

/// Keep the entries of `values` where `mask` is set, preserving order
pub fn select<E: Clone>(values: &Array1<E>, mask: &[bool]) -> Array1<E> {
    values
        .iter()
        .zip(mask)
        .filter_map(|(value, &keep)| keep.then(|| value.clone()))
        .collect()
}
