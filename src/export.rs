use std::fmt::Display;
use std::path::Path;

use num_traits::Float;

use crate::composition::Prediction;
use crate::dataset::{Resolution, Table};
use crate::{Error, Result};

/// Append the prediction columns to `table`, leaving the original columns and row order intact.
///
/// Missing values are written as empty cells.
///
/// # Errors
/// Returns an error if the prediction does not have one entry per row of `table`.
pub fn augment<E: Float + Display>(
    table: &Table,
    prediction: &Prediction<E>,
    resolution: Resolution,
) -> Result<Table> {
    if prediction.len() != table.len() {
        return Err(Error::LengthMismatch {
            column: resolution.prediction_columns()[0].clone(),
            expected: table.len(),
            found: prediction.len(),
        });
    }

    let columns = prediction.columns(resolution);
    let mut augmented = table.clone();
    augmented
        .headers
        .extend(columns.iter().map(|(name, _)| name.clone()));
    for (ii, row) in augmented.rows.iter_mut().enumerate() {
        row.extend(columns.iter().map(|(_, values)| format_value(values[ii])));
    }
    Ok(augmented)
}

fn format_value<E: Float + Display>(value: E) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

/// Write `table` as CSV with a single header row and no index column
///
/// # Errors
/// Returns an error if `path` cannot be created or written.
pub fn write(table: &Table, path: &Path) -> Result<()> {
    let csv_error = |source| Error::Csv {
        path: path.to_owned(),
        source,
    };
    let mut wtr = csv::Writer::from_path(path).map_err(csv_error)?;
    wtr.write_record(&table.headers).map_err(csv_error)?;
    for row in &table.rows {
        wtr.write_record(row).map_err(csv_error)?;
    }
    wtr.flush().map_err(|source| Error::Io {
        path: path.to_owned(),
        source,
    })?;
    log::info!(
        "wrote {} rows x {} columns to {}",
        table.len(),
        table.headers.len(),
        path.display()
    );
    Ok(())
}
