use std::path::PathBuf;

use thiserror::Error;

/// Everything that can abort a run.
///
/// Numerical degeneracy of the fit is deliberately absent: an ill-conditioned system still
/// produces estimates, which are flagged on [`crate::solver::OlsFit`] instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{}: {source}", path.display())]
    Csv { path: PathBuf, source: csv::Error },
    #[error("failed to parse configuration {}: {source}", path.display())]
    Config {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("{}: expected a header after skipping {skipped} row(s)", path.display())]
    MissingHeader { path: PathBuf, skipped: usize },
    #[error("{}: missing column `{column}`", path.display())]
    MissingColumn { column: String, path: PathBuf },
    #[error("column `{column}`, data row {row}: `{value}` is not a number")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },
    #[error("data row {row} has {found} fields, header has {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("column `{column}` has {found} values, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("no samples shallower than depth {threshold}")]
    EmptyFitSubset { threshold: f64 },
    #[error("at least {needed} points are required, found {found}")]
    InsufficientData { needed: usize, found: usize },
    #[error("invalid value {value} for `{name}`")]
    InvalidParameter { name: &'static str, value: f64 },
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
    #[error(transparent)]
    Linalg(#[from] ndarray_linalg::error::LinalgError),
}
