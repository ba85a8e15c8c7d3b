use std::fmt;

use ndarray::Array1;

use crate::math::vandermonde;
use crate::solver::ols;
use crate::{Error, Result};

/// Constituents compared against laboratory measurements, in report order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Constituent {
    TotalIce,
    Organic,
    Mineral,
}

impl Constituent {
    pub const ALL: [Self; 3] = [Self::TotalIce, Self::Organic, Self::Mineral];

    pub const fn name(self) -> &'static str {
        match self {
            Self::TotalIce => "total ice",
            Self::Organic => "organic",
            Self::Mineral => "mineral",
        }
    }
}

/// Agreement between CT predictions and laboratory measurements.
///
/// The line is fitted with the laboratory value as the regressor and the prediction as the
/// response. Deviations are signed prediction minus measurement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Agreement {
    pub slope: f64,
    pub slope_stderr: f64,
    pub intercept: f64,
    pub intercept_stderr: f64,
    /// Square of the Pearson correlation coefficient, zero if either series is constant
    pub r_squared: f64,
    pub rmse: f64,
    pub bias: f64,
}

impl Agreement {
    /// Compare `predicted` against `measured`
    ///
    /// # Errors
    /// Returns an error if the sequences differ in length or hold fewer than two points.
    #[allow(clippy::cast_precision_loss)]
    pub fn compute(measured: &Array1<f64>, predicted: &Array1<f64>) -> Result<Self> {
        let n = measured.len();
        if predicted.len() != n {
            return Err(Error::LengthMismatch {
                column: "predicted".to_owned(),
                expected: n,
                found: predicted.len(),
            });
        }
        if n < 2 {
            return Err(Error::InsufficientData {
                needed: 2,
                found: n,
            });
        }

        let design = vandermonde(&measured.to_vec(), 1)?;
        let line = ols(&design, predicted)?;

        let x_deviation = measured - measured.mean().unwrap_or_default();
        let y_deviation = predicted - predicted.mean().unwrap_or_default();
        let spread = x_deviation.dot(&x_deviation) * y_deviation.dot(&y_deviation);
        // A constant series is uncorrelated with anything
        let r = if spread > 0. {
            (x_deviation.dot(&y_deviation) / spread.sqrt()).clamp(-1., 1.)
        } else {
            0.
        };

        let difference = predicted - measured;
        let count = n as f64;

        Ok(Self {
            slope: line.params()[1],
            slope_stderr: line.standard_errors()[1],
            intercept: line.params()[0],
            intercept_stderr: line.standard_errors()[0],
            r_squared: r * r,
            rmse: (difference.dot(&difference) / count).sqrt(),
            bias: difference.sum() / count,
        })
    }
}

/// Agreement metrics for one constituent, formatted as six report lines
///
/// `agreement` is `None` when the fit subset is too small to compare, and every metric then
/// reads `n/a`.
#[derive(Clone, Copy, Debug)]
pub struct ConstituentAgreement {
    pub constituent: Constituent,
    pub agreement: Option<Agreement>,
}

impl fmt::Display for ConstituentAgreement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.constituent.name();
        writeln!(f, "Evaluation metrics for {name} content: ")?;
        let Some(Agreement {
            slope,
            slope_stderr,
            intercept,
            intercept_stderr,
            r_squared,
            rmse,
            bias,
        }) = self.agreement
        else {
            writeln!(f, "slope [-] ({name}, 95%): n/a")?;
            writeln!(f, "intercept [%] ({name}, 95%): n/a")?;
            writeln!(f, "R² ({name}): n/a")?;
            writeln!(f, "RMSE ({name}): n/a")?;
            return writeln!(f, "bias ({name}): n/a");
        };
        writeln!(f, "slope [-] ({name}, 95%): {slope:.3} +/- {slope_stderr:.3}")?;
        writeln!(
            f,
            "intercept [%] ({name}, 95%): {intercept:.3} +/- {intercept_stderr:.3}"
        )?;
        writeln!(f, "R² ({name}): {r_squared:.3}")?;
        writeln!(f, "RMSE ({name}): {rmse:.3}")?;
        writeln!(f, "bias ({name}): {bias:.3}")
    }
}
