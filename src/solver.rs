use ndarray::{Array1, Array2};
use ndarray_linalg::{Eigh, LeastSquaresResult, LeastSquaresSvd, UPLO};

use crate::constraints::ConstraintSystem;
use crate::{Error, Result};

/// Condition numbers above this indicate strong collinearity between design columns
pub const CONDITION_NUMBER_LIMIT: f64 = 1e3;

/// An ordinary least squares estimate and its diagnostics.
#[derive(Clone, Debug)]
pub struct OlsFit {
    params: Array1<f64>,
    standard_errors: Array1<f64>,
    residuals: Array1<f64>,
    /// Sum of squared targets, the total sum of squares of a model without a constant
    uncentered_tss: f64,
    rank: usize,
    condition_number: f64,
}

/// Minimise $\lVert y - X \beta \rVert^2$.
///
/// The estimate comes from LAPACK's SVD driver, so rank deficient designs still produce the
/// minimum norm solution. Standard errors use the pseudo-inverse of $X^T X$ and are `NaN` when
/// there are no residual degrees of freedom.
///
/// # Errors
/// Returns an error if `design` has no rows, if its shape does not match `target`, or if the
/// decomposition fails.
pub fn ols(design: &Array2<f64>, target: &Array1<f64>) -> Result<OlsFit> {
    let (nobs, num_params) = design.dim();
    if nobs == 0 {
        return Err(Error::InsufficientData {
            needed: 1,
            found: 0,
        });
    }
    if target.len() != nobs {
        return Err(Error::LengthMismatch {
            column: "target".to_owned(),
            expected: nobs,
            found: target.len(),
        });
    }

    let LeastSquaresResult { solution, rank, .. } = design.least_squares(target)?;
    let residuals = target - &design.dot(&solution);

    // Eigenvalues come back in ascending order
    let gram = design.t().dot(design);
    let (eigenvalues, eigenvectors) = gram.eigh(UPLO::Lower)?;
    let largest = eigenvalues[num_params - 1];
    let smallest = eigenvalues[0];
    let condition_number = if smallest > 0. {
        (largest / smallest).sqrt()
    } else {
        f64::INFINITY
    };

    #[allow(clippy::cast_precision_loss)]
    let tolerance = largest * num_params as f64 * f64::EPSILON;
    let inverse_eigenvalues = eigenvalues.mapv(|l| if l > tolerance { l.recip() } else { 0. });
    let unscaled_covariance = (&eigenvectors * &inverse_eigenvalues).dot(&eigenvectors.t());

    let mut fit = OlsFit {
        params: solution,
        standard_errors: Array1::zeros(num_params),
        uncentered_tss: target.dot(target),
        residuals,
        rank: usize::try_from(rank).unwrap_or_default(),
        condition_number,
    };
    let scale = fit.scale();
    fit.standard_errors = unscaled_covariance
        .diag()
        .mapv(|variance| (variance * scale).sqrt());

    Ok(fit)
}

impl ConstraintSystem<f64> {
    /// Fit the four composition coefficients
    ///
    /// Ill-conditioned systems are not an error: the estimates are returned and a warning is
    /// logged, see [`OlsFit::is_degenerate`].
    ///
    /// # Errors
    /// Returns an error if the decomposition fails.
    pub fn solve(&self) -> Result<OlsFit> {
        let fit = ols(&self.matrix, &self.rhs)?;
        log::info!(
            "fitted {} coefficients to {} equations, rank {}, condition number {:.3e}",
            fit.params.len(),
            fit.nobs(),
            fit.rank,
            fit.condition_number
        );
        if fit.is_degenerate() {
            log::warn!(
                "constraint system is ill-conditioned (rank {} of {}, condition number {:.3e}, \
                 {} residual degrees of freedom); estimates are unreliable",
                fit.rank,
                fit.params.len(),
                fit.condition_number,
                fit.df_resid()
            );
        }
        Ok(fit)
    }
}

impl OlsFit {
    pub const fn params(&self) -> &Array1<f64> {
        &self.params
    }

    pub const fn standard_errors(&self) -> &Array1<f64> {
        &self.standard_errors
    }

    pub const fn residuals(&self) -> &Array1<f64> {
        &self.residuals
    }

    pub const fn rank(&self) -> usize {
        self.rank
    }

    /// $\sqrt{\lambda_{max} / \lambda_{min}}$ of $X^T X$
    pub const fn condition_number(&self) -> f64 {
        self.condition_number
    }

    pub fn nobs(&self) -> usize {
        self.residuals.len()
    }

    #[allow(clippy::cast_possible_wrap)]
    pub fn df_resid(&self) -> isize {
        self.nobs() as isize - self.params.len() as isize
    }

    pub fn rss(&self) -> f64 {
        self.residuals.dot(&self.residuals)
    }

    /// Residual variance estimate
    #[allow(clippy::cast_precision_loss)]
    fn scale(&self) -> f64 {
        match self.df_resid() {
            df if df > 0 => self.rss() / df as f64,
            _ => f64::NAN,
        }
    }

    pub fn t_values(&self) -> Array1<f64> {
        &self.params / &self.standard_errors
    }

    /// Coefficient of determination of a model without a constant term
    pub fn r_squared(&self) -> f64 {
        1. - self.rss() / self.uncentered_tss
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn adj_r_squared(&self) -> f64 {
        1. - self.nobs() as f64 / self.df_resid() as f64 * (1. - self.r_squared())
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn residual_mean(&self) -> f64 {
        self.residuals.sum() / self.nobs() as f64
    }

    /// Sample standard deviation of the residuals
    pub fn residual_std(&self) -> f64 {
        if self.nobs() < 2 {
            return f64::NAN;
        }
        self.residuals.std(1.)
    }

    /// Whether the estimates should not be trusted
    pub fn is_degenerate(&self) -> bool {
        self.rank < self.params.len()
            || self.df_resid() <= 0
            || self.condition_number.is_nan()
            || self.condition_number > CONDITION_NUMBER_LIMIT
            || self.params.iter().any(|p| !p.is_finite())
    }
}
