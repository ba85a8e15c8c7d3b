//! The batch run, stage by stage.
//!
//! ```text
//!  sample res csv ──► Table ──► FitData ──► ConstraintSystem ──► OlsFit ──► Composition
//!                                  │                                            │
//!                                  └──────────── Agreement ◄── Prediction ◄─────┤
//!  high res csv ──► Table ───────────────────────────────────► Prediction ◄────┘
//! ```
//!
//! Both predictions are appended to their source tables and written out.

use std::fmt;

use crate::composition::{Composition, PhaseFractions, Prediction};
use crate::config::Config;
use crate::constraints::{Coefficient, ConstraintSystem, FitData};
use crate::dataset::{self, Resolution, Table};
use crate::evaluation::{Agreement, Constituent, ConstituentAgreement};
use crate::export;
use crate::solver::OlsFit;
use crate::{Error, Result};

/// Everything printed at the end of a run
#[derive(Clone, Debug)]
pub struct Report {
    pub fit: OlsFit,
    pub composition: Composition<f64>,
    pub num_fit_samples: usize,
    pub agreements: Vec<ConstituentAgreement>,
}

/// Fit the phase composition on the rows of `table` selected by `mask`
///
/// # Errors
/// Returns an error if the selected rows are missing required columns or values, or if the
/// decomposition fails.
pub fn fit_composition(
    table: &Table,
    mask: &[bool],
) -> Result<(FitData<f64>, OlsFit, Composition<f64>)> {
    let data = FitData::from_table(table, mask)?;
    let fit = ConstraintSystem::build(&data)?.solve()?;
    let composition = Composition::from_fit(&fit)?;
    log::info!("fitted composition\n{composition}");
    Ok((data, fit, composition))
}

/// Predict every row of `table` with a fixed `composition` and write the augmented table
///
/// # Errors
/// Returns an error if phase columns are missing or the output cannot be written.
pub fn predict_and_export(
    table: &Table,
    composition: &Composition<f64>,
    resolution: Resolution,
    destination: &std::path::Path,
) -> Result<Prediction<f64>> {
    let prediction = composition.predict(&PhaseFractions::from_table(table, resolution)?);
    export::write(
        &export::augment(table, &prediction, resolution)?,
        destination,
    )?;
    Ok(prediction)
}

/// Compare fit subset predictions against the lab values they were fitted to
///
/// A subset too small for a line fit leaves the metrics empty and logs a warning.
///
/// # Errors
/// Returns an error if the line fit itself fails.
pub fn evaluate(
    data: &FitData<f64>,
    prediction: &Prediction<f64>,
    mask: &[bool],
) -> Result<Vec<ConstituentAgreement>> {
    Constituent::ALL
        .into_iter()
        .map(|constituent| {
            let (measured, predicted) = match constituent {
                Constituent::TotalIce => (&data.total_ice, &prediction.total_ice),
                Constituent::Organic => (&data.organic, &prediction.organic),
                Constituent::Mineral => (&data.mineral, &prediction.mineral),
            };
            let predicted = dataset::select(predicted, mask);
            let agreement = match Agreement::compute(measured, &predicted) {
                Ok(agreement) => Some(agreement),
                Err(Error::InsufficientData { needed, found }) => {
                    log::warn!(
                        "no {} metrics: {found} fit sample(s), {needed} needed",
                        constituent.name()
                    );
                    None
                }
                Err(err) => return Err(err),
            };
            Ok(ConstituentAgreement {
                constituent,
                agreement,
            })
        })
        .collect()
}

/// Run the full analysis described by `config`
///
/// # Errors
/// Returns an error if any input cannot be read, lacks expected columns, yields an empty fit
/// subset, or if any output cannot be written.
pub fn run(config: &Config) -> Result<Report> {
    let sample = Table::from_file(&config.input_path_sample_res, config.header_rows_skipped)?;
    let mask = sample.mask_below(dataset::DEPTH, config.depth_threshold)?;
    let num_fit_samples = mask.iter().filter(|&&selected| selected).count();
    if num_fit_samples == 0 {
        return Err(Error::EmptyFitSubset {
            threshold: config.depth_threshold,
        });
    }
    log::info!(
        "{num_fit_samples} of {} samples lie above depth {}",
        sample.len(),
        config.depth_threshold
    );

    let (data, fit, composition) = fit_composition(&sample, &mask)?;

    let prediction = predict_and_export(
        &sample,
        &composition,
        Resolution::Sample,
        &config.output_path_sample_res,
    )?;
    let agreements = evaluate(&data, &prediction, &mask)?;

    let high = Table::from_file(&config.input_path_high_res, config.header_rows_skipped)?;
    predict_and_export(
        &high,
        &composition,
        Resolution::High,
        &config.output_path_high_res,
    )?;

    Ok(Report {
        fit,
        composition,
        num_fit_samples,
        agreements,
    })
}

const RULE: &str =
    "==============================================================================";
const THIN_RULE: &str =
    "------------------------------------------------------------------------------";

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fit = &self.fit;
        writeln!(f, "{:^78}", "OLS Regression Results")?;
        writeln!(f, "{RULE}")?;
        writeln!(
            f,
            "{:<24}{:>12}    {:<30}{:>8.3}",
            "Fit samples:",
            self.num_fit_samples,
            "R-squared (uncentered):",
            fit.r_squared()
        )?;
        writeln!(
            f,
            "{:<24}{:>12}    {:<30}{:>8.3}",
            "No. Observations:",
            fit.nobs(),
            "Adj. R-squared (uncentered):",
            fit.adj_r_squared()
        )?;
        writeln!(
            f,
            "{:<24}{:>12}    {:<30}{:>8.3e}",
            "Df Residuals:",
            fit.df_resid(),
            "Residual mean:",
            fit.residual_mean()
        )?;
        writeln!(
            f,
            "{:<24}{:>12}    {:<30}{:>8.3e}",
            "Rank:",
            fit.rank(),
            "Residual std:",
            fit.residual_std()
        )?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "{:<16}{:>12}{:>12}{:>12}", "", "coef", "std err", "t")?;
        writeln!(f, "{THIN_RULE}")?;
        let t_values = fit.t_values();
        for coefficient in Coefficient::ALL {
            let ii = coefficient.index();
            writeln!(
                f,
                "{:<16}{:>12.4}{:>12.4}{:>12.3}",
                coefficient.label(),
                fit.params()[ii],
                fit.standard_errors()[ii],
                t_values[ii]
            )?;
        }
        writeln!(f, "{RULE}")?;
        writeln!(f, "Cond. No. {:.3}", fit.condition_number())?;
        if fit.is_degenerate() {
            writeln!(
                f,
                "Warning: the design matrix is ill-conditioned or rank deficient; \
                 the estimates are unreliable."
            )?;
        }
        writeln!(f)?;
        write!(f, "{}", self.composition)?;
        for agreement in &self.agreements {
            writeln!(f)?;
            write!(f, "{agreement}")?;
        }
        Ok(())
    }
}
