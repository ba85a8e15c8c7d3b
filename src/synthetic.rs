//! Synthetic cores of known composition.
//!
//! Lab values are derived from the CT phase fractions through the balance equations, optionally
//! perturbed with Gaussian noise, so that a fit on noise-free data must recover the generating
//! composition.

use std::path::Path;

use itertools::izip;
use ndarray::{Array, Array1};
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::{Normal, Uniform};
use ndarray_rand::RandomExt;
use serde::Serialize;

use crate::composition::{Composition, PhaseFractions};
use crate::dataset::{self, Resolution};
use crate::{Error, Result};

/// CT phase fractions along a core, with depths in cm
#[derive(Clone, Debug)]
pub struct SyntheticCore {
    pub composition: Composition<f64>,
    pub depth: Array1<f64>,
    pub phase_a: Array1<f64>,
    pub phase_b: Array1<f64>,
    pub excess_ice: Array1<f64>,
}

#[derive(Serialize)]
struct SampleRow {
    depth: f64,
    organic_lab: f64,
    mineral_lab: f64,
    totalice_lab: f64,
    phase_a: f64,
    phase_b: f64,
    excess_ice: f64,
}

#[derive(Serialize)]
struct HighResRow {
    depth: f64,
    phase_a: f64,
    phase_b: f64,
    excess_ice: f64,
}

impl SyntheticCore {
    /// Draw `num_samples` evenly spaced records down to `max_depth`
    #[allow(clippy::cast_precision_loss)]
    pub fn generate<R: Rng>(
        rng: &mut R,
        composition: Composition<f64>,
        num_samples: usize,
        max_depth: f64,
    ) -> Self {
        let depth = (0..num_samples)
            .map(|ii| max_depth * (ii as f64 + 0.5) / num_samples as f64)
            .collect();
        Self {
            composition,
            depth,
            phase_a: Array::random_using(num_samples, Uniform::new(0.1, 0.5), rng),
            phase_b: Array::random_using(num_samples, Uniform::new(0.1, 0.4), rng),
            excess_ice: Array::random_using(num_samples, Uniform::new(0., 0.1), rng),
        }
    }

    pub fn len(&self) -> usize {
        self.depth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depth.is_empty()
    }

    /// Write the paired lab and CT table, perturbing lab values by `lab_noise` standard deviation
    ///
    /// # Errors
    /// Returns an error if `lab_noise` is negative or not finite, or if the file cannot be written.
    pub fn write_sample_resolution<R: Rng>(
        &self,
        path: &Path,
        lab_noise: f64,
        rng: &mut R,
    ) -> Result<()> {
        let phases = PhaseFractions::new(
            self.phase_a.clone(),
            self.phase_b.clone(),
            self.excess_ice.clone(),
        )?;
        let lab = self.composition.predict(&phases);
        let noise = Normal::new(0., lab_noise).map_err(|_| Error::InvalidParameter {
            name: "lab_noise",
            value: lab_noise,
        })?;
        let mut perturb =
            |values: &Array1<f64>| values + &Array::random_using(self.len(), noise, rng);
        let organic = perturb(&lab.organic);
        let mineral = perturb(&lab.mineral);
        let total_ice = perturb(&lab.total_ice);

        let resolution = Resolution::Sample;
        let header = [
            dataset::DEPTH.to_owned(),
            dataset::ORGANIC_LAB.to_owned(),
            dataset::MINERAL_LAB.to_owned(),
            dataset::TOTAL_ICE_LAB.to_owned(),
            resolution.phase_a(),
            resolution.phase_b(),
            resolution.excess_ice(),
        ];
        let units = ["cm", "-", "-", "-", "-", "-", "-"];
        let rows = izip!(
            &self.depth,
            &organic,
            &mineral,
            &total_ice,
            &self.phase_a,
            &self.phase_b,
            &self.excess_ice
        )
        .map(
            |(&depth, &organic_lab, &mineral_lab, &totalice_lab, &phase_a, &phase_b, &excess_ice)| {
                SampleRow {
                    depth,
                    organic_lab,
                    mineral_lab,
                    totalice_lab,
                    phase_a,
                    phase_b,
                    excess_ice,
                }
            },
        );
        write_with_units(path, &units, &header, rows)
    }

    /// Write the CT-only table with `_hr` column names
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn write_high_resolution(&self, path: &Path) -> Result<()> {
        let resolution = Resolution::High;
        let header = [
            format!("{}{}", dataset::DEPTH, resolution.suffix()),
            resolution.phase_a(),
            resolution.phase_b(),
            resolution.excess_ice(),
        ];
        let units = ["cm", "-", "-", "-"];
        let rows = izip!(&self.depth, &self.phase_a, &self.phase_b, &self.excess_ice).map(
            |(&depth, &phase_a, &phase_b, &excess_ice)| HighResRow {
                depth,
                phase_a,
                phase_b,
                excess_ice,
            },
        );
        write_with_units(path, &units, &header, rows)
    }
}

/// Write a units row, a header row, then one serialized record per row
fn write_with_units<T: Serialize>(
    path: &Path,
    units: &[&str],
    header: &[String],
    rows: impl Iterator<Item = T>,
) -> Result<()> {
    let csv_error = |source| Error::Csv {
        path: path.to_owned(),
        source,
    };
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_error)?;
    wtr.write_record(units).map_err(csv_error)?;
    wtr.write_record(header).map_err(csv_error)?;
    for row in rows {
        wtr.serialize(row).map_err(csv_error)?;
    }
    wtr.flush().map_err(|source| Error::Io {
        path: path.to_owned(),
        source,
    })
}
