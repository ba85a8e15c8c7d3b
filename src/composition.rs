use std::fmt;

use itertools::izip;
use ndarray::Array1;
use num_traits::Float;

use crate::constraints::{Coefficient, NUM_COEFFICIENTS};
use crate::dataset::{Resolution, Table};
use crate::solver::OlsFit;
use crate::{Error, Result};

/// Material makeup of one CT phase, as volume fractions of the phase.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhaseComposition<E> {
    pub organic: E,
    pub mineral: E,
    pub ice: E,
}

impl<E: Float> PhaseComposition<E> {
    /// Complete a phase from its fitted organic and mineral fractions, the remainder being ice.
    ///
    /// No clamping is applied: a negative remainder is returned as is.
    pub fn from_fitted(organic: E, mineral: E) -> Self {
        Self {
            organic,
            mineral,
            ice: E::one() - organic - mineral,
        }
    }

    pub fn total(&self) -> E {
        self.organic + self.mineral + self.ice
    }

    /// Whether every fraction lies in `[0, 1]`
    pub fn is_physical(&self) -> bool {
        [self.organic, self.mineral, self.ice]
            .into_iter()
            .all(|fraction| fraction >= E::zero() && fraction <= E::one())
    }
}

/// Composition of both CT phases, fixed once fitted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Composition<E> {
    pub phase_a: PhaseComposition<E>,
    pub phase_b: PhaseComposition<E>,
}

impl<E: Float> Composition<E> {
    /// Build from fitted coefficients ordered as [`Coefficient::ALL`]
    ///
    /// # Errors
    /// Returns an error unless exactly four coefficients are passed.
    pub fn from_params(params: &Array1<E>) -> Result<Self> {
        if params.len() != NUM_COEFFICIENTS {
            return Err(Error::LengthMismatch {
                column: "coefficients".to_owned(),
                expected: NUM_COEFFICIENTS,
                found: params.len(),
            });
        }
        let get = |coefficient: Coefficient| params[coefficient.index()];
        Ok(Self {
            phase_a: PhaseComposition::from_fitted(
                get(Coefficient::PhaseAOrganic),
                get(Coefficient::PhaseAMineral),
            ),
            phase_b: PhaseComposition::from_fitted(
                get(Coefficient::PhaseBOrganic),
                get(Coefficient::PhaseBMineral),
            ),
        })
    }

    pub fn is_physical(&self) -> bool {
        self.phase_a.is_physical() && self.phase_b.is_physical()
    }

    /// Predict constituent contents for every record of `phases`.
    ///
    /// Each record's prediction depends on that record alone.
    pub fn predict(&self, phases: &PhaseFractions<E>) -> Prediction<E> {
        let n = phases.len();
        let mut mineral = Vec::with_capacity(n);
        let mut organic = Vec::with_capacity(n);
        let mut pore_ice = Vec::with_capacity(n);
        let mut total_ice = Vec::with_capacity(n);

        for (&a, &b, &excess) in izip!(&phases.phase_a, &phases.phase_b, &phases.excess_ice) {
            let ice = self.phase_a.ice * a + self.phase_b.ice * b;
            mineral.push(self.phase_a.mineral * a + self.phase_b.mineral * b);
            organic.push(self.phase_a.organic * a + self.phase_b.organic * b);
            pore_ice.push(ice);
            total_ice.push(ice + excess);
        }

        Prediction {
            mineral: Array1::from_vec(mineral),
            organic: Array1::from_vec(organic),
            pore_ice: Array1::from_vec(pore_ice),
            total_ice: Array1::from_vec(total_ice),
        }
    }
}

impl Composition<f64> {
    /// Close the fitted coefficients of `fit`, logging a warning for non-physical fractions
    ///
    /// # Errors
    /// Returns an error if `fit` does not hold four coefficients.
    pub fn from_fit(fit: &OlsFit) -> Result<Self> {
        let composition = Self::from_params(fit.params())?;
        if !composition.is_physical() {
            log::warn!("fitted composition has fractions outside [0, 1]: {composition}");
        }
        Ok(composition)
    }
}

impl<E: fmt::Display> fmt::Display for Composition<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, phase) in [("A", &self.phase_a), ("B", &self.phase_b)] {
            writeln!(
                f,
                "phase {name}: organic {:.4}, mineral {:.4}, pore ice {:.4}",
                phase.organic, phase.mineral, phase.ice
            )?;
        }
        Ok(())
    }
}

/// CT phase fractions of a table, at either resolution
#[derive(Clone, Debug)]
pub struct PhaseFractions<E> {
    phase_a: Array1<E>,
    phase_b: Array1<E>,
    excess_ice: Array1<E>,
}

impl<E> PhaseFractions<E> {
    /// # Errors
    /// Returns an error if the three columns differ in length.
    pub fn new(phase_a: Array1<E>, phase_b: Array1<E>, excess_ice: Array1<E>) -> Result<Self> {
        for (column, found) in [("phase_b", phase_b.len()), ("excess_ice", excess_ice.len())] {
            if found != phase_a.len() {
                return Err(Error::LengthMismatch {
                    column: column.to_owned(),
                    expected: phase_a.len(),
                    found,
                });
            }
        }
        Ok(Self {
            phase_a,
            phase_b,
            excess_ice,
        })
    }

    pub fn len(&self) -> usize {
        self.phase_a.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phase_a.is_empty()
    }
}

impl PhaseFractions<f64> {
    /// # Errors
    /// Returns an error if a phase or excess ice column is absent or not numeric.
    pub fn from_table(table: &Table, resolution: Resolution) -> Result<Self> {
        Self::new(
            table.column(&resolution.phase_a())?,
            table.column(&resolution.phase_b())?,
            table.column(&resolution.excess_ice())?,
        )
    }
}

/// Predicted volumetric contents, one entry per record
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction<E> {
    pub mineral: Array1<E>,
    pub organic: Array1<E>,
    pub pore_ice: Array1<E>,
    pub total_ice: Array1<E>,
}

impl<E> Prediction<E> {
    pub fn len(&self) -> usize {
        self.mineral.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mineral.is_empty()
    }

    /// Named columns in export order
    pub fn columns(&self, resolution: Resolution) -> [(String, &Array1<E>); 4] {
        let [pore_ice, total_ice, organic, mineral] = resolution.prediction_columns();
        [
            (pore_ice, &self.pore_ice),
            (total_ice, &self.total_ice),
            (organic, &self.organic),
            (mineral, &self.mineral),
        ]
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{arr1, Array, Array1};
    use ndarray_rand::rand::SeedableRng;
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;
    use proptest::prelude::*;
    use rand_isaac::Isaac64Rng;

    use super::{Composition, PhaseComposition, PhaseFractions};
    use crate::constraints::tests::exact_fit_data;
    use crate::constraints::ConstraintSystem;
    use crate::dataset::Resolution;
    use crate::{Error, Result};

    fn reference_composition() -> Composition<f64> {
        Composition::from_params(&arr1(&[0.3, 0.5, 0.1, 0.2])).unwrap()
    }

    #[test]
    fn ice_is_the_remainder_of_each_phase() {
        let composition = reference_composition();
        approx::assert_relative_eq!(composition.phase_a.ice, 0.2, max_relative = 1e-12);
        approx::assert_relative_eq!(composition.phase_b.ice, 0.7, max_relative = 1e-12);
        assert!(composition.is_physical());
    }

    #[test]
    fn non_physical_fractions_are_passed_through() {
        let phase = PhaseComposition::from_fitted(0.7, 0.6);
        approx::assert_relative_eq!(phase.ice, -0.3, max_relative = 1e-12);
        assert!(!phase.is_physical());

        let composition = Composition::from_params(&arr1(&[-0.1, 0.5, 0.1, 1.2])).unwrap();
        approx::assert_relative_eq!(composition.phase_a.organic, -0.1);
        approx::assert_relative_eq!(composition.phase_b.ice, -0.3, max_relative = 1e-12);
        assert!(!composition.is_physical());
    }

    #[test]
    fn wrong_number_of_coefficients_is_rejected() {
        let err = Composition::from_params(&arr1(&[0.1, 0.2, 0.3])).unwrap_err();
        assert!(matches!(err, Error::LengthMismatch { expected: 4, found: 3, .. }));
    }

    #[test]
    fn predictions_follow_the_linear_model() -> Result<()> {
        let composition = reference_composition();
        let phases = PhaseFractions::new(arr1(&[0.4, 0.1]), arr1(&[0.3, 0.8]), arr1(&[0.1, 0.]))?;

        let prediction = composition.predict(&phases);

        let expected_mineral = [0.4 * 0.5 + 0.3 * 0.2, 0.1 * 0.5 + 0.8 * 0.2];
        let expected_organic = [0.4 * 0.3 + 0.3 * 0.1, 0.1 * 0.3 + 0.8 * 0.1];
        let expected_pore_ice = [0.4 * 0.2 + 0.3 * 0.7, 0.1 * 0.2 + 0.8 * 0.7];
        for ii in 0..2 {
            approx::assert_relative_eq!(prediction.mineral[ii], expected_mineral[ii], max_relative = 1e-12);
            approx::assert_relative_eq!(prediction.organic[ii], expected_organic[ii], max_relative = 1e-12);
            approx::assert_relative_eq!(prediction.pore_ice[ii], expected_pore_ice[ii], max_relative = 1e-12);
        }
        approx::assert_relative_eq!(
            prediction.total_ice[0],
            expected_pore_ice[0] + 0.1,
            max_relative = 1e-12
        );
        approx::assert_relative_eq!(prediction.total_ice[1], expected_pore_ice[1], max_relative = 1e-12);
        Ok(())
    }

    #[test]
    fn same_composition_serves_both_resolutions() -> Result<()> {
        let seed = 40;
        let mut rng = Isaac64Rng::seed_from_u64(seed);
        let composition = reference_composition();

        let sample = PhaseFractions::new(
            Array::random_using(10, Uniform::new(0.1, 0.5), &mut rng),
            Array::random_using(10, Uniform::new(0.1, 0.4), &mut rng),
            Array::random_using(10, Uniform::new(0., 0.1), &mut rng),
        )?;
        // Every sample record reappears somewhere in a denser profile
        let indices = (0..40).map(|ii| (ii * 7) % 10).collect::<Vec<usize>>();
        let high = PhaseFractions::new(
            indices.iter().map(|&ii| sample.phase_a[ii]).collect(),
            indices.iter().map(|&ii| sample.phase_b[ii]).collect(),
            indices.iter().map(|&ii| sample.excess_ice[ii]).collect(),
        )?;

        let at_sample = composition.predict(&sample);
        let at_high = composition.predict(&high);

        assert_eq!(at_high.len(), 40);
        for (jj, &ii) in indices.iter().enumerate() {
            assert_eq!(at_high.mineral[jj], at_sample.mineral[ii]);
            assert_eq!(at_high.organic[jj], at_sample.organic[ii]);
            assert_eq!(at_high.pore_ice[jj], at_sample.pore_ice[ii]);
            assert_eq!(at_high.total_ice[jj], at_sample.total_ice[ii]);
        }
        Ok(())
    }

    #[test]
    fn fitted_composition_reproduces_exact_lab_values() -> Result<()> {
        let data = exact_fit_data(
            [0.3, 0.5, 0.1, 0.2],
            arr1(&[0.2, 0.5, 0.35, 0.6]),
            arr1(&[0.6, 0.3, 0.45, 0.1]),
            arr1(&[0.05, 0.1, 0., 0.2]),
        );
        let fit = ConstraintSystem::build(&data)?.solve()?;
        let composition = Composition::from_fit(&fit)?;

        let phases = PhaseFractions::new(
            data.phase_a.clone(),
            data.phase_b.clone(),
            data.excess_ice.clone(),
        )?;
        let prediction = composition.predict(&phases);

        for (predicted, lab) in [
            (&prediction.organic, &data.organic),
            (&prediction.mineral, &data.mineral),
            (&prediction.total_ice, &data.total_ice),
        ] {
            for (p, l) in predicted.iter().zip(lab.iter()) {
                approx::assert_abs_diff_eq!(p, l, epsilon = 1e-9);
            }
        }
        Ok(())
    }

    #[test]
    fn prediction_columns_are_named_per_resolution() -> Result<()> {
        let phases = PhaseFractions::new(arr1(&[0.4]), arr1(&[0.3]), arr1(&[0.1]))?;
        let prediction = reference_composition().predict(&phases);

        let names = prediction
            .columns(Resolution::High)
            .map(|(name, _)| name);
        assert_eq!(
            names,
            ["poreice_CT_hr", "totalice_CT_hr", "organic_CT_hr", "mineral_CT_hr"].map(String::from)
        );
        let [(_, pore_ice), (_, total_ice), (_, organic), (_, mineral)] =
            prediction.columns(Resolution::Sample);
        assert_eq!(pore_ice, &prediction.pore_ice);
        assert_eq!(total_ice, &prediction.total_ice);
        assert_eq!(organic, &prediction.organic);
        assert_eq!(mineral, &prediction.mineral);
        Ok(())
    }

    proptest! {
        #[test]
        fn phase_fractions_sum_to_one(organic in -2.0..2.0f64, mineral in -2.0..2.0f64) {
            let phase = PhaseComposition::from_fitted(organic, mineral);
            approx::assert_abs_diff_eq!(phase.total(), 1., epsilon = 1e-12);
        }

        #[test]
        fn changing_one_record_leaves_the_others_untouched(
            n in 2..50usize,
            changed in 0..50usize,
            a in 0.0..1.0f64,
            b in 0.0..1.0f64,
            seed in any::<u64>(),
        ) {
            let changed = changed % n;
            let mut rng = Isaac64Rng::seed_from_u64(seed);
            let composition = reference_composition();
            let phase_a: Array1<f64> = Array::random_using(n, Uniform::new(0., 1.), &mut rng);
            let phase_b: Array1<f64> = Array::random_using(n, Uniform::new(0., 1.), &mut rng);
            let excess: Array1<f64> = Array::random_using(n, Uniform::new(0., 0.2), &mut rng);

            let before = composition.predict(
                &PhaseFractions::new(phase_a.clone(), phase_b.clone(), excess.clone()).unwrap(),
            );
            let mut modified_a = phase_a;
            let mut modified_b = phase_b;
            modified_a[changed] = a;
            modified_b[changed] = b;
            let after = composition.predict(
                &PhaseFractions::new(modified_a, modified_b, excess).unwrap(),
            );

            for ii in (0..n).filter(|&ii| ii != changed) {
                prop_assert_eq!(before.mineral[ii], after.mineral[ii]);
                prop_assert_eq!(before.organic[ii], after.organic[ii]);
                prop_assert_eq!(before.pore_ice[ii], after.pore_ice[ii]);
                prop_assert_eq!(before.total_ice[ii], after.total_ice[ii]);
            }
            approx::assert_relative_eq!(
                after.mineral[changed],
                composition.phase_a.mineral * a + composition.phase_b.mineral * b,
                max_relative = 1e-12
            );
        }
    }
}
