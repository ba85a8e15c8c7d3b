use std::ops::Range;

use ndarray::{s, Array1, Array2};
use ndarray_linalg::Scalar;

use crate::dataset::{self, Resolution, Table};
use crate::{Error, Result};

/// The fitted unknowns, in design matrix column order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Coefficient {
    /// Organic fraction of phase A
    PhaseAOrganic,
    /// Mineral fraction of phase A
    PhaseAMineral,
    /// Organic fraction of phase B
    PhaseBOrganic,
    /// Mineral fraction of phase B
    PhaseBMineral,
}

pub const NUM_COEFFICIENTS: usize = 4;

impl Coefficient {
    pub const ALL: [Self; NUM_COEFFICIENTS] = [
        Self::PhaseAOrganic,
        Self::PhaseAMineral,
        Self::PhaseBOrganic,
        Self::PhaseBMineral,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::PhaseAOrganic => "gamma_A,o",
            Self::PhaseAMineral => "gamma_A,m",
            Self::PhaseBOrganic => "gamma_B,o",
            Self::PhaseBMineral => "gamma_B,m",
        }
    }
}

/// The three balance equations contributed by every sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Equation {
    Organic,
    Mineral,
    Ice,
}

impl Equation {
    pub const ALL: [Self; 3] = [Self::Organic, Self::Mineral, Self::Ice];

    /// Rows of the stacked system holding this equation for `num_samples` samples
    pub const fn rows(self, num_samples: usize) -> Range<usize> {
        let start = self as usize * num_samples;
        start..start + num_samples
    }
}

/// Paired laboratory and CT fractions of the fit subset
#[derive(Clone, Debug)]
pub struct FitData<E> {
    pub phase_a: Array1<E>,
    pub phase_b: Array1<E>,
    pub excess_ice: Array1<E>,
    pub organic: Array1<E>,
    pub mineral: Array1<E>,
    pub total_ice: Array1<E>,
}

impl<E> FitData<E> {
    pub fn len(&self) -> usize {
        self.phase_a.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phase_a.is_empty()
    }

    fn check_lengths(&self) -> Result<()> {
        let expected = self.len();
        for (column, found) in [
            ("phase_b", self.phase_b.len()),
            ("excess_ice", self.excess_ice.len()),
            ("organic", self.organic.len()),
            ("mineral", self.mineral.len()),
            ("total_ice", self.total_ice.len()),
        ] {
            if found != expected {
                return Err(Error::LengthMismatch {
                    column: column.to_owned(),
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }
}

impl FitData<f64> {
    /// Collect the rows of a sample resolution `table` selected by `mask`.
    ///
    /// # Errors
    /// Returns an error if a required column is absent or not numeric, or if a selected row holds
    /// a missing value.
    pub fn from_table(table: &Table, mask: &[bool]) -> Result<Self> {
        let resolution = Resolution::Sample;
        let extract = |name: &str| -> Result<Array1<f64>> {
            let column = table.column(name)?;
            // Rows are reported as table data rows, matching `Table::column`
            if let Some((row, value)) = column
                .iter()
                .zip(mask)
                .enumerate()
                .find(|&(_, (value, &selected))| selected && !value.is_finite())
                .map(|(row, (value, _))| (row, *value))
            {
                return Err(Error::NonNumeric {
                    column: name.to_owned(),
                    row,
                    value: if value.is_nan() {
                        String::new()
                    } else {
                        value.to_string()
                    },
                });
            }
            Ok(dataset::select(&column, mask))
        };

        Ok(Self {
            phase_a: extract(&resolution.phase_a())?,
            phase_b: extract(&resolution.phase_b())?,
            excess_ice: extract(&resolution.excess_ice())?,
            organic: extract(dataset::ORGANIC_LAB)?,
            mineral: extract(dataset::MINERAL_LAB)?,
            total_ice: extract(dataset::TOTAL_ICE_LAB)?,
        })
    }
}

/// The stacked linear system relating lab fractions to CT phase fractions.
///
/// For `n` samples the system has `3n` rows in three contiguous blocks, one per [`Equation`],
/// each block following sample order. Columns follow [`Coefficient::ALL`].
///
/// $$
///     \theta_o = \gamma_{A,o} \theta_A + \gamma_{B,o} \theta_B
/// $$
/// $$
///     \theta_m = \gamma_{A,m} \theta_A + \gamma_{B,m} \theta_B
/// $$
/// $$
///     \theta_i - \theta_A - \theta_B - \theta_{ei} = - (\gamma_{A,o} + \gamma_{A,m}) \theta_A
///     - (\gamma_{B,o} + \gamma_{B,m}) \theta_B
/// $$
///
/// The ice balance has the closure $\gamma_i = 1 - \gamma_o - \gamma_m$ substituted so only four
/// unknowns remain.
#[derive(Clone, Debug)]
pub struct ConstraintSystem<E> {
    pub(crate) matrix: Array2<E>,
    pub(crate) rhs: Array1<E>,
    num_samples: usize,
}

impl<E: Scalar> ConstraintSystem<E> {
    /// Assemble the design matrix and target vector for `data`
    ///
    /// # Errors
    /// Returns an error if `data` is empty or its columns differ in length.
    pub fn build(data: &FitData<E>) -> Result<Self> {
        data.check_lengths()?;
        let n = data.len();
        if n == 0 {
            return Err(Error::InsufficientData {
                needed: 1,
                found: 0,
            });
        }

        let mut matrix: Array2<E> = Array2::zeros((3 * n, NUM_COEFFICIENTS));
        let mut rhs: Array1<E> = Array1::zeros(3 * n);

        let rows = Equation::Organic.rows(n);
        matrix
            .slice_mut(s![rows.clone(), Coefficient::PhaseAOrganic.index()])
            .assign(&data.phase_a);
        matrix
            .slice_mut(s![rows.clone(), Coefficient::PhaseBOrganic.index()])
            .assign(&data.phase_b);
        rhs.slice_mut(s![rows]).assign(&data.organic);

        let rows = Equation::Mineral.rows(n);
        matrix
            .slice_mut(s![rows.clone(), Coefficient::PhaseAMineral.index()])
            .assign(&data.phase_a);
        matrix
            .slice_mut(s![rows.clone(), Coefficient::PhaseBMineral.index()])
            .assign(&data.phase_b);
        rhs.slice_mut(s![rows]).assign(&data.mineral);

        let rows = Equation::Ice.rows(n);
        let negated_a = data.phase_a.mapv(|a| -a);
        let negated_b = data.phase_b.mapv(|b| -b);
        for coefficient in Coefficient::ALL {
            let column = match coefficient {
                Coefficient::PhaseAOrganic | Coefficient::PhaseAMineral => &negated_a,
                Coefficient::PhaseBOrganic | Coefficient::PhaseBMineral => &negated_b,
            };
            matrix
                .slice_mut(s![rows.clone(), coefficient.index()])
                .assign(column);
        }
        rhs.slice_mut(s![rows])
            .assign(&(&data.total_ice - &data.phase_a - &data.phase_b - &data.excess_ice));

        log::debug!(
            "assembled constraint system of shape {:?} from {n} samples",
            matrix.dim()
        );

        Ok(Self {
            matrix,
            rhs,
            num_samples: n,
        })
    }
}

impl<E> ConstraintSystem<E> {
    pub const fn matrix(&self) -> &Array2<E> {
        &self.matrix
    }

    pub const fn rhs(&self) -> &Array1<E> {
        &self.rhs
    }

    pub const fn num_samples(&self) -> usize {
        self.num_samples
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use ndarray::{arr1, arr2, s, Array, Array1};
    use ndarray_rand::rand::SeedableRng;
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;
    use proptest::prelude::*;
    use rand_isaac::Isaac64Rng;

    use std::path::Path;

    use super::{Coefficient, ConstraintSystem, Equation, FitData};
    use crate::dataset::Table;
    use crate::Error;

    const SAMPLE_RES: &str = "\
units,-,-,-,-,-,-
depth,organic_lab,mineral_lab,totalice_lab,phaseA_CT,phaseB_CT,excessice_CT
10,0.11,0.21,0.6,0.1,0.3,0.05
50,0.12,0.22,0.7,0.2,0.4,0.0
90,,0.25,0.5,0.3,0.3,0.1
";

    /// Lab fractions consistent with the balance equations for the composition `gamma`, given in
    /// [`Coefficient::ALL`] order
    pub(crate) fn exact_fit_data(
        gamma: [f64; 4],
        phase_a: Array1<f64>,
        phase_b: Array1<f64>,
        excess_ice: Array1<f64>,
    ) -> FitData<f64> {
        let [a_o, a_m, b_o, b_m] = gamma;
        let organic = &phase_a * a_o + &phase_b * b_o;
        let mineral = &phase_a * a_m + &phase_b * b_m;
        let total_ice = &phase_a * (1. - a_o - a_m) + &phase_b * (1. - b_o - b_m) + &excess_ice;
        FitData {
            phase_a,
            phase_b,
            excess_ice,
            organic,
            mineral,
            total_ice,
        }
    }

    #[test]
    fn blocks_and_signs_follow_the_balance_equations() {
        let data = FitData {
            phase_a: arr1(&[0.1, 0.2]),
            phase_b: arr1(&[0.3, 0.4]),
            excess_ice: arr1(&[0.05, 0.0]),
            organic: arr1(&[0.11, 0.12]),
            mineral: arr1(&[0.21, 0.22]),
            total_ice: arr1(&[0.6, 0.7]),
        };

        let system = ConstraintSystem::build(&data).unwrap();

        let expected_matrix = arr2(&[
            [0.1, 0., 0.3, 0.],
            [0.2, 0., 0.4, 0.],
            [0., 0.1, 0., 0.3],
            [0., 0.2, 0., 0.4],
            [-0.1, -0.1, -0.3, -0.3],
            [-0.2, -0.2, -0.4, -0.4],
        ]);
        assert_eq!(system.matrix(), &expected_matrix);

        let expected_rhs = arr1(&[0.11, 0.12, 0.21, 0.22, 0.6 - 0.1 - 0.3 - 0.05, 0.7 - 0.2 - 0.4]);
        for (calculated, expected) in system.rhs().iter().zip(expected_rhs.iter()) {
            approx::assert_relative_eq!(calculated, expected, max_relative = 1e-12);
        }
        assert_eq!(system.num_samples(), 2);
    }

    #[test]
    fn exact_composition_satisfies_every_row() {
        let seed = 40;
        let mut rng = Isaac64Rng::seed_from_u64(seed);
        let n = 25;
        let gamma = [0.3, 0.5, 0.1, 0.2];
        let data = exact_fit_data(
            gamma,
            Array::random_using(n, Uniform::new(0.1, 0.5), &mut rng),
            Array::random_using(n, Uniform::new(0.1, 0.4), &mut rng),
            Array::random_using(n, Uniform::new(0., 0.1), &mut rng),
        );

        let system = ConstraintSystem::build(&data).unwrap();
        let residual = system.matrix().dot(&arr1(&gamma)) - system.rhs();

        for equation in Equation::ALL {
            for value in residual.slice(s![equation.rows(n)]) {
                approx::assert_abs_diff_eq!(*value, 0., epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn empty_fit_data_is_rejected() {
        let empty = || Array1::<f64>::zeros(0);
        let data = FitData {
            phase_a: empty(),
            phase_b: empty(),
            excess_ice: empty(),
            organic: empty(),
            mineral: empty(),
            total_ice: empty(),
        };
        assert!(matches!(
            ConstraintSystem::build(&data),
            Err(Error::InsufficientData { needed: 1, found: 0 })
        ));
    }

    #[test]
    fn mismatched_columns_are_rejected() {
        let mut data = exact_fit_data(
            [0.3, 0.5, 0.1, 0.2],
            arr1(&[0.1, 0.2]),
            arr1(&[0.3, 0.4]),
            arr1(&[0., 0.]),
        );
        data.mineral = arr1(&[0.1]);
        assert!(matches!(
            ConstraintSystem::build(&data),
            Err(Error::LengthMismatch { expected: 2, found: 1, .. })
        ));
    }

    #[test]
    fn only_selected_rows_are_collected() {
        let table = Table::from_reader(SAMPLE_RES.as_bytes(), 1, Path::new("sample.csv")).unwrap();

        let data = FitData::from_table(&table, &[true, true, false]).unwrap();

        assert_eq!(data.len(), 2);
        assert_eq!(data.organic, arr1(&[0.11, 0.12]));
        assert_eq!(data.excess_ice, arr1(&[0.05, 0.0]));
        assert_eq!(data.total_ice, arr1(&[0.6, 0.7]));
    }

    #[test]
    fn missing_value_in_the_fit_subset_names_its_table_row() {
        let table = Table::from_reader(SAMPLE_RES.as_bytes(), 1, Path::new("sample.csv")).unwrap();

        let err = FitData::from_table(&table, &[false, false, true]).unwrap_err();

        match err {
            Error::NonNumeric { column, row, .. } => {
                assert_eq!(column, "organic_lab");
                assert_eq!(row, 2);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn missing_value_outside_the_fit_subset_is_ignored() {
        let table = Table::from_reader(SAMPLE_RES.as_bytes(), 1, Path::new("sample.csv")).unwrap();
        assert!(FitData::from_table(&table, &[true, false, false]).is_ok());
    }

    #[test]
    fn columns_are_labelled_in_fit_order() {
        let labels = Coefficient::ALL.map(Coefficient::label);
        assert_eq!(labels, ["gamma_A,o", "gamma_A,m", "gamma_B,o", "gamma_B,m"]);
        for (ii, coefficient) in Coefficient::ALL.into_iter().enumerate() {
            assert_eq!(coefficient.index(), ii);
        }
    }

    proptest! {
        #[test]
        fn system_has_three_rows_per_sample_and_four_columns(n in 1..200usize, seed in any::<u64>()) {
            let mut rng = Isaac64Rng::seed_from_u64(seed);
            let data = exact_fit_data(
                [0.3, 0.5, 0.1, 0.2],
                Array::random_using(n, Uniform::new(0., 1.), &mut rng),
                Array::random_using(n, Uniform::new(0., 1.), &mut rng),
                Array::random_using(n, Uniform::new(0., 1.), &mut rng),
            );

            let system = ConstraintSystem::build(&data).unwrap();

            prop_assert_eq!(system.matrix().dim(), (3 * n, 4));
            prop_assert_eq!(system.rhs().len(), 3 * n);
        }
    }
}
