use ndarray::{Array, Array2};
use ndarray_linalg::Scalar;

use crate::Result;

/// Generate the Vandermonde matrix of `degree` for observations `x`
///
/// The Vandermonde matrix is a (n x degree + 1) matrix. Each row of the matrix is a geometric
/// progression for an individual observation `x` from power `0` to `degree` inclusive, so a
/// degree one matrix is the design of a straight line fit with intercept. For `x = [2, 3]` and
/// `degree = 2` the rows are `[1, 2, 4]` and `[1, 3, 9]`.
pub fn vandermonde<T: Copy + Scalar>(x: &[T], degree: usize) -> Result<Array2<T>> {
    let vals = x.iter().flat_map(|&xi| {
        let mut power = T::one();
        (0..=degree).map(move |_| {
            let current = power;
            power *= xi;
            current
        })
    });

    Ok(Array::from_iter(vals).into_shape((x.len(), degree + 1))?)
}
