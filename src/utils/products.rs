//! Weighted product kernels used to form normal-equation blocks.
//!
//! Every block of the normal matrix is a sum over data points of
//! `Aᵢᵗ · W · Aⱼ`, where `W` is the diagonal matrix of data weights. The
//! kernels here compute one such term for one data set.

use ndarray::{Array1, Array2};

use crate::error::{NormalEqError, Result};

/// Compute `aᵗ · diag(weights) · b`.
///
/// When both operands have exactly one column the product is formed as an
/// elementwise weighted dot product and returned as a 1x1 matrix.
///
/// # Arguments
///
/// * `a` - Derivatives of the row parameter, one row per data point
/// * `b` - Derivatives of the column parameter, one row per data point
/// * `weights` - Weight of each data point
///
/// # Errors
///
/// * `NormalEqError::DimensionMismatch` if the operands disagree on the number of data points
pub fn weighted_cross_product(
    a: &Array2<f64>,
    b: &Array2<f64>,
    weights: &Array1<f64>,
) -> Result<Array2<f64>> {
    let n = a.nrows();
    if b.nrows() != n || weights.len() != n {
        return Err(NormalEqError::DimensionMismatch(format!(
            "cross product over {} data points with {} rows and {} weights",
            n,
            b.nrows(),
            weights.len()
        )));
    }

    if a.ncols() == 1 && b.ncols() == 1 {
        let sum: f64 = a
            .column(0)
            .iter()
            .zip(b.column(0).iter())
            .zip(weights.iter())
            .map(|((x, y), w)| w * x * y)
            .sum();
        return Ok(Array2::from_elem((1, 1), sum));
    }

    let mut weighted = b.to_owned();
    for (mut row, &w) in weighted.rows_mut().into_iter().zip(weights.iter()) {
        row *= w;
    }
    Ok(a.t().dot(&weighted))
}

/// Compute `aᵗ · diag(weights) · residual`.
///
/// # Errors
///
/// * `NormalEqError::DimensionMismatch` if the operands disagree on the number of data points
pub fn weighted_data_product(
    a: &Array2<f64>,
    residual: &Array1<f64>,
    weights: &Array1<f64>,
) -> Result<Array1<f64>> {
    let n = a.nrows();
    if residual.len() != n || weights.len() != n {
        return Err(NormalEqError::DimensionMismatch(format!(
            "data product over {} data points with {} residuals and {} weights",
            n,
            residual.len(),
            weights.len()
        )));
    }

    let weighted = residual * weights;
    Ok(a.t().dot(&weighted))
}
