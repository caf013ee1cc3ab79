//! Contribution builder.
//!
//! Turns a [`DesignMatrix`] into per-parameter normal-equation contributions:
//! for each row parameter `p` the blocks `Σ Aₚᵗ W A_q` against every
//! parameter `q` of the batch (including `p` itself) and the data vector
//! `Σ Aₚᵗ W r`. The result is fed row by row into the normal equations.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::design_matrix::DesignMatrix;
use crate::error::Result;
use crate::utils::products::{weighted_cross_product, weighted_data_product};

/// Normal-equation contribution of one row parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    /// Name of the row parameter
    pub name: String,

    /// Blocks of this row, keyed by column parameter (diagonal included)
    pub blocks: BTreeMap<String, Array2<f64>>,

    /// Data vector of this row
    pub data_vector: Array1<f64>,
}

impl Contribution {
    /// Number of elements of the row parameter.
    pub fn dimension(&self) -> usize {
        self.data_vector.len()
    }
}

/// Build the contributions of every parameter in `dm`.
///
/// Contributions are returned in sorted parameter order. With the `parallel`
/// feature the rows are computed concurrently; the numeric result does not
/// depend on it since every row is summed over data sets in order.
///
/// # Errors
///
/// * Whatever [`DesignMatrix::validate`] reports for inconsistent input
pub fn build_contributions(dm: &DesignMatrix) -> Result<Vec<Contribution>> {
    dm.validate()?;
    let names = dm.parameter_names();

    #[cfg(feature = "parallel")]
    let rows = names
        .par_iter()
        .map(|name| build_row(dm, name, &names))
        .collect::<Result<Vec<_>>>();

    #[cfg(not(feature = "parallel"))]
    let rows = names
        .iter()
        .map(|name| build_row(dm, name, &names))
        .collect::<Result<Vec<_>>>();

    rows
}

/// Build the contribution of a single row parameter.
///
/// # Arguments
///
/// * `dm` - The validated design matrix
/// * `name` - The row parameter
/// * `columns` - All parameters participating in the batch
pub fn build_row(dm: &DesignMatrix, name: &str, columns: &[String]) -> Result<Contribution> {
    let row_derivs = dm.derivatives(name)?;
    let dim = row_derivs.first().map_or(0, Array2::ncols);

    let mut data_vector = Array1::zeros(dim);
    let mut blocks = BTreeMap::new();

    for col in columns {
        let col_derivs = dm.derivatives(col)?;
        let col_dim = col_derivs.first().map_or(0, Array2::ncols);
        let mut block = Array2::zeros((dim, col_dim));
        for (set, (a, b)) in row_derivs.iter().zip(col_derivs).enumerate() {
            block += &weighted_cross_product(a, b, &dm.weights()[set])?;
        }
        blocks.insert(col.clone(), block);
    }

    for ((a, residual), weight) in row_derivs.iter().zip(dm.residuals()).zip(dm.weights()) {
        data_vector += &weighted_data_product(a, residual, weight)?;
    }

    Ok(Contribution {
        name: name.to_string(),
        blocks,
        data_vector,
    })
}
