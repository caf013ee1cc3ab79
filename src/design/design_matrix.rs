//! Design matrix container.
//!
//! A design matrix collects, for one batch of observations, the partial
//! derivatives of the model with respect to every parameter together with
//! the residuals and weights of the data points. Data arrive in data sets
//! (e.g. one per visibility chunk): each data set contributes one residual
//! vector, one weight vector and, for every parameter, one derivative
//! matrix with a row per data point and a column per parameter element.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2};

use crate::error::{NormalEqError, Result};

/// Partial derivatives, residuals and weights for one batch of observations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesignMatrix {
    /// Derivative matrices per parameter, one per data set
    derivatives: BTreeMap<String, Vec<Array2<f64>>>,

    /// Residual vector per data set
    residuals: Vec<Array1<f64>>,

    /// Weight vector per data set
    weights: Vec<Array1<f64>>,
}

impl DesignMatrix {
    /// Create an empty design matrix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the derivative matrix of `name` for the next data set.
    ///
    /// The matrix has one row per data point and one column per element of
    /// the parameter. All matrices of one parameter must have the same
    /// number of columns.
    ///
    /// # Errors
    ///
    /// * `NormalEqError::DimensionMismatch` if the column count differs from
    ///   earlier derivatives of the same parameter
    pub fn add_derivative(&mut self, name: &str, derivative: Array2<f64>) -> Result<()> {
        let chunks = self.derivatives.entry(name.to_string()).or_default();
        if let Some(first) = chunks.first() {
            if first.ncols() != derivative.ncols() {
                return Err(NormalEqError::DimensionMismatch(format!(
                    "derivative of {} has {} columns, earlier data sets had {}",
                    name,
                    derivative.ncols(),
                    first.ncols()
                )));
            }
        }
        chunks.push(derivative);
        Ok(())
    }

    /// Append the residuals and weights of the next data set.
    ///
    /// # Errors
    ///
    /// * `NormalEqError::DimensionMismatch` if `residual` and `weight` differ in length
    pub fn add_residual(&mut self, residual: Array1<f64>, weight: Array1<f64>) -> Result<()> {
        if residual.len() != weight.len() {
            return Err(NormalEqError::DimensionMismatch(format!(
                "{} residuals but {} weights",
                residual.len(),
                weight.len()
            )));
        }
        self.residuals.push(residual);
        self.weights.push(weight);
        Ok(())
    }

    /// Names of all parameters with derivatives, in sorted order.
    pub fn parameter_names(&self) -> Vec<String> {
        self.derivatives.keys().cloned().collect()
    }

    /// Whether derivatives were supplied for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.derivatives.contains_key(name)
    }

    /// Derivative matrices of `name`, one per data set.
    ///
    /// # Errors
    ///
    /// * `NormalEqError::ParameterNotFound` if no derivative was added for `name`
    pub fn derivatives(&self, name: &str) -> Result<&[Array2<f64>]> {
        self.derivatives
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| NormalEqError::ParameterNotFound(name.to_string()))
    }

    /// Residual vectors, one per data set.
    pub fn residuals(&self) -> &[Array1<f64>] {
        &self.residuals
    }

    /// Weight vectors, one per data set.
    pub fn weights(&self) -> &[Array1<f64>] {
        &self.weights
    }

    /// Number of data sets.
    pub fn n_data_sets(&self) -> usize {
        self.residuals.len()
    }

    /// Total number of data points over all data sets.
    pub fn n_data(&self) -> usize {
        self.residuals.iter().map(Array1::len).sum()
    }

    /// Check that derivatives, residuals and weights line up.
    ///
    /// Every parameter must have one derivative matrix per data set, and
    /// each of them must have one row per residual of that data set.
    pub fn validate(&self) -> Result<()> {
        let n_sets = self.residuals.len();
        for (name, chunks) in &self.derivatives {
            if chunks.len() != n_sets {
                return Err(NormalEqError::InvalidInput(format!(
                    "parameter {} has {} derivative data sets, expected {}",
                    name,
                    chunks.len(),
                    n_sets
                )));
            }
            for (set, (deriv, residual)) in chunks.iter().zip(&self.residuals).enumerate() {
                if deriv.nrows() != residual.len() {
                    return Err(NormalEqError::DimensionMismatch(format!(
                        "derivative of {} in data set {} has {} rows for {} residuals",
                        name,
                        set,
                        deriv.nrows(),
                        residual.len()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Remove all derivatives, residuals and weights.
    pub fn reset(&mut self) {
        self.derivatives.clear();
        self.residuals.clear();
        self.weights.clear();
    }
}
