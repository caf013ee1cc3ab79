//! The interface a solver sees.
//!
//! [`NormalEquations`] is sealed: [`GenericNormalEquations`] is the only
//! implementation outside of this crate's tests. Combining two
//! implementations goes through [`NormalEquations::as_generic`], and a
//! `None` there surfaces as
//! [`NormalEqError::Incompatible`](crate::error::NormalEqError::Incompatible).

use ndarray::{Array1, Array2};

use super::generic::GenericNormalEquations;
use crate::error::Result;

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// Block-sparse normal equations of a linear least-squares problem.
pub trait NormalEquations: sealed::Sealed + std::fmt::Debug + Send + Sync {
    /// Block of the normal matrix coupling `row` and `col`.
    ///
    /// # Errors
    ///
    /// * `NormalEqError::ParameterNotFound` if either parameter is unknown
    fn normal_matrix(&self, row: &str, col: &str) -> Result<&Array2<f64>>;

    /// Data vector of `name`.
    ///
    /// # Errors
    ///
    /// * `NormalEqError::ParameterNotFound` if the parameter is unknown
    fn data_vector(&self, name: &str) -> Result<&Array1<f64>>;

    /// Names of all parameters known to the normal equations.
    ///
    /// The order is unspecified.
    fn unknowns(&self) -> Vec<String>;

    /// Forget everything accumulated so far.
    fn reset(&mut self);

    /// Add the normal equations accumulated in `other` to these.
    ///
    /// # Errors
    ///
    /// * `NormalEqError::Incompatible` if `other` is a different kind of normal equations
    /// * `NormalEqError::DimensionMismatch` if a shared parameter changed shape
    fn merge(&mut self, other: &dyn NormalEquations) -> Result<()>;

    /// View of `self` as generic normal equations, if that is what it is.
    fn as_generic(&self) -> Option<&GenericNormalEquations> {
        None
    }
}
