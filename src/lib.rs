//! # normeq-rs
//!
//! `normeq-rs` accumulates the normal equations of large, sparse,
//! block-structured linear least-squares problems, such as those met in
//! interferometric calibration and imaging.
//!
//! The library provides:
//! - A design matrix container and a builder turning it into per-parameter
//!   normal-equation contributions
//! - Block-sparse normal equations that grow as new parameters appear and
//!   stay square, with zero blocks between independent parameters
//! - Merging and reduction of partial normal equations built by independent workers
//! - Versioned serialization for shipping normal equations between processes
//!
//! ## Basic Usage
//!
//! ```
//! use ndarray::{Array1, Array2};
//! use normeq_rs::{DesignMatrix, GenericNormalEquations};
//!
//! let mut dm = DesignMatrix::new();
//! dm.add_derivative("Value0", Array2::from_elem((10, 1), 1.0)).unwrap();
//! dm.add_derivative("Value1", Array2::from_elem((10, 1), 2.0)).unwrap();
//! dm.add_residual(Array1::from_elem(10, -1.0), Array1::ones(10)).unwrap();
//!
//! let ne = GenericNormalEquations::from_design_matrix(&dm).unwrap();
//! assert_eq!(ne.normal_matrix("Value0", "Value1").unwrap()[[0, 0]], 20.0);
//! assert_eq!(ne.data_vector("Value1").unwrap()[0], -20.0);
//! ```

// Public modules
pub mod error;

pub mod design;

pub mod normal_equations;

pub mod utils;

// Re-exports for convenience
pub use design::{Contribution, DesignMatrix};
pub use error::{ErrorKind, NormalEqError, Result};
pub use normal_equations::{
    merge_all, reduce_serialized, GenericNormalEquations, NormalEquations, ReduceConfig,
    ReduceStrategy,
};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
