//! Block-sparse normal equations.
//!
//! This module holds the accumulator of the normal equations of a linear
//! least-squares problem over named vector parameters, its persistence, and
//! the helpers that fold partial normal equations from many workers into one.

// Include module declarations and re-exports
pub mod config;
pub mod generic;
pub mod reduce;
pub mod serialization;
pub mod traits;

// Re-export key types
pub use config::{ReduceConfig, ReduceStrategy};
pub use generic::{BlockRows, DenseSystem, GenericNormalEquations};
pub use reduce::{merge_all, reduce_serialized};
pub use serialization::{FORMAT_VERSION, GENERIC_KIND};
pub use traits::NormalEquations;
