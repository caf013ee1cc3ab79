//! Design matrices and the normal-equation contributions built from them.

pub mod contribution;
pub mod design_matrix;

// Re-export key types
pub use contribution::{build_contributions, build_row, Contribution};
pub use design_matrix::DesignMatrix;
