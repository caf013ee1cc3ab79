//! Utility functions and helpers for the normeq-rs library.

pub mod products;

// Re-export commonly used utilities
pub use products::{weighted_cross_product, weighted_data_product};
