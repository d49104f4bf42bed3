//! Dish feature construction: flavor-count matrix and its low-rank factorization.

pub mod dense;
pub mod matrix;
pub mod svd;

pub use dense::DenseMatrix;
pub use matrix::{FlavorMatrix, MatrixStats};
pub use svd::LatentFactorization;
