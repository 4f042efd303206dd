//! Shared utilities: random number generation and dense linear algebra.

pub mod matrix;
pub mod rng;

pub use matrix::{Matrix, Tensor};
pub use rng::SimpleRng;
