//! Bayesian Neural Network Training Engine
//!
//! This library trains small Bayesian neural networks by variational
//! inference: every weight is a Gaussian `(mean, log-variance)` pair, forward
//! passes sample effective weights through the reparameterization trick, and
//! the training objective combines a data loss with a KL-weighted complexity
//! penalty. Repeated stochastic forward passes give Monte-Carlo predictive
//! uncertainty.
//!
//! # Modules
//!
//! - `config`: flat hyperparameter record, JSON loading and validation
//! - `network`: layer stack builder, forward/backward, KL aggregation,
//!   Monte-Carlo prediction
//! - `layers`: Bayesian linear/conv layers, dropout, stochastic activation
//! - `variational`: distribution primitives, priors and posteriors
//! - `optimizers`: SGD and Adam with learning-rate decay
//! - `training`: MSE loss and the full-batch training loop
//! - `utils`: xorshift RNG and dense matrix/tensor types

pub mod config;
pub mod layers;
pub mod network;
pub mod optimizers;
pub mod training;
pub mod utils;
pub mod variational;
