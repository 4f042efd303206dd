//! Training harness
//!
//! Full-batch variational training loop: stochastic forward pass, MSE data
//! term plus KL-weighted complexity term, backward pass, optimizer step with
//! the epoch-decayed learning rate. Per-epoch statistics are returned so
//! callers can log or plot convergence.

use crate::config::Config;
use crate::network::Network;
use crate::optimizers::{decayed_learning_rate, Adam, Sgd};
use crate::utils::Matrix;

/// Loss components recorded for one epoch.
#[derive(Debug, Clone)]
pub struct EpochStats {
    pub epoch: usize,
    pub mse: f64,
    pub kl: f64,
    pub total_loss: f64,
    pub learning_rate: f64,
}

/// Mean squared error between predictions and targets.
///
/// # Panics
///
/// Panics if the shapes differ.
pub fn mse_loss(pred: &Matrix, target: &Matrix) -> f64 {
    assert!(
        pred.rows() == target.rows() && pred.cols() == target.cols(),
        "loss shape mismatch: {}x{} vs {}x{}",
        pred.rows(),
        pred.cols(),
        target.rows(),
        target.cols()
    );
    let total = (pred.rows() * pred.cols()) as f64;
    pred.as_slice()
        .iter()
        .zip(target.as_slice().iter())
        .map(|(&p, &t)| (p - t) * (p - t))
        .sum::<f64>()
        / total
}

/// Gradient of [`mse_loss`] with respect to the predictions:
/// `(2 / total) * (pred - target)`.
pub fn mse_loss_gradient(pred: &Matrix, target: &Matrix) -> Matrix {
    assert!(
        pred.rows() == target.rows() && pred.cols() == target.cols(),
        "loss shape mismatch: {}x{} vs {}x{}",
        pred.rows(),
        pred.cols(),
        target.rows(),
        target.cols()
    );
    let total = (pred.rows() * pred.cols()) as f64;
    let mut grad = pred.clone();
    for (g, &t) in grad.as_mut_slice().iter_mut().zip(target.as_slice().iter()) {
        *g = (2.0 / total) * (*g - t);
    }
    grad
}

/// Train the network on one full-batch dataset for `config.num_epochs`
/// epochs. The optimizer is selected by `config.optimizer` (0 = SGD,
/// 1 = Adam).
///
/// # Panics
///
/// Panics if inputs and targets disagree on the batch size.
pub fn train(
    network: &mut Network,
    config: &Config,
    inputs: &Matrix,
    targets: &Matrix,
) -> Vec<EpochStats> {
    assert_eq!(
        inputs.rows(),
        targets.rows(),
        "training batch mismatch: {} inputs vs {} targets",
        inputs.rows(),
        targets.rows()
    );

    let mut adam = Adam::new();
    let mut history = Vec::with_capacity(config.num_epochs);

    for epoch in 0..config.num_epochs {
        let pred = network.forward(inputs, true);
        let mse = mse_loss(&pred, targets);
        let kl = network.total_kl();
        let total_loss = mse + config.kl_weight * kl;

        let grad_loss = mse_loss_gradient(&pred, targets);
        let _ = network.backward(&grad_loss, config);

        if config.optimizer == 1 {
            adam.step(network, config, epoch);
        } else {
            Sgd::step(network, config, epoch);
        }

        history.push(EpochStats {
            epoch,
            mse,
            kl,
            total_loss,
            learning_rate: decayed_learning_rate(config, epoch),
        });
    }
    history
}
