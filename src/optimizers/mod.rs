//! Parameter update rules
//!
//! Both optimizers walk the network's internal layer list and dispatch on
//! layer kind: linear-like layers (including projections) update their weight
//! and bias means, stochastic activations update their slope mean, dropout
//! has nothing to update, and conv layers are skipped with a warning since
//! they have no backward pass feeding them gradients. Every consumed gradient
//! accumulator is zeroed by the update that applies it.

pub mod adam;

pub use adam::Adam;

use crate::config::Config;
use crate::layers::{BayesianLinear, Layer};
use crate::network::Network;

/// Learning rate for the given epoch: `lr0 / (1 + decay * epoch)` when decay
/// is enabled, otherwise the configured rate unchanged.
pub fn decayed_learning_rate(config: &Config, epoch: usize) -> f64 {
    if config.lr_decay <= 0.0 {
        return config.learning_rate;
    }
    config.learning_rate / (1.0 + config.lr_decay * epoch as f64)
}

fn sgd_update_linear(layer: &mut BayesianLinear, lr: f64) {
    let dw = layer.dw_mean().to_vec();
    for (w, g) in layer.w_mean_mut().iter_mut().zip(dw.iter()) {
        *w -= lr * g;
    }
    let db = layer.db_mean().to_vec();
    for (b, g) in layer.b_mean_mut().iter_mut().zip(db.iter()) {
        *b -= lr * g;
    }
    layer.zero_gradients();
}

/// Plain stochastic gradient descent.
pub struct Sgd;

impl Sgd {
    /// Apply one update to every trainable layer using the epoch-decayed
    /// learning rate.
    pub fn step(network: &mut Network, config: &Config, epoch: usize) {
        let lr = decayed_learning_rate(config, epoch);
        for layer in network.layers_mut() {
            match layer {
                Layer::Linear(l) | Layer::Projection(l) => sgd_update_linear(l, lr),
                Layer::Stochastic(act) => {
                    let delta = lr * act.d_alpha_mean();
                    act.apply_update(delta);
                }
                Layer::Dropout(_) => {}
                Layer::Conv(_) => {
                    eprintln!("Warning: skipping conv layer update (no gradient path)");
                }
            }
        }
    }
}
