//! Network layers
//!
//! One tagged union covers every layer kind the builder can produce, giving
//! the network a uniform forward/backward/KL surface without trait objects.
//! `Projection` wraps a plain Bayesian linear layer inserted by the builder
//! to bridge a width change in front of a dimension-preserving layer; it is
//! a real layer with real variational parameters, visible in the layer list
//! and counted in the KL total.

pub mod conv;
pub mod dropout;
pub mod linear;
pub mod stochastic;

pub use conv::BayesianConv;
pub use dropout::{DropoutKind, DropoutLayer};
pub use linear::BayesianLinear;
pub use stochastic::StochasticActivation;

use crate::config::Config;
use crate::utils::{Matrix, SimpleRng};

/// A network layer.
pub enum Layer {
    Linear(BayesianLinear),
    Conv(BayesianConv),
    Dropout(DropoutLayer),
    Stochastic(StochasticActivation),
    /// Builder-inserted width adapter (a Bayesian linear layer).
    Projection(BayesianLinear),
}

impl Layer {
    /// Human-readable layer kind, used in warnings and tests.
    pub fn kind(&self) -> &'static str {
        match self {
            Layer::Linear(_) => "linear",
            Layer::Conv(_) => "conv",
            Layer::Dropout(_) => "dropout",
            Layer::Stochastic(_) => "stochastic",
            Layer::Projection(_) => "projection",
        }
    }

    /// Forward pass. Conv layers consume batch rows through the square
    /// spatial reshape of [`BayesianConv::forward_matrix`].
    pub fn forward(&mut self, input: &Matrix, stochastic: bool, rng: &mut SimpleRng) -> Matrix {
        match self {
            Layer::Linear(layer) | Layer::Projection(layer) => {
                layer.forward(input, stochastic, rng)
            }
            Layer::Conv(layer) => layer.forward_matrix(input, stochastic, rng),
            Layer::Dropout(layer) => layer.forward(input, stochastic, rng),
            Layer::Stochastic(layer) => layer.forward(input, stochastic, rng),
        }
    }

    /// Backward pass. Dropout scales the gradient by the mask its last
    /// stochastic forward sampled.
    ///
    /// # Panics
    ///
    /// Panics for conv layers, which have no backward pass.
    pub fn backward(
        &mut self,
        grad_output: &Matrix,
        config: &Config,
        rng: &mut SimpleRng,
    ) -> Matrix {
        match self {
            Layer::Linear(layer) | Layer::Projection(layer) => {
                layer.backward(grad_output, config)
            }
            Layer::Conv(_) => panic!("conv layers have no backward pass"),
            Layer::Dropout(layer) => layer.backward(grad_output),
            Layer::Stochastic(layer) => layer.backward(grad_output, config, rng),
        }
    }

    /// KL contribution of this layer.
    pub fn kl(&self) -> f64 {
        match self {
            Layer::Linear(layer) | Layer::Projection(layer) => layer.kl(),
            Layer::Conv(layer) => layer.kl(),
            Layer::Dropout(layer) => layer.kl(),
            Layer::Stochastic(layer) => layer.kl(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropout_backward_matches_forward_mask() {
        let mut layer = Layer::Dropout(DropoutLayer::new(DropoutKind::Mc, 0.5));
        let mut rng = SimpleRng::new(42);
        let input = Matrix::from_vec(1, 64, vec![1.0; 64]);
        let out = layer.forward(&input, true, &mut rng);
        let grad = layer.backward(
            &Matrix::from_vec(1, 64, vec![1.0; 64]),
            &Config::default(),
            &mut rng,
        );
        // The gradient carries exactly the factors the activations got.
        assert_eq!(grad, out);
    }

    #[test]
    #[should_panic(expected = "no backward pass")]
    fn test_conv_backward_panics() {
        let mut rng = SimpleRng::new(42);
        let conv = BayesianConv::new(1, 1, 3, 3, 1.0, None, None, &mut rng);
        let mut layer = Layer::Conv(conv);
        let grad = Matrix::zeros(1, 4);
        let _ = layer.backward(&grad, &Config::default(), &mut rng);
    }

    #[test]
    fn test_kind_names() {
        let layer = Layer::Dropout(DropoutLayer::new(DropoutKind::Mc, 0.5));
        assert_eq!(layer.kind(), "dropout");
    }
}
