//! Network composition
//!
//! Builds a layer stack from the architecture strings in [`Config`], threads
//! batches through it in both directions and aggregates the KL contributions
//! for the variational objective. The network owns the RNG: every stochastic
//! draw anywhere in the stack flows through it, so a seeded network is fully
//! reproducible.

use std::error::Error;

use crate::config::Config;
use crate::layers::stochastic::{INIT_ALPHA_LOGVAR, INIT_ALPHA_MEAN};
use crate::layers::{
    BayesianConv, BayesianLinear, DropoutKind, DropoutLayer, Layer, StochasticActivation,
};
use crate::utils::{Matrix, SimpleRng};
use crate::variational::{
    FlipoutPosterior, LaplacePrior, MixturePrior, Posterior, Prior, StructuredPosterior,
};

/// Fixed kernel extent for conv layers built from config strings.
const CONV_KERNEL: usize = 3;

fn config_error(msg: impl Into<String>) -> Box<dyn Error> {
    Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        msg.into(),
    ))
}

fn make_prior(config: &Config) -> Option<Box<dyn Prior>> {
    match config.prior_type {
        1 => Some(Box::new(LaplacePrior::new(0.0, config.prior_variance))),
        2 => Some(Box::new(MixturePrior::new(0.0, 1.0, 0.0, 1.0, 0.5))),
        _ => None,
    }
}

fn make_posterior(config: &Config) -> Option<Box<dyn Posterior>> {
    match config.posterior_method {
        1 => Some(Box::new(StructuredPosterior::new(1.0))),
        2 => Some(Box::new(FlipoutPosterior)),
        _ => None,
    }
}

/// A Bayesian neural network: an ordered layer stack plus the RNG that feeds
/// every stochastic draw in it.
///
/// The internal layer list can be longer than the logical architecture: in
/// front of a dimension-preserving layer whose configured width differs from
/// the running width, the builder inserts a `Projection` layer. Projections
/// are ordinary Bayesian linear layers; they train and they contribute KL.
pub struct Network {
    layers: Vec<Layer>,
    logical_num_layers: usize,
    rng: SimpleRng,
}

impl Network {
    /// Build a network from a configuration, seeding the RNG from
    /// `config.seed`.
    pub fn new(config: &Config) -> Result<Self, Box<dyn Error>> {
        Self::with_seed(config, config.seed)
    }

    /// Build a network with an explicit RNG seed (overrides `config.seed`).
    ///
    /// The architecture comes from the comma-separated `neurons_per_layer`
    /// and `layer_types` lists; when their lengths differ the extra entries
    /// of the longer list are ignored. Unknown layer type tokens degrade to
    /// a plain linear layer with a stderr warning.
    pub fn with_seed(config: &Config, seed: u64) -> Result<Self, Box<dyn Error>> {
        let mut rng = SimpleRng::new(seed);

        let sizes: Vec<usize> = config
            .neurons_per_layer
            .split(',')
            .map(|token| {
                let token = token.trim();
                token
                    .parse::<usize>()
                    .map_err(|_| config_error(format!("Invalid neuron count '{}'", token)))
            })
            .collect::<Result<_, _>>()?;
        let types: Vec<&str> = config.layer_types.split(',').map(str::trim).collect();

        let logical_num_layers = sizes.len().min(types.len());
        if logical_num_layers == 0 {
            return Err(config_error(
                "neurons_per_layer and layer_types describe no layers",
            ));
        }

        let mut layers: Vec<Layer> = Vec::with_capacity(logical_num_layers);
        let mut current_dim = config.input_dim;
        // Channel count of the running representation; 1 after any
        // flattening layer, the previous out_channels right after a conv.
        let mut current_channels = 1usize;

        for i in 0..logical_num_layers {
            let target = sizes[i];
            match types[i] {
                "linear" => {
                    layers.push(Layer::Linear(BayesianLinear::new(
                        current_dim,
                        target,
                        config.prior_variance,
                        make_prior(config),
                        make_posterior(config),
                        &mut rng,
                    )));
                    current_dim = target;
                    current_channels = 1;
                }
                "conv" => {
                    if current_dim % current_channels != 0 {
                        return Err(config_error(format!(
                            "conv layer {}: width {} not divisible by {} channels",
                            i, current_dim, current_channels
                        )));
                    }
                    let spatial = current_dim / current_channels;
                    let side = (spatial as f64).sqrt().round() as usize;
                    if side * side != spatial {
                        return Err(config_error(format!(
                            "conv layer {}: width {} is not a square spatial layout for {} channels",
                            i, current_dim, current_channels
                        )));
                    }
                    if side < CONV_KERNEL {
                        return Err(config_error(format!(
                            "conv layer {}: spatial side {} smaller than the {}x{} kernel",
                            i, side, CONV_KERNEL, CONV_KERNEL
                        )));
                    }
                    layers.push(Layer::Conv(BayesianConv::new(
                        current_channels,
                        target,
                        CONV_KERNEL,
                        CONV_KERNEL,
                        config.prior_variance,
                        make_prior(config),
                        make_posterior(config),
                        &mut rng,
                    )));
                    let out_side = side - CONV_KERNEL + 1;
                    current_dim = target * out_side * out_side;
                    current_channels = target;
                }
                "dropout" => {
                    if target != current_dim {
                        layers.push(Layer::Projection(BayesianLinear::new(
                            current_dim,
                            target,
                            config.prior_variance,
                            make_prior(config),
                            make_posterior(config),
                            &mut rng,
                        )));
                        current_dim = target;
                        current_channels = 1;
                    }
                    layers.push(Layer::Dropout(DropoutLayer::new(
                        DropoutKind::Mc,
                        config.dropout_prob,
                    )));
                }
                "stochastic" => {
                    if target != current_dim {
                        layers.push(Layer::Projection(BayesianLinear::new(
                            current_dim,
                            target,
                            config.prior_variance,
                            make_prior(config),
                            make_posterior(config),
                            &mut rng,
                        )));
                        current_dim = target;
                        current_channels = 1;
                    }
                    layers.push(Layer::Stochastic(StochasticActivation::new(
                        INIT_ALPHA_MEAN,
                        INIT_ALPHA_LOGVAR,
                        config.prior_variance,
                        make_prior(config),
                        make_posterior(config),
                    )));
                }
                unknown => {
                    eprintln!(
                        "Warning: unknown layer type '{}', falling back to linear",
                        unknown
                    );
                    layers.push(Layer::Linear(BayesianLinear::new(
                        current_dim,
                        target,
                        config.prior_variance,
                        None,
                        None,
                        &mut rng,
                    )));
                    current_dim = target;
                    current_channels = 1;
                }
            }
        }

        Ok(Self {
            layers,
            logical_num_layers,
            rng,
        })
    }

    /// Internal layer list, projections included.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Mutable layer list (optimizer update path).
    pub fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    /// Number of layers named by the architecture strings, excluding
    /// builder-inserted projections.
    pub fn logical_num_layers(&self) -> usize {
        self.logical_num_layers
    }

    /// Total number of internal layers.
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Width of the network output.
    pub fn output_dim(&self) -> Option<usize> {
        self.layers.iter().rev().find_map(|layer| match layer {
            Layer::Linear(l) | Layer::Projection(l) => Some(l.output_dim()),
            _ => None,
        })
    }

    /// Forward pass over a batch. Stochastic passes sample every variational
    /// parameter and apply dropout masks; deterministic passes use parameter
    /// means and identity dropout.
    pub fn forward(&mut self, input: &Matrix, stochastic: bool) -> Matrix {
        let Network { layers, rng, .. } = self;
        let mut current = input.clone();
        for layer in layers.iter_mut() {
            current = layer.forward(&current, stochastic, rng);
        }
        current
    }

    /// Backward pass: walks the layers in reverse, accumulating parameter
    /// gradients, and returns the gradient with respect to the network input.
    ///
    /// # Panics
    ///
    /// Panics if the stack contains a conv layer (no backward pass) or if a
    /// layer's cached forward input is missing.
    pub fn backward(&mut self, grad_output: &Matrix, config: &Config) -> Matrix {
        let Network { layers, rng, .. } = self;
        let mut current = grad_output.clone();
        for layer in layers.iter_mut().rev() {
            current = layer.backward(&current, config, rng);
        }
        current
    }

    /// Sum of the KL contributions of every internal layer.
    pub fn total_kl(&self) -> f64 {
        self.layers.iter().map(Layer::kl).sum()
    }

    /// Monte-Carlo predictive estimate: runs `num_samples` stochastic
    /// forward passes and returns the per-element mean and population
    /// variance of the predictions.
    ///
    /// # Panics
    ///
    /// Panics if `num_samples` is zero.
    pub fn predict_monte_carlo(&mut self, input: &Matrix, num_samples: usize) -> (Matrix, Matrix) {
        assert!(num_samples > 0, "Monte-Carlo estimate needs at least one sample");

        let samples: Vec<Matrix> = (0..num_samples)
            .map(|_| self.forward(input, true))
            .collect();

        let rows = samples[0].rows();
        let cols = samples[0].cols();
        let mut mean = Matrix::zeros(rows, cols);
        let mut variance = Matrix::zeros(rows, cols);

        let n = num_samples as f64;
        for i in 0..rows {
            for j in 0..cols {
                let mut sum = 0.0;
                for sample in &samples {
                    sum += sample.get(i, j);
                }
                let m = sum / n;
                mean.set(i, j, m);

                let mut sq_sum = 0.0;
                for sample in &samples {
                    let diff = sample.get(i, j) - m;
                    sq_sum += diff * diff;
                }
                variance.set(i, j, sq_sum / n);
            }
        }
        (mean, variance)
    }
}
