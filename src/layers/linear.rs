//! Bayesian fully connected layer
//!
//! Every weight and bias is a distribution rather than a point value: the
//! layer stores a `(mean, logvar)` pair per scalar and draws an effective
//! value for each forward pass. The transformation is
//! `output = input · W_eff^T + b_eff` with W_eff of shape
//! (output_dim × input_dim).

use crate::config::Config;
use crate::utils::{Matrix, SimpleRng};
use crate::variational::{kl_divergence_single, sample_gaussian, Posterior, Prior};

/// Standard deviation used to initialize parameter means.
pub(crate) const INIT_MEAN_STDDEV: f64 = 0.1;
/// Initial log-variance; exp(-5) ~ 0.0067, a confident starting posterior.
pub(crate) const INIT_LOGVAR: f64 = -5.0;

/// Fully connected layer with Gaussian variational parameters.
///
/// Weight means and log-variances are flat row-major buffers of shape
/// (output_dim × input_dim); biases are per-output vectors. Gradient
/// accumulators mirror the mean parameters. Log-variance accumulators are
/// allocated but never fed by `backward`; only the means learn, which keeps
/// the posterior widths at their initialization.
pub struct BayesianLinear {
    input_dim: usize,
    output_dim: usize,
    w_mean: Vec<f64>,
    w_logvar: Vec<f64>,
    b_mean: Vec<f64>,
    b_logvar: Vec<f64>,
    dw_mean: Vec<f64>,
    dw_logvar: Vec<f64>,
    db_mean: Vec<f64>,
    db_logvar: Vec<f64>,
    prior_variance: f64,
    prior: Option<Box<dyn Prior>>,
    posterior: Option<Box<dyn Posterior>>,
    cached_input: Option<Matrix>,
}

impl BayesianLinear {
    /// Create a layer with means drawn from N(0, 0.01) and log-variances
    /// fixed at -5.
    pub fn new(
        input_dim: usize,
        output_dim: usize,
        prior_variance: f64,
        prior: Option<Box<dyn Prior>>,
        posterior: Option<Box<dyn Posterior>>,
        rng: &mut SimpleRng,
    ) -> Self {
        let weight_count = input_dim * output_dim;
        let mut w_mean = vec![0.0; weight_count];
        for value in &mut w_mean {
            *value = rng.gaussian(0.0, INIT_MEAN_STDDEV);
        }
        let mut b_mean = vec![0.0; output_dim];
        for value in &mut b_mean {
            *value = rng.gaussian(0.0, INIT_MEAN_STDDEV);
        }

        Self {
            input_dim,
            output_dim,
            w_mean,
            w_logvar: vec![INIT_LOGVAR; weight_count],
            b_mean,
            b_logvar: vec![INIT_LOGVAR; output_dim],
            dw_mean: vec![0.0; weight_count],
            dw_logvar: vec![0.0; weight_count],
            db_mean: vec![0.0; output_dim],
            db_logvar: vec![0.0; output_dim],
            prior_variance,
            prior,
            posterior,
            cached_input: None,
        }
    }

    /// Number of input features.
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Number of output features.
    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    /// Number of weight scalars (excluding biases).
    pub fn weight_count(&self) -> usize {
        self.w_mean.len()
    }

    /// Weight means, row-major (output_dim × input_dim).
    pub fn w_mean(&self) -> &[f64] {
        &self.w_mean
    }

    /// Mutable weight means (optimizer update path).
    pub fn w_mean_mut(&mut self) -> &mut [f64] {
        &mut self.w_mean
    }

    /// Weight log-variances.
    pub fn w_logvar(&self) -> &[f64] {
        &self.w_logvar
    }

    /// Bias means.
    pub fn b_mean(&self) -> &[f64] {
        &self.b_mean
    }

    /// Mutable bias means (optimizer update path).
    pub fn b_mean_mut(&mut self) -> &mut [f64] {
        &mut self.b_mean
    }

    /// Bias log-variances.
    pub fn b_logvar(&self) -> &[f64] {
        &self.b_logvar
    }

    /// Accumulated weight-mean gradients.
    pub fn dw_mean(&self) -> &[f64] {
        &self.dw_mean
    }

    /// Accumulated bias-mean gradients.
    pub fn db_mean(&self) -> &[f64] {
        &self.db_mean
    }

    /// Reset every gradient accumulator to zero.
    pub fn zero_gradients(&mut self) {
        for g in &mut self.dw_mean {
            *g = 0.0;
        }
        for g in &mut self.dw_logvar {
            *g = 0.0;
        }
        for g in &mut self.db_mean {
            *g = 0.0;
        }
        for g in &mut self.db_logvar {
            *g = 0.0;
        }
    }

    fn sample_parameter(&self, mu: f64, logvar: f64, rng: &mut SimpleRng) -> f64 {
        match &self.posterior {
            Some(posterior) => posterior.sample(mu, logvar, rng),
            None => sample_gaussian(mu, logvar, rng),
        }
    }

    /// Forward pass over a batch (rows are samples).
    ///
    /// When `stochastic` is true every weight and bias is freshly sampled
    /// from its posterior; otherwise the means are used, giving the
    /// deterministic mean prediction. The input is cached for the next
    /// `backward` call.
    ///
    /// # Panics
    ///
    /// Panics if `input.cols() != input_dim`.
    pub fn forward(&mut self, input: &Matrix, stochastic: bool, rng: &mut SimpleRng) -> Matrix {
        assert_eq!(
            input.cols(),
            self.input_dim,
            "linear layer input dimension mismatch: expected {}, got {}",
            self.input_dim,
            input.cols()
        );

        let w_eff: Vec<f64> = if stochastic {
            self.w_mean
                .iter()
                .zip(self.w_logvar.iter())
                .map(|(&mu, &lv)| self.sample_parameter(mu, lv, rng))
                .collect()
        } else {
            self.w_mean.clone()
        };
        let b_eff: Vec<f64> = if stochastic {
            self.b_mean
                .iter()
                .zip(self.b_logvar.iter())
                .map(|(&mu, &lv)| self.sample_parameter(mu, lv, rng))
                .collect()
        } else {
            self.b_mean.clone()
        };

        // output = input · W_eff^T, then the bias added to every row.
        let w_eff = Matrix::from_vec(self.output_dim, self.input_dim, w_eff);
        let mut output = input.multiply(&w_eff.transpose());
        for i in 0..input.rows() {
            for j in 0..self.output_dim {
                output.set(i, j, output.get(i, j) + b_eff[j]);
            }
        }

        self.cached_input = Some(input.clone());
        output
    }

    /// Backward pass: accumulates mean gradients and returns the gradient
    /// with respect to the input.
    ///
    /// Data gradients (`grad_output^T · cached_input` for weights, column
    /// sums for biases) and the KL penalty gradient (`kl_weight · mean`) are
    /// fused into the same accumulators. The input gradient is computed with
    /// the mean weights rather than the sampled ones. Consumes the cached
    /// input.
    ///
    /// # Panics
    ///
    /// Panics if no forward pass preceded this call, or if `grad_output`
    /// does not have `output_dim` columns.
    pub fn backward(&mut self, grad_output: &Matrix, config: &Config) -> Matrix {
        let input = self
            .cached_input
            .take()
            .expect("linear backward called before forward");
        assert_eq!(
            grad_output.cols(),
            self.output_dim,
            "linear layer gradient dimension mismatch: expected {}, got {}",
            self.output_dim,
            grad_output.cols()
        );
        assert_eq!(
            grad_output.rows(),
            input.rows(),
            "linear layer gradient batch mismatch: expected {}, got {}",
            input.rows(),
            grad_output.rows()
        );

        let batch = input.rows();
        for j in 0..self.output_dim {
            for i in 0..batch {
                let g = grad_output.get(i, j);
                self.db_mean[j] += g;
                for k in 0..self.input_dim {
                    self.dw_mean[j * self.input_dim + k] += g * input.get(i, k);
                }
            }
        }

        // KL penalty gradient, fused with the data gradient.
        let kl_weight = config.kl_weight;
        for (g, &mu) in self.dw_mean.iter_mut().zip(self.w_mean.iter()) {
            *g += kl_weight * mu;
        }
        for (g, &mu) in self.db_mean.iter_mut().zip(self.b_mean.iter()) {
            *g += kl_weight * mu;
        }

        // grad_input = grad_output · W_mean (mean weights by contract).
        let w_mean = Matrix::from_vec(self.output_dim, self.input_dim, self.w_mean.clone());
        grad_output.multiply(&w_mean)
    }

    /// Total KL divergence over every weight and bias.
    ///
    /// Precedence: attached `Prior`, then attached `Posterior`, then the
    /// closed-form Gaussian KL against `prior_variance`.
    pub fn kl(&self) -> f64 {
        let pairs = self
            .w_mean
            .iter()
            .zip(self.w_logvar.iter())
            .chain(self.b_mean.iter().zip(self.b_logvar.iter()));

        if let Some(prior) = &self.prior {
            pairs.map(|(&mu, &lv)| prior.compute_kl(mu, lv)).sum()
        } else if let Some(posterior) = &self.posterior {
            pairs.map(|(&mu, &lv)| posterior.compute_kl(mu, lv)).sum()
        } else {
            pairs
                .map(|(&mu, &lv)| kl_divergence_single(mu, lv, self.prior_variance))
                .sum()
        }
    }
}
