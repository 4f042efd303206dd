//! Stochastic PReLU activation
//!
//! A parametric ReLU whose negative-side slope `alpha` is itself a Gaussian
//! variational parameter. One alpha is sampled per forward pass and shared
//! across the whole batch, so the activation is a random function rather than
//! element-wise noise.

use crate::config::Config;
use crate::utils::{Matrix, SimpleRng};
use crate::variational::{kl_divergence_single, sample_gaussian, Posterior, Prior};

/// Default negative-side slope mean for newly built activations.
pub(crate) const INIT_ALPHA_MEAN: f64 = 0.25;
pub(crate) const INIT_ALPHA_LOGVAR: f64 = -5.0;

/// Activation layer with a single learnable stochastic slope.
pub struct StochasticActivation {
    alpha_mean: f64,
    alpha_logvar: f64,
    d_alpha_mean: f64,
    alpha_sample: f64,
    prior_variance: f64,
    prior: Option<Box<dyn Prior>>,
    posterior: Option<Box<dyn Posterior>>,
    cached_input: Option<Matrix>,
}

fn clip_gradient(grad: f64, clip_value: f64) -> f64 {
    grad.clamp(-clip_value, clip_value)
}

impl StochasticActivation {
    /// Create an activation with the given initial slope distribution.
    pub fn new(
        alpha_mean: f64,
        alpha_logvar: f64,
        prior_variance: f64,
        prior: Option<Box<dyn Prior>>,
        posterior: Option<Box<dyn Posterior>>,
    ) -> Self {
        Self {
            alpha_mean,
            alpha_logvar,
            d_alpha_mean: 0.0,
            alpha_sample: 0.0,
            prior_variance,
            prior,
            posterior,
            cached_input: None,
        }
    }

    /// Current slope mean.
    pub fn alpha_mean(&self) -> f64 {
        self.alpha_mean
    }

    /// Slope log-variance.
    pub fn alpha_logvar(&self) -> f64 {
        self.alpha_logvar
    }

    /// Gradient stored by the last backward pass.
    pub fn d_alpha_mean(&self) -> f64 {
        self.d_alpha_mean
    }

    /// Apply one optimizer update to the slope mean and clear the gradient.
    pub fn apply_update(&mut self, delta: f64) {
        self.alpha_mean -= delta;
        self.d_alpha_mean = 0.0;
    }

    /// Clear the stored gradient without updating.
    pub fn zero_gradients(&mut self) {
        self.d_alpha_mean = 0.0;
    }

    /// Forward pass: `out = x` for `x >= 0`, else `alpha * x`, with one alpha
    /// shared across the whole tensor. Stochastic passes sample alpha from
    /// the posterior; deterministic passes use the mean. Caches the input and
    /// the sampled alpha for `backward`.
    pub fn forward(&mut self, input: &Matrix, stochastic: bool, rng: &mut SimpleRng) -> Matrix {
        let alpha = if stochastic {
            match &self.posterior {
                Some(posterior) => posterior.sample(self.alpha_mean, self.alpha_logvar, rng),
                None => sample_gaussian(self.alpha_mean, self.alpha_logvar, rng),
            }
        } else {
            self.alpha_mean
        };
        self.alpha_sample = alpha;
        self.cached_input = Some(input.clone());

        let mut output = input.clone();
        for value in output.as_mut_slice() {
            if *value < 0.0 {
                *value *= alpha;
            }
        }
        output
    }

    /// Backward pass. Per element: optional Gaussian noise is injected into
    /// the incoming gradient (`config.noise_injection` as stddev); the input
    /// gradient is `grad_out` on the positive side and
    /// `grad_out * alpha_sample` on the negative side; the slope gradient
    /// accumulates `grad_out * x` over negative inputs. The accumulated
    /// slope gradient is clipped to `±config.grad_clip`, then the KL penalty
    /// `kl_weight * alpha_mean` is added (annealed when `kl_annealing` is
    /// set). The result overwrites the stored gradient. Consumes the cached
    /// input.
    ///
    /// # Panics
    ///
    /// Panics if no forward pass preceded this call or the gradient shape
    /// differs from the cached input.
    pub fn backward(
        &mut self,
        grad_output: &Matrix,
        config: &Config,
        rng: &mut SimpleRng,
    ) -> Matrix {
        let input = self
            .cached_input
            .take()
            .expect("stochastic activation backward called before forward");
        assert!(
            grad_output.rows() == input.rows() && grad_output.cols() == input.cols(),
            "stochastic activation gradient shape mismatch: {}x{} vs {}x{}",
            grad_output.rows(),
            grad_output.cols(),
            input.rows(),
            input.cols()
        );

        let mut grad_input = Matrix::zeros(input.rows(), input.cols());
        let mut grad_alpha = 0.0;
        for i in 0..input.rows() {
            for j in 0..input.cols() {
                let x = input.get(i, j);
                let mut grad_out = grad_output.get(i, j);
                if config.noise_injection > 0.0 {
                    grad_out += rng.gaussian(0.0, config.noise_injection);
                }
                if x >= 0.0 {
                    grad_input.set(i, j, grad_out);
                } else {
                    grad_input.set(i, j, grad_out * self.alpha_sample);
                    grad_alpha += grad_out * x;
                }
            }
        }

        if config.grad_clip > 0.0 {
            grad_alpha = clip_gradient(grad_alpha, config.grad_clip);
        }

        let mut kl_contrib = config.kl_weight * self.alpha_mean;
        if config.kl_annealing {
            kl_contrib *= 1.0 - (-config.kl_weight * config.num_epochs as f64).exp();
        }
        self.d_alpha_mean = grad_alpha + kl_contrib;

        grad_input
    }

    /// KL divergence of the slope parameter. Prior takes precedence, then
    /// the attached posterior, then the Gaussian fallback.
    pub fn kl(&self) -> f64 {
        if let Some(prior) = &self.prior {
            prior.compute_kl(self.alpha_mean, self.alpha_logvar)
        } else if let Some(posterior) = &self.posterior {
            posterior.compute_kl(self.alpha_mean, self.alpha_logvar)
        } else {
            kl_divergence_single(self.alpha_mean, self.alpha_logvar, self.prior_variance)
        }
    }
}
