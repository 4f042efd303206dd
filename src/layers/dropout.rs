//! Dropout layers for Monte-Carlo uncertainty
//!
//! Two masking schemes share one layer type: classic inverted MC dropout
//! (hard zero/keep mask) and the Concrete relaxation, which produces a smooth
//! mask through a temperature-controlled sigmoid. Neither variant carries
//! learnable parameters, so the KL contribution is zero; the uncertainty
//! signal comes from running multiple stochastic passes.

use crate::utils::{Matrix, SimpleRng};

/// Masking scheme for a [`DropoutLayer`].
pub enum DropoutKind {
    /// Hard mask: 0 with probability `p`, else `1/(1-p)`.
    Mc,
    /// Concrete relaxation with the given temperature.
    Concrete { temperature: f64 },
}

/// Dimension-preserving dropout layer.
pub struct DropoutLayer {
    kind: DropoutKind,
    prob: f64,
    cached_mask: Option<Vec<f64>>,
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl DropoutLayer {
    /// Create a dropout layer.
    ///
    /// # Panics
    ///
    /// Panics if `prob` is not strictly inside (0, 1). Config validation
    /// rejects such values earlier, so hitting this means a caller bypassed
    /// the config path.
    pub fn new(kind: DropoutKind, prob: f64) -> Self {
        assert!(
            prob > 0.0 && prob < 1.0,
            "dropout probability must be strictly between 0 and 1, got {}",
            prob
        );
        Self {
            kind,
            prob,
            cached_mask: None,
        }
    }

    /// Drop probability.
    pub fn prob(&self) -> f64 {
        self.prob
    }

    /// Apply the mask element-wise. The deterministic pass is the identity;
    /// masking only happens on stochastic passes. The sampled mask is cached
    /// so [`DropoutLayer::backward`] scales the gradient by the same factors.
    pub fn forward(&mut self, input: &Matrix, stochastic: bool, rng: &mut SimpleRng) -> Matrix {
        if !stochastic {
            self.cached_mask = None;
            return input.clone();
        }

        let keep_scale = 1.0 / (1.0 - self.prob);
        let mask: Vec<f64> = (0..input.as_slice().len())
            .map(|_| match self.kind {
                DropoutKind::Mc => {
                    if rng.bernoulli(self.prob) {
                        0.0
                    } else {
                        keep_scale
                    }
                }
                DropoutKind::Concrete { temperature } => {
                    let u = rng.next_f64();
                    let logit_p = (self.prob / (1.0 - self.prob)).ln();
                    let s = sigmoid((logit_p + u.ln() - (1.0 - u).ln()) / temperature);
                    (1.0 - s) * keep_scale
                }
            })
            .collect();

        let mut output = input.clone();
        for (value, &m) in output.as_mut_slice().iter_mut().zip(mask.iter()) {
            *value *= m;
        }
        self.cached_mask = Some(mask);
        output
    }

    /// Scale the incoming gradient by the mask sampled during the last
    /// stochastic forward: dropped units get zero gradient, kept units the
    /// same `1/(1-p)` scaling the activations got. After a deterministic
    /// forward there is no mask and the gradient passes through unchanged.
    ///
    /// # Panics
    ///
    /// Panics if the cached mask does not match the gradient's size.
    pub fn backward(&mut self, grad_output: &Matrix) -> Matrix {
        match self.cached_mask.take() {
            Some(mask) => {
                assert_eq!(
                    mask.len(),
                    grad_output.as_slice().len(),
                    "dropout backward shape mismatch"
                );
                let mut grad = grad_output.clone();
                for (g, &m) in grad.as_mut_slice().iter_mut().zip(mask.iter()) {
                    *g *= m;
                }
                grad
            }
            None => grad_output.clone(),
        }
    }

    /// No learnable parameters, no KL contribution.
    pub fn kl(&self) -> f64 {
        0.0
    }
}
