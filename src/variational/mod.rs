//! Distribution primitives for variational inference.
//!
//! Every learnable scalar in a stochastic layer is a `(mean, logvar)` pair.
//! This module provides the reparameterized Gaussian draw used to sample such
//! a parameter and the closed-form KL divergence against a zero-mean Gaussian
//! prior, plus the vector aggregation layers fall back to when no explicit
//! `Prior` is attached.

pub mod posteriors;
pub mod priors;

pub use posteriors::{FlipoutPosterior, Posterior, StructuredPosterior};
pub use priors::{GaussianPrior, LaplacePrior, MixturePrior, Prior};

use crate::utils::SimpleRng;

/// Sample from N(mean, exp(logvar)) via the reparameterization trick:
/// `sample = mean + exp(0.5 * logvar) * epsilon`, epsilon ~ N(0, 1).
///
/// Isolating the randomness into `epsilon` makes the draw differentiable with
/// respect to both `mean` and `logvar`.
pub fn sample_gaussian(mean: f64, logvar: f64, rng: &mut SimpleRng) -> f64 {
    let stddev = (0.5 * logvar).exp();
    mean + stddev * rng.standard_gaussian()
}

/// Closed-form KL divergence between N(mu, exp(logvar)) and N(0, prior_variance):
///
/// `0.5 * ((exp(logvar) + mu^2) / prior_variance - 1 + ln(prior_variance) - logvar)`
///
/// `prior_variance` must be positive; `logvar` may be any real since the
/// posterior variance goes through `exp` and stays positive.
pub fn kl_divergence_single(mu: f64, logvar: f64, prior_variance: f64) -> f64 {
    let sigma2 = logvar.exp();
    0.5 * ((sigma2 + mu * mu) / prior_variance - 1.0 + prior_variance.ln() - logvar)
}

/// Sum of [`kl_divergence_single`] over parallel parameter slices.
///
/// # Panics
///
/// Panics if the slices have different lengths.
pub fn total_kl_divergence(mu: &[f64], logvar: &[f64], prior_variance: f64) -> f64 {
    assert_eq!(
        mu.len(),
        logvar.len(),
        "mean and logvar slices must have the same length"
    );
    mu.iter()
        .zip(logvar.iter())
        .map(|(&m, &lv)| kl_divergence_single(m, lv, prior_variance))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kl_zero_at_prior() {
        // KL is zero exactly when the posterior matches the prior.
        assert_eq!(kl_divergence_single(0.0, 0.0, 1.0), 0.0);
        let pv = 2.5f64;
        let kl = kl_divergence_single(0.0, pv.ln(), pv);
        assert!(kl.abs() < 1e-12, "kl at the prior was {}", kl);
    }

    #[test]
    fn test_kl_non_negative() {
        for &pv in &[0.1, 1.0, 2.0, 10.0] {
            for &mu in &[-3.0, -0.5, 0.0, 0.5, 3.0] {
                for &lv in &[-6.0, -1.0, 0.0, 1.0, 3.0] {
                    let kl = kl_divergence_single(mu, lv, pv);
                    assert!(
                        kl >= -1e-12,
                        "kl({}, {}, {}) = {} is negative",
                        mu,
                        lv,
                        pv,
                        kl
                    );
                }
            }
        }
    }

    #[test]
    fn test_sample_collapses_with_tiny_variance() {
        let mut rng = SimpleRng::new(42);
        // logvar -> -inf collapses the draw onto the mean.
        for _ in 0..100 {
            let s = sample_gaussian(1.5, -80.0, &mut rng);
            assert!((s - 1.5).abs() < 1e-9, "sample was {}", s);
        }
    }

    #[test]
    fn test_sample_varies_with_unit_variance() {
        let mut rng = SimpleRng::new(42);
        let a = sample_gaussian(0.0, 0.0, &mut rng);
        let b = sample_gaussian(0.0, 0.0, &mut rng);
        assert_ne!(a, b);
    }

    #[test]
    fn test_total_kl_matches_sum_of_singles() {
        let mu = [0.1, -0.4, 2.0];
        let logvar = [-5.0, 0.0, 1.0];
        let expected: f64 = mu
            .iter()
            .zip(logvar.iter())
            .map(|(&m, &lv)| kl_divergence_single(m, lv, 1.0))
            .sum();
        assert_eq!(total_kl_divergence(&mu, &logvar, 1.0), expected);
    }

    #[test]
    #[should_panic(expected = "same length")]
    fn test_total_kl_length_mismatch() {
        total_kl_divergence(&[0.0, 1.0], &[0.0], 1.0);
    }
}
