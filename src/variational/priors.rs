//! Prior distributions over stochastic layer parameters.
//!
//! A layer optionally owns one `Prior`; when none is attached the layer falls
//! back to the closed-form Gaussian KL against its configured prior variance.
//! The Laplace and mixture variants use a deliberately cheap approximation:
//! `KL(q || p) ≈ E_q[ln q] - ln p(mu)`, i.e. the prior log-density is
//! evaluated at the posterior mean instead of integrated. The training loop
//! is tuned against this behavior; it also means these approximated
//! divergences are not guaranteed non-negative.

use crate::variational::kl_divergence_single;

const LN_2PI: f64 = 1.837_877_066_409_345_3;

/// Differential entropy term of a Gaussian: `E_q[ln q] = -0.5 * ln(2*pi*e*sigma^2)`.
fn gaussian_neg_entropy(logvar: f64) -> f64 {
    -0.5 * (LN_2PI + 1.0 + logvar)
}

/// Gaussian log-density `ln N(x | mu, sigma^2)`.
fn gaussian_log_density(x: f64, mu: f64, sigma: f64) -> f64 {
    let z = (x - mu) / sigma;
    -0.5 * (LN_2PI + 2.0 * sigma.ln() + z * z)
}

/// Prior over a single variational parameter.
///
/// `compute_kl` returns the (possibly approximated) KL divergence from the
/// variational posterior N(mu, exp(logvar)) to this prior; `log_prob` is the
/// prior's log-density at a point.
pub trait Prior {
    /// KL divergence (or approximation) for one `(mu, logvar)` parameter pair.
    fn compute_kl(&self, mu: f64, logvar: f64) -> f64;

    /// Log-density of `x` under the prior.
    fn log_prob(&self, x: f64) -> f64;
}

/// Zero-mean Gaussian prior with configurable variance.
///
/// This is the explicit form of the default every layer falls back to when no
/// prior is attached; `compute_kl` is the exact closed-form Gaussian KL and is
/// therefore non-negative for all inputs.
pub struct GaussianPrior {
    variance: f64,
}

impl GaussianPrior {
    /// Create a Gaussian prior N(0, variance).
    ///
    /// # Panics
    ///
    /// Panics if `variance <= 0`.
    pub fn new(variance: f64) -> Self {
        assert!(variance > 0.0, "prior variance must be positive");
        Self { variance }
    }

    /// The prior variance.
    pub fn variance(&self) -> f64 {
        self.variance
    }
}

impl Prior for GaussianPrior {
    fn compute_kl(&self, mu: f64, logvar: f64) -> f64 {
        kl_divergence_single(mu, logvar, self.variance)
    }

    fn log_prob(&self, x: f64) -> f64 {
        gaussian_log_density(x, 0.0, self.variance.sqrt())
    }
}

/// Laplace prior with location and scale.
pub struct LaplacePrior {
    location: f64,
    scale: f64,
}

impl LaplacePrior {
    /// Create a Laplace prior.
    ///
    /// # Panics
    ///
    /// Panics if `scale <= 0`.
    pub fn new(location: f64, scale: f64) -> Self {
        assert!(scale > 0.0, "Laplace scale must be positive");
        Self { location, scale }
    }
}

impl Prior for LaplacePrior {
    /// Approximate KL: `E_q[ln q] - ln p(mu)` with the prior evaluated at the
    /// posterior mean. Not the closed-form Laplace-Gaussian divergence.
    fn compute_kl(&self, mu: f64, logvar: f64) -> f64 {
        gaussian_neg_entropy(logvar) - self.log_prob(mu)
    }

    /// `ln p(x) = -ln(2*scale) - |x - location| / scale`
    fn log_prob(&self, x: f64) -> f64 {
        -(2.0 * self.scale).ln() - (x - self.location).abs() / self.scale
    }
}

/// Two-component Gaussian mixture prior (scale-mixture style).
///
/// `p(x) = lambda * N(x | mu1, sigma1^2) + (1 - lambda) * N(x | mu2, sigma2^2)`
pub struct MixturePrior {
    mu1: f64,
    sigma1: f64,
    mu2: f64,
    sigma2: f64,
    lambda: f64,
}

impl MixturePrior {
    /// Create a two-component mixture prior with mixing weight `lambda` for
    /// the first component.
    ///
    /// # Panics
    ///
    /// Panics if either sigma is non-positive or `lambda` is outside (0, 1).
    pub fn new(mu1: f64, sigma1: f64, mu2: f64, sigma2: f64, lambda: f64) -> Self {
        assert!(sigma1 > 0.0 && sigma2 > 0.0, "mixture sigmas must be positive");
        assert!(
            lambda > 0.0 && lambda < 1.0,
            "mixing weight must be strictly inside (0, 1)"
        );
        Self {
            mu1,
            sigma1,
            mu2,
            sigma2,
            lambda,
        }
    }
}

impl Prior for MixturePrior {
    /// Same evaluate-at-the-mean approximation as [`LaplacePrior::compute_kl`].
    fn compute_kl(&self, mu: f64, logvar: f64) -> f64 {
        gaussian_neg_entropy(logvar) - self.log_prob(mu)
    }

    /// Mixture log-density via log-sum-exp for numerical stability.
    fn log_prob(&self, x: f64) -> f64 {
        let log_p1 = self.lambda.ln() + gaussian_log_density(x, self.mu1, self.sigma1);
        let log_p2 = (1.0 - self.lambda).ln() + gaussian_log_density(x, self.mu2, self.sigma2);
        let max_log = log_p1.max(log_p2);
        max_log + ((log_p1 - max_log).exp() + (log_p2 - max_log).exp()).ln()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gaussian_prior_matches_closed_form() {
        let prior = GaussianPrior::new(2.0);
        assert_relative_eq!(
            prior.compute_kl(0.3, -1.0),
            kl_divergence_single(0.3, -1.0, 2.0)
        );
        // Log-density of a standard normal at zero.
        let unit = GaussianPrior::new(1.0);
        assert_relative_eq!(unit.log_prob(0.0), -0.5 * LN_2PI, epsilon = 1e-12);
    }

    #[test]
    fn test_laplace_log_prob() {
        let prior = LaplacePrior::new(0.0, 1.0);
        // ln p(0) = -ln 2
        assert_relative_eq!(prior.log_prob(0.0), -(2.0f64).ln(), epsilon = 1e-12);
        // Symmetric around the location.
        assert_relative_eq!(prior.log_prob(1.5), prior.log_prob(-1.5), epsilon = 1e-12);
    }

    #[test]
    fn test_laplace_kl_approximation() {
        let prior = LaplacePrior::new(0.0, 1.0);
        let (mu, logvar) = (0.4, -2.0);
        let expected = -0.5 * (LN_2PI + 1.0 + logvar) - prior.log_prob(mu);
        assert_relative_eq!(prior.compute_kl(mu, logvar), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_mixture_of_identical_components() {
        // With identical components the mixture collapses to one Gaussian.
        let prior = MixturePrior::new(0.0, 1.0, 0.0, 1.0, 0.5);
        let x = 0.3;
        assert_relative_eq!(
            prior.log_prob(x),
            -0.5 * (LN_2PI + x * x),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_mixture_log_sum_exp_stability() {
        // Widely separated components should still produce a finite density.
        let prior = MixturePrior::new(-50.0, 0.1, 50.0, 0.1, 0.5);
        assert!(prior.log_prob(0.0).is_finite());
        assert!(prior.compute_kl(0.0, -3.0).is_finite());
    }

    #[test]
    #[should_panic(expected = "Laplace scale must be positive")]
    fn test_laplace_invalid_scale() {
        let _ = LaplacePrior::new(0.0, 0.0);
    }
}
