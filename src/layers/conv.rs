//! Bayesian 2D convolution layer
//!
//! Valid convolution (stride 1, no padding) with a variational `(mean,
//! logvar)` pair per kernel weight and per-channel bias. The layer is
//! forward-only: it contributes stochastic features and a KL term but has no
//! backward pass, so it cannot sit on a trained gradient path.

use crate::utils::{Matrix, SimpleRng, Tensor};
use crate::variational::{kl_divergence_single, sample_gaussian, Posterior, Prior};

use super::linear::{INIT_LOGVAR, INIT_MEAN_STDDEV};

/// Convolutional layer with Gaussian variational kernels.
///
/// Kernel means and log-variances are stored flat in
/// (out_channels × in_channels × kernel_h × kernel_w) order.
pub struct BayesianConv {
    in_channels: usize,
    out_channels: usize,
    kernel_h: usize,
    kernel_w: usize,
    w_mean: Vec<f64>,
    w_logvar: Vec<f64>,
    b_mean: Vec<f64>,
    b_logvar: Vec<f64>,
    prior_variance: f64,
    prior: Option<Box<dyn Prior>>,
    posterior: Option<Box<dyn Posterior>>,
}

impl BayesianConv {
    /// Create a layer with means drawn from N(0, 0.01) and log-variances
    /// fixed at -5.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_h: usize,
        kernel_w: usize,
        prior_variance: f64,
        prior: Option<Box<dyn Prior>>,
        posterior: Option<Box<dyn Posterior>>,
        rng: &mut SimpleRng,
    ) -> Self {
        let weight_count = out_channels * in_channels * kernel_h * kernel_w;
        let mut w_mean = vec![0.0; weight_count];
        for value in &mut w_mean {
            *value = rng.gaussian(0.0, INIT_MEAN_STDDEV);
        }
        let mut b_mean = vec![0.0; out_channels];
        for value in &mut b_mean {
            *value = rng.gaussian(0.0, INIT_MEAN_STDDEV);
        }

        Self {
            in_channels,
            out_channels,
            kernel_h,
            kernel_w,
            w_mean,
            w_logvar: vec![INIT_LOGVAR; weight_count],
            b_mean,
            b_logvar: vec![INIT_LOGVAR; out_channels],
            prior_variance,
            prior,
            posterior,
        }
    }

    /// Number of input channels.
    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    /// Number of output channels.
    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    fn sample_parameter(&self, mu: f64, logvar: f64, rng: &mut SimpleRng) -> f64 {
        match &self.posterior {
            Some(posterior) => posterior.sample(mu, logvar, rng),
            None => sample_gaussian(mu, logvar, rng),
        }
    }

    fn effective_weights(&self, stochastic: bool, rng: &mut SimpleRng) -> (Vec<f64>, Vec<f64>) {
        let weights = if stochastic {
            self.w_mean
                .iter()
                .zip(self.w_logvar.iter())
                .map(|(&mu, &lv)| self.sample_parameter(mu, lv, rng))
                .collect()
        } else {
            self.w_mean.clone()
        };
        let biases = if stochastic {
            self.b_mean
                .iter()
                .zip(self.b_logvar.iter())
                .map(|(&mu, &lv)| self.sample_parameter(mu, lv, rng))
                .collect()
        } else {
            self.b_mean.clone()
        };
        (weights, biases)
    }

    /// Valid convolution over one input tensor.
    ///
    /// Output shape is (out_channels × (h − kernel_h + 1) × (w − kernel_w + 1)).
    ///
    /// # Panics
    ///
    /// Panics if the input channel count differs from `in_channels` or the
    /// spatial extent is smaller than the kernel.
    pub fn forward(&self, input: &Tensor, stochastic: bool, rng: &mut SimpleRng) -> Tensor {
        assert_eq!(
            input.channels(),
            self.in_channels,
            "conv layer channel mismatch: expected {}, got {}",
            self.in_channels,
            input.channels()
        );
        assert!(
            input.height() >= self.kernel_h && input.width() >= self.kernel_w,
            "conv layer input {}x{} smaller than kernel {}x{}",
            input.height(),
            input.width(),
            self.kernel_h,
            self.kernel_w
        );

        let out_h = input.height() - self.kernel_h + 1;
        let out_w = input.width() - self.kernel_w + 1;
        let (weights, biases) = self.effective_weights(stochastic, rng);

        let mut output = Tensor::zeros(self.out_channels, out_h, out_w);
        for oc in 0..self.out_channels {
            for oy in 0..out_h {
                for ox in 0..out_w {
                    let mut sum = biases[oc];
                    for ic in 0..self.in_channels {
                        for ky in 0..self.kernel_h {
                            for kx in 0..self.kernel_w {
                                let w_idx = ((oc * self.in_channels + ic) * self.kernel_h + ky)
                                    * self.kernel_w
                                    + kx;
                                sum += weights[w_idx] * input.get(ic, oy + ky, ox + kx);
                            }
                        }
                    }
                    output.set(oc, oy, ox, sum);
                }
            }
        }
        output
    }

    /// Convolve a batch matrix, one row at a time.
    ///
    /// Each row is interpreted as a flattened square spatial tensor: the side
    /// length is `sqrt(cols / in_channels)` and must reproduce the column
    /// count exactly. Output rows are the flattened convolution results.
    ///
    /// # Panics
    ///
    /// Panics if the column count does not describe a square spatial layout
    /// for `in_channels` channels.
    pub fn forward_matrix(&self, input: &Matrix, stochastic: bool, rng: &mut SimpleRng) -> Matrix {
        let cols = input.cols();
        assert!(
            cols % self.in_channels == 0,
            "conv layer input width {} not divisible by {} channels",
            cols,
            self.in_channels
        );
        let spatial = cols / self.in_channels;
        let side = (spatial as f64).sqrt().round() as usize;
        assert_eq!(
            side * side,
            spatial,
            "conv layer input width {} is not a square spatial layout for {} channels",
            cols,
            self.in_channels
        );

        let out_h = side.checked_sub(self.kernel_h - 1).unwrap_or(0);
        let out_w = side.checked_sub(self.kernel_w - 1).unwrap_or(0);
        assert!(
            out_h > 0 && out_w > 0,
            "conv layer spatial side {} smaller than kernel {}x{}",
            side,
            self.kernel_h,
            self.kernel_w
        );

        let out_cols = self.out_channels * out_h * out_w;
        let mut output = Matrix::zeros(input.rows(), out_cols);
        for row in 0..input.rows() {
            let mut plane = Tensor::zeros(self.in_channels, side, side);
            for c in 0..self.in_channels {
                for y in 0..side {
                    for x in 0..side {
                        plane.set(c, y, x, input.get(row, (c * side + y) * side + x));
                    }
                }
            }
            let conv = self.forward(&plane, stochastic, rng);
            for (col, &value) in conv.as_slice().iter().enumerate() {
                output.set(row, col, value);
            }
        }
        output
    }

    /// Total KL divergence over every kernel weight and bias. Same precedence
    /// as the linear layer: Prior, then Posterior, then the Gaussian
    /// fallback.
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

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conv(in_ch: usize, out_ch: usize) -> BayesianConv {
        let mut rng = SimpleRng::new(42);
        BayesianConv::new(in_ch, out_ch, 3, 3, 1.0, None, None, &mut rng)
    }

    #[test]
    fn test_forward_output_shape() {
        let conv = test_conv(1, 2);
        let mut rng = SimpleRng::new(7);
        let input = Tensor::zeros(1, 5, 5);
        let out = conv.forward(&input, false, &mut rng);

        assert_eq!(out.channels(), 2);
        assert_eq!(out.height(), 3);
        assert_eq!(out.width(), 3);
    }

    #[test]
    fn test_deterministic_forward_on_zero_input_is_bias() {
        let conv = test_conv(1, 1);
        let mut rng = SimpleRng::new(7);
        let input = Tensor::zeros(1, 4, 4);
        let out = conv.forward(&input, false, &mut rng);

        let bias = conv.b_mean[0];
        for &v in out.as_slice() {
            assert_eq!(v, bias);
        }
    }

    #[test]
    #[should_panic(expected = "channel mismatch")]
    fn test_forward_channel_mismatch() {
        let conv = test_conv(2, 1);
        let mut rng = SimpleRng::new(7);
        let input = Tensor::zeros(1, 5, 5);
        let _ = conv.forward(&input, false, &mut rng);
    }

    #[test]
    #[should_panic(expected = "smaller than kernel")]
    fn test_forward_input_too_small() {
        let conv = test_conv(1, 1);
        let mut rng = SimpleRng::new(7);
        let input = Tensor::zeros(1, 2, 2);
        let _ = conv.forward(&input, false, &mut rng);
    }

    #[test]
    fn test_forward_matrix_square_reshape() {
        let conv = test_conv(1, 1);
        let mut rng = SimpleRng::new(7);
        // Two rows of a 4x4 single-channel image.
        let input = Matrix::zeros(2, 16);
        let out = conv.forward_matrix(&input, false, &mut rng);

        assert_eq!(out.rows(), 2);
        // 4x4 input, 3x3 kernel -> 2x2 output per channel.
        assert_eq!(out.cols(), 4);
    }

    #[test]
    #[should_panic(expected = "not a square spatial layout")]
    fn test_forward_matrix_rejects_non_square() {
        let conv = test_conv(1, 1);
        let mut rng = SimpleRng::new(7);
        let input = Matrix::zeros(1, 15);
        let _ = conv.forward_matrix(&input, false, &mut rng);
    }

    #[test]
    fn test_kl_positive() {
        let conv = test_conv(1, 2);
        assert!(conv.kl() > 0.0);
    }
}
