//! Simple random number generator for reproducibility.
//!
//! This module provides a lightweight xorshift-based PRNG that doesn't require
//! external dependencies, ensuring reproducible results across runs. On top of
//! the uniform draws it offers the Gaussian and Rademacher samples needed by
//! the variational layers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Simple RNG for reproducibility without external crates.
///
/// Uses xorshift algorithm for fast, deterministic random number generation.
/// There is deliberately no global instance: every sampling call site receives
/// a `&mut SimpleRng`, so tests can seed it and concurrent extensions can give
/// each worker its own generator.
#[derive(Clone)]
pub struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    /// Create a new RNG with explicit seed (if zero, use a fixed value).
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 0x9e3779b97f4a7c15 } else { seed };
        Self { state }
    }

    /// Reseed based on the current time.
    pub fn reseed_from_time(&mut self) {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        self.state = if nanos == 0 {
            0x9e3779b97f4a7c15
        } else {
            nanos
        };
    }

    /// Basic xorshift to generate u64.
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Uniform sample in (0, 1]. The open lower bound keeps `ln(u)` finite
    /// for the Box-Muller transform and the Concrete dropout relaxation.
    pub fn next_f64(&mut self) -> f64 {
        (((self.next_u64() >> 11) as f64) + 1.0) / ((1u64 << 53) as f64)
    }

    /// Uniform sample in (low, high].
    pub fn gen_range_f64(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_f64()
    }

    /// Normally distributed sample via the Box-Muller transform.
    pub fn gaussian(&mut self, mean: f64, stddev: f64) -> f64 {
        let u1 = self.next_f64();
        let u2 = self.next_f64();
        let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        z0 * stddev + mean
    }

    /// Standard normal sample.
    pub fn standard_gaussian(&mut self) -> f64 {
        self.gaussian(0.0, 1.0)
    }

    /// Rademacher sample: +1.0 or -1.0 with equal probability.
    pub fn rademacher(&mut self) -> f64 {
        if self.next_f64() < 0.5 {
            1.0
        } else {
            -1.0
        }
    }

    /// Bernoulli sample: `true` with probability `p`.
    pub fn bernoulli(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}
