//! Training configuration
//!
//! A single flat record holds every hyperparameter of the engine: optimizer
//! settings, architecture description, prior/posterior selection and the
//! knobs of the individual inference methods. It deserializes from JSON with
//! per-field defaults, so a config file only needs to name the fields it
//! changes.
//!
//! # Example
//!
//! ```json
//! {
//!   "learning_rate": 0.01,
//!   "num_layers": 2,
//!   "neurons_per_layer": "16,4",
//!   "layer_types": "linear,linear",
//!   "input_dim": 8,
//!   "optimizer": 1
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;

/// Flat hyperparameter record for building and training a network.
///
/// Integer codes follow a simple convention: `optimizer` 0 = SGD, 1 = Adam;
/// `prior_type` 0 = Gaussian (default fallback), 1 = Laplace, 2 = mixture;
/// `posterior_method` 0 = plain reparameterized sampling, 1 = structured,
/// 2 = flipout. Fields for inference methods handled by external
/// collaborators (MCMC, EP, ensembles) are carried here so one file can
/// describe a whole experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Optimization
    pub learning_rate: f64,
    pub mini_batch_size: usize,
    pub num_epochs: usize,
    pub lr_decay: f64,
    /// 0 = SGD, 1 = Adam.
    pub optimizer: u32,
    pub grad_clip: f64,
    /// Stddev of the Gaussian noise injected into stochastic-activation
    /// gradients; 0 disables injection.
    pub noise_injection: f64,

    // Adam
    pub adam_beta1: f64,
    pub adam_beta2: f64,
    pub adam_epsilon: f64,

    /// 0 = variational (the method implemented here); other codes select
    /// external collaborators.
    pub inference_method: u32,

    // Architecture
    pub num_layers: usize,
    /// Comma-separated output widths, e.g. "128,128,10".
    pub neurons_per_layer: String,
    /// Comma-separated layer kinds: "linear", "conv", "dropout", "stochastic".
    pub layer_types: String,
    pub weight_init_method: u32,
    pub input_dim: usize,

    // Prior
    /// 0 = Gaussian fallback, 1 = Laplace, 2 = two-component mixture.
    pub prior_type: u32,
    pub prior_variance: f64,
    pub covariance_structure: u32,

    /// 0 = default sampling, 1 = structured, 2 = flipout.
    pub posterior_method: u32,

    // Bayes-by-backprop
    pub mc_samples_train: usize,
    pub kl_weight: f64,
    pub local_reparam: bool,
    pub bbb_learn_variance: bool,
    pub bbb_noise_scaling: f64,

    // MC dropout
    pub dropout_prob: f64,
    pub mc_samples_inference: usize,

    // MCMC (external collaborator)
    pub mcmc_step_size: f64,
    pub mcmc_burn_in: usize,
    pub mcmc_noise: f64,

    // Expectation propagation (external collaborator)
    pub ep_damping: f64,
    pub ep_iterations: usize,
    pub ep_tolerance: f64,

    pub sampling_temperature: f64,

    // Regularization
    pub regularization_weight: f64,
    pub kl_annealing: bool,

    pub ensemble_size: usize,
    pub data_path: String,

    /// RNG seed; 0 means "pick a fixed internal constant".
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            mini_batch_size: 32,
            num_epochs: 100,
            lr_decay: 0.0,
            optimizer: 0,
            grad_clip: 5.0,
            noise_injection: 0.0,
            adam_beta1: 0.9,
            adam_beta2: 0.999,
            adam_epsilon: 1e-8,
            inference_method: 0,
            num_layers: 3,
            neurons_per_layer: "128,128,10".to_string(),
            layer_types: "linear,linear,linear".to_string(),
            weight_init_method: 0,
            input_dim: 100,
            prior_type: 0,
            prior_variance: 1.0,
            covariance_structure: 0,
            posterior_method: 0,
            mc_samples_train: 1,
            kl_weight: 0.001,
            local_reparam: true,
            bbb_learn_variance: true,
            bbb_noise_scaling: 1.0,
            dropout_prob: 0.5,
            mc_samples_inference: 10,
            mcmc_step_size: 0.001,
            mcmc_burn_in: 1000,
            mcmc_noise: 0.01,
            ep_damping: 0.5,
            ep_iterations: 100,
            ep_tolerance: 1e-4,
            sampling_temperature: 1.0,
            regularization_weight: 1e-4,
            kl_annealing: false,
            ensemble_size: 1,
            data_path: "data/train.csv".to_string(),
            seed: 0,
        }
    }
}

/// Loads a configuration from a JSON file.
///
/// Reads the file at `path`, deserializes it (missing fields take their
/// defaults) and validates the result.
///
/// # Returns
///
/// `Ok(Config)` on success, or an error if the file cannot be read, the JSON
/// is invalid, or a hyperparameter is out of range.
pub fn load_config(path: &str) -> Result<Config, Box<dyn Error>> {
    let contents = fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&contents)?;
    validate_config(&config)?;
    Ok(config)
}

fn invalid(msg: impl Into<String>) -> Box<dyn Error> {
    Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        msg.into(),
    ))
}

/// Checks hyperparameter ranges. Called by [`load_config`]; exposed so
/// programmatically built configs can be checked too.
pub fn validate_config(config: &Config) -> Result<(), Box<dyn Error>> {
    if config.learning_rate <= 0.0 {
        return Err(invalid("learning_rate must be positive"));
    }

    if config.lr_decay < 0.0 {
        return Err(invalid("lr_decay must be non-negative"));
    }

    if config.optimizer > 1 {
        return Err(invalid(format!(
            "Invalid optimizer code {}. Must be 0 (SGD) or 1 (Adam)",
            config.optimizer
        )));
    }

    if config.prior_type > 2 {
        return Err(invalid(format!(
            "Invalid prior_type code {}. Must be 0 (Gaussian), 1 (Laplace) or 2 (mixture)",
            config.prior_type
        )));
    }

    if config.posterior_method > 2 {
        return Err(invalid(format!(
            "Invalid posterior_method code {}. Must be 0 (default), 1 (structured) or 2 (flipout)",
            config.posterior_method
        )));
    }

    if config.prior_variance <= 0.0 {
        return Err(invalid("prior_variance must be positive"));
    }

    if config.sampling_temperature <= 0.0 {
        return Err(invalid("sampling_temperature must be positive"));
    }

    // The dropout mask divides by 1 - p and the Concrete relaxation takes
    // logit(p), so both endpoints are rejected up front.
    if config.dropout_prob <= 0.0 || config.dropout_prob >= 1.0 {
        return Err(invalid("dropout_prob must be strictly between 0 and 1"));
    }

    if config.adam_beta1 < 0.0 || config.adam_beta1 >= 1.0 {
        return Err(invalid("adam_beta1 must be in [0, 1)"));
    }

    if config.adam_beta2 < 0.0 || config.adam_beta2 >= 1.0 {
        return Err(invalid("adam_beta2 must be in [0, 1)"));
    }

    if config.adam_epsilon <= 0.0 {
        return Err(invalid("adam_epsilon must be positive"));
    }

    if config.kl_weight < 0.0 {
        return Err(invalid("kl_weight must be non-negative"));
    }

    if config.input_dim == 0 {
        return Err(invalid("input_dim must be positive"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.learning_rate, 0.001);
        assert_eq!(config.num_layers, 3);
        assert_eq!(config.neurons_per_layer, "128,128,10");
        assert_eq!(config.prior_variance, 1.0);
        assert_eq!(config.mc_samples_inference, 10);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{ "learning_rate": 0.01, "optimizer": 1 }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.learning_rate, 0.01);
        assert_eq!(config.optimizer, 1);
        // Everything else stays at its default.
        assert_eq!(config.num_epochs, 100);
        assert_eq!(config.kl_weight, 0.001);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.learning_rate = 0.0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.dropout_prob = 1.0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.optimizer = 5;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.prior_variance = -1.0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_serialize_round_trip() {
        let mut config = Config::default();
        config.neurons_per_layer = "16,8,2".to_string();
        config.posterior_method = 2;

        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.neurons_per_layer, "16,8,2");
        assert_eq!(back.posterior_method, 2);
        assert_eq!(back.adam_beta2, config.adam_beta2);
    }
}
