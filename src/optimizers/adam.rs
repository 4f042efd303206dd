//! Adam optimizer with per-layer moment state.
//!
//! Each trainable layer gets one [`AdamState`] keyed by its position in the
//! network's internal layer list. For linear-like layers the moment vectors
//! cover weights and biases in one buffer, with the bias moments starting at
//! offset `weight_count`; a stochastic activation needs a single slot. State
//! is lazily created on the first step and rebuilt if a layer's parameter
//! count ever changes.

use crate::config::Config;
use crate::layers::{BayesianLinear, Layer};
use crate::network::Network;

use super::decayed_learning_rate;

/// First and second moment estimates for one layer.
pub struct AdamState {
    m: Vec<f64>,
    v: Vec<f64>,
    t: u32,
}

impl AdamState {
    fn new(size: usize) -> Self {
        Self {
            m: vec![0.0; size],
            v: vec![0.0; size],
            t: 0,
        }
    }

    /// Number of tracked parameters.
    pub fn size(&self) -> usize {
        self.m.len()
    }

    /// Steps taken with this state.
    pub fn timestep(&self) -> u32 {
        self.t
    }

    /// Update moments for `grads` and write the resulting deltas through
    /// `apply`, which receives `(parameter index, delta)`.
    fn update(&mut self, grads: &[f64], config: &Config, lr: f64, mut apply: impl FnMut(usize, f64)) {
        self.t += 1;
        let beta1 = config.adam_beta1;
        let beta2 = config.adam_beta2;
        let beta1_t = beta1.powi(self.t as i32);
        let beta2_t = beta2.powi(self.t as i32);

        for (i, &g) in grads.iter().enumerate() {
            self.m[i] = beta1 * self.m[i] + (1.0 - beta1) * g;
            self.v[i] = beta2 * self.v[i] + (1.0 - beta2) * g * g;
            let m_hat = self.m[i] / (1.0 - beta1_t);
            let v_hat = self.v[i] / (1.0 - beta2_t);
            apply(i, lr * m_hat / (v_hat.sqrt() + config.adam_epsilon));
        }
    }
}

/// Adam optimizer. Owns one optional state per internal layer index.
pub struct Adam {
    states: Vec<Option<AdamState>>,
}

impl Default for Adam {
    fn default() -> Self {
        Self::new()
    }
}

impl Adam {
    pub fn new() -> Self {
        Self { states: Vec::new() }
    }

    /// State for a layer index, if one has been created.
    pub fn state(&self, index: usize) -> Option<&AdamState> {
        self.states.get(index).and_then(Option::as_ref)
    }

    fn ensure_state(slot: &mut Option<AdamState>, size: usize) -> &mut AdamState {
        if matches!(slot, Some(state) if state.size() != size) {
            *slot = None;
        }
        slot.get_or_insert_with(|| AdamState::new(size))
    }

    fn update_linear(
        slot: &mut Option<AdamState>,
        layer: &mut BayesianLinear,
        config: &Config,
        lr: f64,
    ) {
        let weight_count = layer.weight_count();
        let size = weight_count + layer.output_dim();
        let state = Self::ensure_state(slot, size);

        let mut grads = Vec::with_capacity(size);
        grads.extend_from_slice(layer.dw_mean());
        grads.extend_from_slice(layer.db_mean());

        let mut deltas = vec![0.0; size];
        state.update(&grads, config, lr, |i, delta| deltas[i] = delta);

        for (w, delta) in layer.w_mean_mut().iter_mut().zip(&deltas[..weight_count]) {
            *w -= delta;
        }
        for (b, delta) in layer.b_mean_mut().iter_mut().zip(&deltas[weight_count..]) {
            *b -= delta;
        }
        layer.zero_gradients();
    }

    /// Apply one Adam update to every trainable layer using the
    /// epoch-decayed learning rate. Consumed gradients are zeroed.
    pub fn step(&mut self, network: &mut Network, config: &Config, epoch: usize) {
        let lr = decayed_learning_rate(config, epoch);
        let num_layers = network.num_layers();
        if self.states.len() < num_layers {
            self.states.resize_with(num_layers, || None);
        }

        for (index, layer) in network.layers_mut().iter_mut().enumerate() {
            let slot = &mut self.states[index];
            match layer {
                Layer::Linear(l) | Layer::Projection(l) => {
                    Self::update_linear(slot, l, config, lr);
                }
                Layer::Stochastic(act) => {
                    let state = Self::ensure_state(slot, 1);
                    let grads = [act.d_alpha_mean()];
                    let mut delta = 0.0;
                    state.update(&grads, config, lr, |_, d| delta = d);
                    act.apply_update(delta);
                }
                Layer::Dropout(_) => {}
                Layer::Conv(_) => {
                    eprintln!("Warning: skipping conv layer update (no gradient path)");
                }
            }
        }
    }
}
