//! Adam optimizer with inspectable per-parameter state
//!
//! Each instance owns the parameter list of exactly one network. The update
//! follows the PyTorch formulation, and step counters can be clamped between
//! epochs to keep the bias corrections well behaved on long runs.

use tch::Tensor;

use crate::error::{Error, Result};

/// Adam hyperparameters
#[derive(Debug, Clone, Copy)]
pub struct AdamConfig {
    /// Learning rate
    pub lr: f64,
    /// First moment decay
    pub beta1: f64,
    /// Second moment decay
    pub beta2: f64,
    /// Denominator stabilizer
    pub eps: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            lr: 1e-4,
            beta1: 0.0,
            beta2: 0.9,
            eps: 1e-8,
        }
    }
}

/// Moment estimates and step counter of one parameter tensor
#[derive(Debug)]
pub struct AdamState {
    /// Running mean of gradients
    pub exp_avg: Tensor,
    /// Running mean of squared gradients
    pub exp_avg_sq: Tensor,
    /// Number of updates applied
    pub step: u64,
}

impl AdamState {
    fn zeros_like(param: &Tensor) -> Self {
        Self {
            exp_avg: param.zeros_like(),
            exp_avg_sq: param.zeros_like(),
            step: 0,
        }
    }
}

/// Adam over an explicit parameter list
#[derive(Debug)]
pub struct Adam {
    config: AdamConfig,
    params: Vec<Tensor>,
    /// `None` until the parameter receives its first update
    states: Vec<Option<AdamState>>,
}

impl Adam {
    /// Create an optimizer for the given parameters
    pub fn new(params: Vec<Tensor>, config: AdamConfig) -> Self {
        let states = params.iter().map(|_| None).collect();
        Self {
            config,
            params,
            states,
        }
    }

    /// Parameters updated by this optimizer, in gradient order
    pub fn params(&self) -> &[Tensor] {
        &self.params
    }

    /// Apply one update
    ///
    /// # Arguments
    ///
    /// * `grads` - One gradient per parameter, same order as [`Adam::params`]
    pub fn step(&mut self, grads: &[Tensor]) -> Result<()> {
        if grads.len() != self.params.len() {
            return Err(Error::GradientMismatch {
                expected: self.params.len(),
                actual: grads.len(),
            });
        }

        let AdamConfig {
            lr,
            beta1,
            beta2,
            eps,
        } = self.config;

        tch::no_grad(|| {
            for ((param, grad), slot) in self.params.iter().zip(grads).zip(self.states.iter_mut()) {
                let state = slot.get_or_insert_with(|| AdamState::zeros_like(param));
                state.step += 1;

                state.exp_avg = &state.exp_avg * beta1 + grad * (1.0 - beta1);
                state.exp_avg_sq = &state.exp_avg_sq * beta2 + grad.square() * (1.0 - beta2);

                let t = state.step as f64;
                let bias_correction1 = 1.0 - beta1.powf(t);
                let bias_correction2 = 1.0 - beta2.powf(t);

                let denom = state.exp_avg_sq.sqrt() / bias_correction2.sqrt() + eps;
                let update = &state.exp_avg / denom * (lr / bias_correction1);

                let mut param = param.shallow_clone();
                param -= update;
            }
        });

        Ok(())
    }

    /// Rewrite every step counter `>= threshold` to `reset_to`
    ///
    /// Parameters without state are left alone.
    ///
    /// # Returns
    ///
    /// Number of counters rewritten
    pub fn clamp_step_counts(&mut self, threshold: u64, reset_to: u64) -> usize {
        let mut clamped = 0;
        for state in self.states.iter_mut().flatten() {
            if state.step >= threshold {
                state.step = reset_to;
                clamped += 1;
            }
        }
        clamped
    }

    /// Step counter of every parameter (`None` before its first update)
    pub fn step_counts(&self) -> Vec<Option<u64>> {
        self.states
            .iter()
            .map(|state| state.as_ref().map(|s| s.step))
            .collect()
    }

    /// Get configuration
    pub fn config(&self) -> &AdamConfig {
        &self.config
    }
}
