use std::f64::consts::PI;

use super::{DenseLayer, NnError};

/// Steps per cosine-annealing cycle after warmup
const COSINE_CYCLE: u64 = 200_000;

/// Warmup followed by cyclic cosine annealing
///
/// For `step < warmup` (one hundredth of `max_steps`, at least 1) the rate
/// ramps linearly from `lr_min` up to `lr_initial`. Afterwards it follows
/// `lr_min + (lr_initial - lr_min) * (1 + cos(pi * t / T)) / 2` with `t`
/// the position inside a 200 000-step cycle.
#[derive(Debug, Clone)]
pub struct LrSchedule {
    lr_initial: f64,
    lr_min: f64,
    warmup: u64,
}

impl LrSchedule {
    pub fn new(lr_initial: f64, lr_min: f64, max_steps: u64) -> Self {
        Self {
            lr_initial,
            lr_min,
            warmup: (max_steps / 100).max(1),
        }
    }

    /// Learning rate at an optimizer step
    pub fn learning_rate(&self, step: u64) -> f64 {
        let spread = self.lr_initial - self.lr_min;
        if step < self.warmup {
            self.lr_min + spread * step as f64 / self.warmup as f64
        } else {
            let t = (step - self.warmup) % COSINE_CYCLE;
            let cosine = 0.5 * (1.0 + (PI * t as f64 / COSINE_CYCLE as f64).cos());
            self.lr_min + spread * cosine
        }
    }
}

/// Hyperparameters for [`Adam`]
///
/// One set exists per network role family: the DQN pair and the RND pair
/// are configured independently (see [`config`](crate::config)).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdamParams {
    pub lr_initial: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    pub max_training_steps: u64,
    pub min_learning_rate: f64,
}

impl Default for AdamParams {
    fn default() -> Self {
        Self {
            lr_initial: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            max_training_steps: 1_000_000,
            min_learning_rate: 1e-5,
        }
    }
}

/// Adam optimizer with a scheduled learning rate
///
/// The optimizer owns its [`LrSchedule`] and receives a layer mutably for
/// the duration of one [`update`](Self::update) call; it keeps no
/// references into the network.
#[derive(Debug, Clone)]
pub struct Adam {
    schedule: LrSchedule,
    step: u64,
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    eps: f64,
}

impl Adam {
    pub fn new(
        lr_initial: f64,
        beta1: f64,
        beta2: f64,
        eps: f64,
        max_steps: u64,
        lr_min: f64,
    ) -> Self {
        let schedule = LrSchedule::new(lr_initial, lr_min, max_steps);
        Self {
            schedule,
            step: 0,
            learning_rate: lr_initial,
            beta1,
            beta2,
            eps,
        }
    }

    pub fn from_params(params: &AdamParams) -> Self {
        Self::new(
            params.lr_initial,
            params.beta1,
            params.beta2,
            params.eps,
            params.max_training_steps,
            params.min_learning_rate,
        )
    }

    /// Advance to the next (1-indexed) step and refresh the learning rate
    pub fn pre_update_params(&mut self) {
        self.step += 1;
        self.learning_rate = self.schedule.learning_rate(self.step);
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn current_learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Apply one Adam update to a layer from its stored gradients
    ///
    /// Lazily allocates the moment accumulators on first use. The layer's
    /// `dweights` is held transposed, so it is transposed back before the
    /// moment update. Every parameter and accumulator is probed for
    /// NaN/Inf afterwards.
    pub fn update(&mut self, layer: &mut DenseLayer) -> Result<(), NnError> {
        use super::Matrix;

        if layer.weight_momentums.is_empty() {
            layer.weight_momentums = Matrix::zeros(layer.n_inputs, layer.n_neurons);
            layer.weight_cache = Matrix::zeros(layer.n_inputs, layer.n_neurons);
            layer.bias_momentums = Matrix::zeros(1, layer.n_neurons);
            layer.bias_cache = Matrix::zeros(1, layer.n_neurons);
        }

        let dweights = layer.dweights.transpose();
        let dbiases = layer.dbiases.clone();

        let b1 = self.beta1;
        let b2 = self.beta2;

        layer.weight_momentums.apply(|m| m * b1);
        let mut term = dweights.clone();
        term.scale(1.0 - b1);
        layer.weight_momentums.add_assign(&term);

        layer.bias_momentums.apply(|m| m * b1);
        let mut term = dbiases.clone();
        term.scale(1.0 - b1);
        layer.bias_momentums.add_assign(&term);

        layer.weight_cache.apply(|v| v * b2);
        let mut term = dweights.square();
        term.scale(1.0 - b2);
        layer.weight_cache.add_assign(&term);

        layer.bias_cache.apply(|v| v * b2);
        let mut term = dbiases.square();
        term.scale(1.0 - b2);
        layer.bias_cache.add_assign(&term);

        // Bias-corrected moment estimates; step is 1-indexed so the
        // denominators are nonzero.
        let m_correction = 1.0 - b1.powi(self.step as i32);
        let v_correction = 1.0 - b2.powi(self.step as i32);

        let lr = self.learning_rate;
        let eps = self.eps;

        let mut weight_updates = layer.weight_momentums.clone();
        weight_updates.scale(1.0 / m_correction);
        let mut denom = layer.weight_cache.clone();
        denom.apply(|v| (v / v_correction).sqrt() + eps);
        weight_updates.zip_div(&denom);
        weight_updates.scale(-lr);
        layer.weights.add_assign(&weight_updates);

        let mut bias_updates = layer.bias_momentums.clone();
        bias_updates.scale(1.0 / m_correction);
        let mut denom = layer.bias_cache.clone();
        denom.apply(|v| (v / v_correction).sqrt() + eps);
        bias_updates.zip_div(&denom);
        bias_updates.scale(-lr);
        layer.biases.add_assign(&bias_updates);

        if !layer.parameters_finite() {
            return Err(NnError::non_finite("layer parameters after Adam update", &layer.weights));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::super::Matrix;
    use super::*;

    #[test]
    fn schedule_ramps_through_warmup() {
        let s = LrSchedule::new(0.1, 0.001, 1000);
        // warmup = 10 steps
        assert_eq!(s.learning_rate(0), 0.001);
        let mid = s.learning_rate(5);
        assert!(mid > 0.001 && mid < 0.1, "mid-warmup rate in range");
        assert!(s.learning_rate(9) < 0.1);
    }

    #[test]
    fn schedule_peaks_at_warmup_end_and_anneals() {
        let s = LrSchedule::new(0.1, 0.001, 1000);
        let peak = s.learning_rate(10);
        assert!((peak - 0.1).abs() < 1e-12, "cosine starts at lr_initial");

        let midpoint = s.learning_rate(10 + 100_000);
        let expected = 0.001 + (0.1 - 0.001) * 0.5;
        assert!(
            (midpoint - expected).abs() < 1e-12,
            "half a cycle sits midway between the bounds"
        );

        let trough = s.learning_rate(10 + 199_999);
        assert!((trough - 0.001).abs() < 1e-6, "cycle end approaches lr_min");

        let wrapped = s.learning_rate(10 + 200_000);
        assert!((wrapped - 0.1).abs() < 1e-12, "cycle repeats");
    }

    #[test]
    fn adam_descends_a_known_gradient() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut layer = DenseLayer::new(2, 2, 0.0, 0.0, 0.0, 0.0, &mut rng);
        layer.weights = Matrix::filled(2, 2, 1.0);
        layer.biases = Matrix::zeros(1, 2);

        // Constant positive gradient: every weight must decrease.
        layer.dweights = Matrix::filled(2, 2, 0.5);
        layer.dbiases = Matrix::filled(1, 2, 0.5);

        let mut adam = Adam::new(0.01, 0.9, 0.999, 1e-8, 10_000, 1e-4);
        adam.pre_update_params();
        adam.update(&mut layer).unwrap();

        for &w in layer.weights.as_slice() {
            assert!(w < 1.0, "weight moved against the gradient: {}", w);
        }
        assert!(layer.parameters_finite());
        assert_eq!(adam.step(), 1);
    }

    #[test]
    fn adam_flags_non_finite_parameters() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut layer = DenseLayer::new(2, 2, 0.0, 0.0, 0.0, 0.0, &mut rng);
        layer.dweights = Matrix::filled(2, 2, f64::NAN);
        layer.dbiases = Matrix::zeros(1, 2);

        let mut adam = Adam::new(0.01, 0.9, 0.999, 1e-8, 10_000, 1e-4);
        adam.pre_update_params();
        assert!(adam.update(&mut layer).is_err());
    }
}
