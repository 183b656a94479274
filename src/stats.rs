/// EMA smoothing factor for the running mean and variance
const EMA_ALPHA: f64 = 0.1;

/// Epsilon guarding the z-score denominator
const Z_EPS: f64 = 1e-8;

/// Exponentially-weighted running statistics over the novelty signal
///
/// Owned by the trainer and threaded through the reward engine by
/// reference; there is no process-wide instance.
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    n: u64,
    mu: f64,
    m2: f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of samples folded in so far
    pub fn n(&self) -> u64 {
        self.n
    }

    pub fn mean(&self) -> f64 {
        self.mu
    }

    /// Z-score of `x` against the current statistics, without updating them
    ///
    /// Returns 0 until two samples have been observed.
    ///
    /// **Panics** if `x` is NaN or infinite
    pub fn peek_z(&self, x: f64) -> f64 {
        assert!(x.is_finite(), "non-finite value {} scored against running stats", x);
        if self.n < 2 {
            return 0.0;
        }
        let sigma = self.m2.sqrt();
        (x - self.mu) / (sigma + Z_EPS)
    }

    /// Fold `x` into the EMA mean and variance accumulator
    pub fn update(&mut self, x: f64) {
        self.n += 1;
        if self.n <= 1 {
            self.mu = x;
            self.m2 = 0.0;
        } else {
            let delta1 = x - self.mu;
            self.mu += delta1 * EMA_ALPHA;
            let delta2 = x - self.mu;
            self.m2 = (1.0 - EMA_ALPHA) * (self.m2 + delta1 * delta2);
        }
    }
}

/// Which decay curve scales the exploration weight
///
/// The exponential form is the current one; the linear form is the legacy
/// schedule, kept selectable for experiments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BetaDecay {
    Exponential,
    Linear,
}

/// Schedule for the exploration weight applied to the novelty signal
///
/// Evaluated against the running-stats sample count `n`:
/// `frac = min(1, n / decay_horizon)`, then
/// `beta = beta_floor + (beta_initial - beta_floor) * e^(-decay_lambda * frac)`
/// for the exponential variant. With the default horizon the decay is
/// glacial on purpose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetaSchedule {
    pub beta_initial: f64,
    pub beta_floor: f64,
    pub decay_lambda: f64,
    pub decay_horizon: f64,
    pub variant: BetaDecay,
}

impl Default for BetaSchedule {
    fn default() -> Self {
        Self {
            beta_initial: 5.0,
            beta_floor: 0.01,
            decay_lambda: 0.1,
            decay_horizon: 2e10,
            variant: BetaDecay::Exponential,
        }
    }
}

impl BetaSchedule {
    /// Exploration weight after `n` novelty samples
    pub fn beta(&self, n: u64) -> f64 {
        let frac = (n as f64 / self.decay_horizon).min(1.0);
        let spread = self.beta_initial - self.beta_floor;
        match self.variant {
            BetaDecay::Exponential => self.beta_floor + spread * (-self.decay_lambda * frac).exp(),
            BetaDecay::Linear => self.beta_floor + spread * (1.0 - frac).max(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn z_is_zero_until_two_samples() {
        let mut stats = RunningStats::new();
        assert_eq!(stats.peek_z(3.0), 0.0);
        stats.update(3.0);
        assert_eq!(stats.peek_z(3.0), 0.0);
    }

    #[test]
    fn constant_input_converges_to_zero_z() {
        let mut stats = RunningStats::new();
        for _ in 0..100 {
            stats.update(4.2);
        }

        assert_eq!(stats.n(), 100);
        assert!((stats.mean() - 4.2).abs() < 1e-9);
        assert!(stats.peek_z(4.2).abs() < 1e-6);
    }

    #[test]
    fn outliers_score_far_from_the_mean() {
        let mut stats = RunningStats::new();
        for i in 0..50 {
            stats.update(if i % 2 == 0 { 0.9 } else { 1.1 });
        }

        assert!(stats.peek_z(10.0) > 3.0);
        assert!(stats.peek_z(-10.0) < -3.0);
    }

    #[test]
    #[should_panic]
    fn non_finite_sample_is_fatal() {
        let stats = RunningStats::new();
        stats.peek_z(f64::NAN);
    }

    #[test]
    fn beta_starts_at_initial_and_never_increases() {
        let schedule = BetaSchedule::default();
        assert!((schedule.beta(0) - schedule.beta_initial).abs() < 1e-12);

        let mut last = schedule.beta(0);
        for n in [1, 10, 1_000, 1_000_000, u64::MAX] {
            let beta = schedule.beta(n);
            assert!(beta <= last, "beta increased at n = {}", n);
            assert!(beta >= schedule.beta_floor);
            last = beta;
        }
    }

    #[test]
    fn steep_exponential_schedule_reaches_the_floor() {
        let schedule = BetaSchedule {
            decay_lambda: 50.0,
            decay_horizon: 1000.0,
            ..BetaSchedule::default()
        };
        assert!((schedule.beta(u64::MAX) - schedule.beta_floor).abs() < 1e-10);
    }

    #[test]
    fn linear_variant_hits_the_floor_at_the_horizon() {
        let schedule = BetaSchedule {
            decay_horizon: 100.0,
            variant: BetaDecay::Linear,
            ..BetaSchedule::default()
        };
        assert!((schedule.beta(0) - schedule.beta_initial).abs() < 1e-12);
        assert_eq!(schedule.beta(100), schedule.beta_floor);
        assert_eq!(schedule.beta(10_000), schedule.beta_floor);
    }
}
