use log::debug;

use crate::nn::{mse_loss, Matrix, NetworkHandle, NetworkRegistry};
use crate::state::{encode_rnd, Direction, State};
use crate::stats::{BetaSchedule, RunningStats};

/// Named constants of the extrinsic reward
///
/// Exposed as plain fields so experiments can retune the shaping without
/// touching code. The defaults are the tuned values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardConfig {
    /// Added when the organism ran into a wall this tick
    pub wall_collision_penalty: f64,
    /// Added once per food item currently in vision
    pub food_in_vision_reward: f64,
    /// Added while the organism is eating
    pub eating_reward: f64,
    /// Weight of the `(1 - energy)` drain term
    pub energy_drain_weight: f64,
    /// Extrinsic clamp bounds
    pub extrinsic_min: f64,
    pub extrinsic_max: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            wall_collision_penalty: -15.0,
            food_in_vision_reward: 10.0,
            eating_reward: 10.0,
            energy_drain_weight: 0.1,
            extrinsic_min: -20.0,
            extrinsic_max: 20.0,
        }
    }
}

/// Shapes the per-tick reward from game events and, when enabled, the
/// novelty signal of the predictor/target network pair
///
/// The engine holds registry handles rather than networks, and borrows the
/// registry and running statistics per call; the trainer owns both.
#[derive(Debug)]
pub struct RewardEngine {
    config: RewardConfig,
    beta: BetaSchedule,
    predictor: NetworkHandle,
    target: NetworkHandle,
}

impl RewardEngine {
    pub fn new(
        config: RewardConfig,
        beta: BetaSchedule,
        predictor: NetworkHandle,
        target: NetworkHandle,
    ) -> Self {
        Self {
            config,
            beta,
            predictor,
            target,
        }
    }

    pub fn config(&self) -> &RewardConfig {
        &self.config
    }

    /// Reward from observable game events alone, clamped to the configured
    /// bounds
    pub fn extrinsic(&self, state: &State, hit_wall: bool) -> f64 {
        let c = &self.config;
        let mut reward = 0.0;

        if hit_wall {
            reward += c.wall_collision_penalty;
        }
        reward += c.food_in_vision_reward * state.food_count_in_vision as f64;
        if state.is_eating {
            reward += c.eating_reward;
        }
        reward -= c.energy_drain_weight * (1.0 - state.energy_lvl);

        reward.clamp(c.extrinsic_min, c.extrinsic_max)
    }

    /// Z-scored novelty of one encoded observation
    ///
    /// Runs the predictor and frozen target on the observation, reduces the
    /// disagreement to a relative RMSE, scores it against the running
    /// statistics, then folds it in.
    pub fn intrinsic_reward(
        &self,
        registry: &mut NetworkRegistry,
        stats: &mut RunningStats,
        encoded: &[f64],
    ) -> f64 {
        let pred = registry
            .get_mut(self.predictor)
            .expect("predictor network is registered")
            .predict(encoded, 1)
            .unwrap_or_else(|e| crate::nn::fail_loud(e));
        let targ = registry
            .get_mut(self.target)
            .expect("novelty target network is registered")
            .predict(encoded, 1)
            .unwrap_or_else(|e| crate::nn::fail_loud(e));

        let pred = Matrix::from_vec(1, pred.len(), pred);
        let targ = Matrix::from_vec(1, targ.len(), targ);
        let mse = mse_loss(&pred, &targ);
        let mean_abs_t = targ.abs().sum() / targ.n_elems() as f64;

        let rel_rmse = mse.sqrt() / (1.0 + mean_abs_t);
        let z = stats.peek_z(rel_rmse);
        stats.update(rel_rmse);
        debug!("novelty rel_rmse {} z-score {}", rel_rmse, z);
        z
    }

    /// Total shaped reward for one tick
    ///
    /// Extrinsic shaping always applies. When `rnd_enabled`, the z-scored
    /// novelty of the encoded state is weighted by the scheduled beta and
    /// added on top; familiar states contribute nothing rather than a
    /// penalty, and the total is not clamped again.
    ///
    /// The trailing position parameters are unused by the current shaping
    /// and kept for driver compatibility.
    #[allow(clippy::too_many_arguments)]
    pub fn compute(
        &self,
        registry: &mut NetworkRegistry,
        stats: &mut RunningStats,
        state: &State,
        _action: Direction,
        food_rates: &[f64],
        sector: u32,
        rnd_enabled: bool,
        hit_wall: bool,
        _org_x: i32,
        _org_y: i32,
        _dir: Direction,
        _wall_pos_x: i32,
        _wall_pos_y: i32,
    ) -> f64 {
        let extrinsic = self.extrinsic(state, hit_wall);
        debug!("extrinsic reward {}", extrinsic);

        if !rnd_enabled {
            return extrinsic;
        }

        let encoded = encode_rnd(state, food_rates, sector);
        let z = self.intrinsic_reward(registry, stats, &encoded);
        let beta = self.beta.beta(stats.n());
        let intrinsic_term = beta * z.max(0.0);
        debug!("beta {} intrinsic term {}", beta, intrinsic_term);

        extrinsic + intrinsic_term
    }
}
