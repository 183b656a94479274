use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

use crate::config::{NnSystemParams, RlSystemParams};
use crate::memory::{ReplayMemory, RndReplayBuffer, Transition, TransitionBatch};
use crate::nn::io::ModelIoError;
use crate::nn::optim::AdamParams;
use crate::nn::{self, Network, NetworkHandle, NetworkRegistry, NetworkSpec, Role};
use crate::reward::{RewardConfig, RewardEngine};
use crate::state::{
    encode_dqn, encode_rnd, Direction, State, DQN_STATE_WIDTH, RND_STATE_WIDTH,
};
use crate::stats::{BetaSchedule, RunningStats};

/// Ticks between hard online-to-target copies
const TARGET_SYNC_INTERVAL: u64 = 1000;
/// Ticks between DQN optimization steps
const LEARN_INTERVAL: u64 = 4;
/// Ticks between novelty-predictor optimization steps
const RND_LEARN_INTERVAL: u64 = 100;

/// Construction-time failure of the [`Trainer`]
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    ModelIo(#[from] ModelIoError),

    #[error("could not prepare {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Configuration for the [`Trainer`]
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    /// The discount factor applied to bootstrapped next-state values
    ///
    /// **Default:** `0.9`
    pub discount: f64,
    /// Unused; retained so existing drivers keep passing it. The effective
    /// learning rates come from the optimizer hyperparameter sets.
    pub learning_rate: f64,
    /// Where to look for (and persist) the DQN online model; the novelty
    /// pair lives in the `predictor` and `target` subdirectories
    pub model_dir: PathBuf,
    /// Capacity of both replay buffers
    ///
    /// **Default:** `1000`
    pub buffer_capacity: usize,
    /// Whether the novelty subsystem contributes to rewards and trains
    pub rnd_enabled: bool,
    /// Dimensions of the online/target Q-network pair
    pub dqn: NetworkSpec,
    /// Dimensions of the predictor/target novelty pair
    pub rnd: NetworkSpec,
    /// Adam hyperparameters for the Q networks
    pub dqn_optim: AdamParams,
    /// Adam hyperparameters for the novelty networks
    pub rnd_optim: AdamParams,
    /// Extrinsic reward constants
    pub reward: RewardConfig,
    /// Schedule of the novelty weight
    pub beta: BetaSchedule,
    /// Directory for the per-network loss logs
    ///
    /// **Default:** `logs`
    pub log_dir: PathBuf,
    /// Seed for replay sampling and weight initialization; `None` draws
    /// from entropy
    pub seed: Option<u64>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            discount: 0.9,
            learning_rate: 1e-3,
            model_dir: PathBuf::from("models"),
            buffer_capacity: 1000,
            rnd_enabled: true,
            dqn: NetworkSpec {
                input_dim: DQN_STATE_WIDTH,
                output_dim: 4,
                hidden_dim: 64,
                num_layers: 5,
                batch_size: 64,
            },
            rnd: NetworkSpec {
                input_dim: RND_STATE_WIDTH,
                output_dim: 64,
                hidden_dim: 64,
                num_layers: 5,
                batch_size: 32,
            },
            dqn_optim: AdamParams::default(),
            rnd_optim: AdamParams::default(),
            reward: RewardConfig::default(),
            beta: BetaSchedule::default(),
            log_dir: PathBuf::from("logs"),
            seed: None,
        }
    }
}

impl TrainerConfig {
    /// Overlay the dimensions, buffer capacity, and optimizer sets from the
    /// two parsed parameter files
    pub fn with_params(mut self, rl: &RlSystemParams, nn: &NnSystemParams) -> Self {
        self.dqn = rl.dqn;
        self.rnd = rl.rnd;
        self.buffer_capacity = rl.replay_buffer_capacity;
        self.dqn_optim = nn.dqn;
        self.rnd_optim = nn.rnd;
        self
    }
}

/// Tick-driven trainer for the survival agent
///
/// Owns the four networks (through the registry), both replay buffers, the
/// reward engine, the running novelty statistics, and the step counters.
/// The game loop drives it with one [`observe`](Self::observe) call per
/// tick; everything else is internal cadence.
#[derive(Debug)]
pub struct Trainer {
    registry: NetworkRegistry,
    online: NetworkHandle,
    target: NetworkHandle,
    predictor: NetworkHandle,
    rnd_target: NetworkHandle,

    replay: ReplayMemory,
    rnd_replay: RndReplayBuffer,

    reward_engine: RewardEngine,
    stats: RunningStats,

    discount: f64,
    dqn: NetworkSpec,
    rnd: NetworkSpec,
    rnd_enabled: bool,

    learn_counter: u64,
    rnd_counter: u64,
    target_sync_counter: u64,

    rng: StdRng,
}

impl Trainer {
    /// Build the trainer: load or initialize all four networks and wire up
    /// the buffers and reward engine
    ///
    /// The DQN online network is loaded from `model_dir` when that
    /// directory exists and freshly initialized otherwise; likewise the
    /// novelty pair from `model_dir/predictor` and `model_dir/target`. A
    /// missing novelty target is initialized and then re-rolled uniformly
    /// so its embedding is independent of the predictor's starting point.
    /// Any failed load aborts construction.
    pub fn new(config: TrainerConfig) -> Result<Self, BuildError> {
        crate::assert_interval!(config.discount, 0.0, 1.0);
        assert_eq!(
            config.dqn.input_dim, DQN_STATE_WIDTH,
            "configured DQN input dim does not match the state encoding"
        );
        assert_eq!(
            config.rnd.input_dim, RND_STATE_WIDTH,
            "configured RND input dim does not match the state encoding"
        );

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut registry = NetworkRegistry::new();

        let mut online_net = if config.model_dir.is_dir() {
            nn::io::load_model(&config.model_dir, Role::DqnOnline, &config.dqn_optim, &mut rng)?
        } else {
            std::fs::create_dir_all(&config.model_dir).map_err(|source| BuildError::Io {
                path: config.model_dir.clone(),
                source,
            })?;
            info!("initializing fresh DQN online network");
            Network::new(config.dqn, Role::DqnOnline, &config.dqn_optim, &mut rng)
        };
        online_net
            .attach_loss_log(&config.log_dir)
            .map_err(|source| BuildError::Io {
                path: config.log_dir.clone(),
                source,
            })?;

        let mut target_net = Network::new(config.dqn, Role::DqnTarget, &config.dqn_optim, &mut rng);
        target_net.hard_update_from(&online_net);

        let predictor_dir = config.model_dir.join("predictor");
        let mut predictor_net = if predictor_dir.is_dir() {
            nn::io::load_model(&predictor_dir, Role::RndPredictor, &config.rnd_optim, &mut rng)?
        } else {
            info!("initializing fresh RND predictor network");
            Network::new(config.rnd, Role::RndPredictor, &config.rnd_optim, &mut rng)
        };
        predictor_net
            .attach_loss_log(&config.log_dir)
            .map_err(|source| BuildError::Io {
                path: config.log_dir.clone(),
                source,
            })?;

        let rnd_target_dir = config.model_dir.join("target");
        let rnd_target_net = if rnd_target_dir.is_dir() {
            nn::io::load_model(&rnd_target_dir, Role::RndTarget, &config.rnd_optim, &mut rng)?
        } else {
            info!("initializing fresh RND target network");
            let mut net = Network::new(config.rnd, Role::RndTarget, &config.rnd_optim, &mut rng);
            net.randomize_weights(&mut rng);
            net
        };

        let online = registry.insert(online_net);
        let target = registry.insert(target_net);
        let predictor = registry.insert(predictor_net);
        let rnd_target = registry.insert(rnd_target_net);

        let reward_engine =
            RewardEngine::new(config.reward, config.beta, predictor, rnd_target);

        Ok(Self {
            registry,
            online,
            target,
            predictor,
            rnd_target,
            replay: ReplayMemory::new(config.buffer_capacity),
            rnd_replay: RndReplayBuffer::new(config.buffer_capacity, config.rnd.input_dim),
            reward_engine,
            stats: RunningStats::new(),
            discount: config.discount,
            dqn: config.dqn,
            rnd: config.rnd,
            rnd_enabled: config.rnd_enabled,
            learn_counter: 0,
            rnd_counter: 0,
            target_sync_counter: 0,
            rng,
        })
    }

    /// Record one environment tick and run whatever training is due
    ///
    /// Enqueues the transition (and, with the novelty subsystem enabled,
    /// the encoded next state), hard-syncs the target network every 1000
    /// ticks, runs a DQN step every 4 ticks once the buffer covers a
    /// batch, and a predictor step every 100 ticks.
    #[allow(clippy::too_many_arguments)]
    pub fn observe(
        &mut self,
        prev_state: State,
        action: Direction,
        reward: f64,
        next_state: State,
        done: bool,
        food_rates: &[f64],
        sector: u32,
    ) {
        self.replay.push(Transition {
            state: prev_state,
            action,
            reward,
            next_state,
            done,
        });

        if self.rnd_enabled {
            self.rnd_replay
                .push(encode_rnd(&next_state, food_rates, sector));
        }

        self.target_sync_counter += 1;
        if self.target_sync_counter % TARGET_SYNC_INTERVAL == 0 {
            self.update_target();
        }

        self.learn_counter += 1;
        if self.learn_counter >= LEARN_INTERVAL && self.replay.len() >= self.dqn.batch_size {
            self.learn_from_batch();
            self.learn_counter = 0;
        }

        if self.rnd_enabled {
            self.rnd_counter += 1;
            if self.rnd_counter >= RND_LEARN_INTERVAL && self.rnd_replay.len() >= self.rnd.batch_size
            {
                self.rnd_learn_from_batch();
                self.rnd_counter = 0;
            }
        }
    }

    /// Shape the reward for the current tick (see
    /// [`RewardEngine::compute`])
    #[allow(clippy::too_many_arguments)]
    pub fn compute_reward(
        &mut self,
        state: &State,
        action: Direction,
        food_rates: &[f64],
        sector: u32,
        hit_wall: bool,
        org_x: i32,
        org_y: i32,
        dir: Direction,
        wall_pos_x: i32,
        wall_pos_y: i32,
    ) -> f64 {
        self.reward_engine.compute(
            &mut self.registry,
            &mut self.stats,
            state,
            action,
            food_rates,
            sector,
            self.rnd_enabled,
            hit_wall,
            org_x,
            org_y,
            dir,
            wall_pos_x,
            wall_pos_y,
        )
    }

    /// Hard-copy the online network into the target network
    pub fn update_target(&mut self) {
        debug!("hard-syncing target network");
        let (online, target) = self.registry.get_pair_mut(self.online, self.target);
        let online = online.expect("online network is registered");
        target
            .expect("target network is registered")
            .hard_update_from(online);
    }

    /// Persist the online network to `base_dir` and the novelty pair to
    /// `base_dir/predictor` and `base_dir/target`
    ///
    /// A failure here is survivable mid-episode; the caller can retry on
    /// the next save point.
    pub fn save_models(&self, base_dir: &Path) -> Result<(), ModelIoError> {
        self.network(self.online).save(base_dir)?;
        self.network(self.predictor).save(&base_dir.join("predictor"))?;
        self.network(self.rnd_target).save(&base_dir.join("target"))?;
        Ok(())
    }

    pub fn online_handle(&self) -> NetworkHandle {
        self.online
    }

    pub fn registry_mut(&mut self) -> &mut NetworkRegistry {
        &mut self.registry
    }

    pub fn replay(&self) -> &ReplayMemory {
        &self.replay
    }

    pub fn stats(&self) -> &RunningStats {
        &self.stats
    }

    fn network(&self, handle: NetworkHandle) -> &Network {
        self.registry.get(handle).expect("network is registered")
    }

    /// One DQN optimization step over a sampled minibatch
    fn learn_from_batch(&mut self) {
        let batch_size = self.dqn.batch_size;
        let Some(batch) = self.replay.sample_zipped(batch_size, &mut self.rng) else {
            return;
        };

        let states = encode_states(&batch.states, self.dqn.input_dim);
        let next_states = encode_states(&batch.next_states, self.dqn.input_dim);

        let q_next = self
            .registry
            .get_mut(self.target)
            .expect("target network is registered")
            .predict(&next_states, batch_size)
            .unwrap_or_else(|e| nn::fail_loud(e));
        let online = self
            .registry
            .get_mut(self.online)
            .expect("online network is registered");
        let q_cur = online
            .predict(&states, batch_size)
            .unwrap_or_else(|e| nn::fail_loud(e));

        let targets = bootstrap_targets(
            &q_cur,
            &q_next,
            &batch,
            self.dqn.output_dim,
            self.discount,
        );

        let loss = online
            .train(&states, &targets)
            .unwrap_or_else(|e| nn::fail_loud(e));
        debug!("dqn step loss {}", loss);
    }

    /// One predictor optimization step toward the frozen random target
    fn rnd_learn_from_batch(&mut self) {
        let batch_size = self.rnd.batch_size;
        let Some(inputs) = self.rnd_replay.get_batch(batch_size, &mut self.rng) else {
            return;
        };

        let targets = self
            .registry
            .get_mut(self.rnd_target)
            .expect("novelty target network is registered")
            .predict(&inputs, batch_size)
            .unwrap_or_else(|e| nn::fail_loud(e));

        let loss = self
            .registry
            .get_mut(self.predictor)
            .expect("predictor network is registered")
            .train(&inputs, &targets)
            .unwrap_or_else(|e| nn::fail_loud(e));
        debug!("rnd predictor step loss {}", loss);
    }
}

/// Flatten states into a column-major `[input_dim, batch]` block
fn encode_states(states: &[State], input_dim: usize) -> Vec<f64> {
    let mut block = Vec::with_capacity(states.len() * input_dim);
    for state in states {
        let encoded = encode_dqn(state);
        assert_eq!(
            encoded.len(),
            input_dim,
            "state encoding width does not match the configured input dim"
        );
        block.extend(encoded);
    }
    block
}

/// Bellman targets for a minibatch
///
/// Column `i` copies the online prediction everywhere except row
/// `action[i]`, which gets `r + (1 - done) * gamma * max_a q_next`; the
/// loss over non-taken actions is therefore zero.
fn bootstrap_targets(
    q_cur: &[f64],
    q_next: &[f64],
    batch: &TransitionBatch,
    output_dim: usize,
    discount: f64,
) -> Vec<f64> {
    let mut targets = q_cur.to_vec();
    for i in 0..batch.len() {
        let column = &q_next[i * output_dim..(i + 1) * output_dim];
        let best_next = column.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let done = batch.dones[i] as u8 as f64;
        let row = batch.actions[i].index();
        targets[i * output_dim + row] = batch.rewards[i] + (1.0 - done) * discount * best_next;
    }
    targets
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn test_config(root: &Path) -> TrainerConfig {
        TrainerConfig {
            model_dir: root.join("models"),
            log_dir: root.join("logs"),
            buffer_capacity: 16,
            dqn: NetworkSpec {
                input_dim: DQN_STATE_WIDTH,
                output_dim: 4,
                hidden_dim: 8,
                num_layers: 3,
                batch_size: 4,
            },
            rnd: NetworkSpec {
                input_dim: RND_STATE_WIDTH,
                output_dim: 8,
                hidden_dim: 8,
                num_layers: 3,
                batch_size: 4,
            },
            seed: Some(42),
            ..TrainerConfig::default()
        }
    }

    fn state(energy: f64) -> State {
        State {
            energy_lvl: energy,
            ..State::default()
        }
    }

    #[test]
    fn fresh_construction_creates_the_model_dir() {
        let root = tempdir().unwrap();
        let config = test_config(root.path());
        let model_dir = config.model_dir.clone();

        let _trainer = Trainer::new(config).unwrap();
        assert!(model_dir.is_dir());
    }

    #[test]
    fn freshly_synced_target_predicts_like_online() {
        let root = tempdir().unwrap();
        let mut trainer = Trainer::new(test_config(root.path())).unwrap();

        let input: Vec<f64> = (0..DQN_STATE_WIDTH * 3).map(|i| i as f64 * 0.1).collect();
        let online = trainer.online;
        let target = trainer.target;

        let a = trainer
            .registry
            .get_mut(online)
            .unwrap()
            .predict(&input, 3)
            .unwrap();
        let b = trainer
            .registry
            .get_mut(target)
            .unwrap()
            .predict(&input, 3)
            .unwrap();
        let max_diff = a
            .iter()
            .zip(&b)
            .map(|(x, y)| (x - y).abs())
            .fold(0.0_f64, f64::max);
        assert_eq!(max_diff, 0.0);
    }

    #[test]
    fn observe_with_short_buffer_never_panics() {
        let root = tempdir().unwrap();
        let config = TrainerConfig {
            dqn: NetworkSpec {
                batch_size: 64,
                ..test_config(root.path()).dqn
            },
            ..test_config(root.path())
        };
        let mut trainer = Trainer::new(config).unwrap();

        for i in 0..10 {
            trainer.observe(
                state(1.0),
                Direction::Up,
                0.5,
                state(0.9),
                false,
                &[0.0; 9],
                (i % 9) as u32,
            );
        }
        assert_eq!(trainer.replay().len(), 10);
    }

    #[test]
    fn observe_trains_once_the_buffer_covers_a_batch() {
        let root = tempdir().unwrap();
        let mut trainer = Trainer::new(test_config(root.path())).unwrap();

        for _ in 0..8 {
            trainer.observe(
                state(1.0),
                Direction::Left,
                1.0,
                state(0.8),
                false,
                &[0.1; 9],
                3,
            );
        }
        // The online loss log records one line per training step.
        let log = std::fs::read_to_string(root.path().join("logs/online_system.log")).unwrap();
        assert!(log.lines().count() >= 1, "at least one DQN step ran");
    }

    #[test]
    fn terminal_transitions_bootstrap_to_the_raw_reward() {
        let batch = TransitionBatch {
            states: vec![State::default(); 2],
            actions: vec![Direction::Down, Direction::Right],
            rewards: vec![1.5, -2.0],
            next_states: vec![State::default(); 2],
            dones: vec![true, true],
        };
        let q_cur: Vec<f64> = (0..8).map(|i| i as f64).collect();
        let q_next = vec![9.0; 8];

        let targets = bootstrap_targets(&q_cur, &q_next, &batch, 4, 0.9);

        for i in 0..2 {
            let row = batch.actions[i].index();
            for j in 0..4 {
                let expected = if j == row {
                    batch.rewards[i]
                } else {
                    q_cur[i * 4 + j]
                };
                assert_eq!(targets[i * 4 + j], expected);
            }
        }
    }

    #[test]
    fn live_transitions_bootstrap_off_the_best_next_action() {
        let batch = TransitionBatch {
            states: vec![State::default()],
            actions: vec![Direction::Up],
            rewards: vec![1.0],
            next_states: vec![State::default()],
            dones: vec![false],
        };
        let q_cur = vec![0.0; 4];
        let q_next = vec![0.5, 3.0, -1.0, 2.0];

        let targets = bootstrap_targets(&q_cur, &q_next, &batch, 4, 0.9);
        assert_eq!(targets[0], 1.0 + 0.9 * 3.0);
        assert_eq!(&targets[1..], &q_cur[1..]);
    }

    #[test]
    fn save_models_lays_out_the_directory_tree() {
        let root = tempdir().unwrap();
        let trainer = Trainer::new(test_config(root.path())).unwrap();

        let out = root.path().join("saved");
        trainer.save_models(&out).unwrap();

        assert!(out.join("nn_info.bin").is_file());
        assert!(out.join("predictor/nn_info.bin").is_file());
        assert!(out.join("target/nn_info.bin").is_file());
    }

    #[test]
    fn saved_models_reload_on_the_next_construction() {
        let root = tempdir().unwrap();
        let config = test_config(root.path());
        let saved = root.path().join("warm");

        let probe: Vec<f64> = (0..DQN_STATE_WIDTH).map(|i| i as f64 * 0.2).collect();
        let before = {
            let mut trainer = Trainer::new(config.clone()).unwrap();
            trainer.save_models(&saved).unwrap();
            let online = trainer.online;
            trainer
                .registry
                .get_mut(online)
                .unwrap()
                .predict(&probe, 1)
                .unwrap()
        };

        let config = TrainerConfig {
            model_dir: saved,
            ..config
        };
        let mut warm = Trainer::new(config).unwrap();
        let online = warm.online;
        let after = warm
            .registry
            .get_mut(online)
            .unwrap()
            .predict(&probe, 1)
            .unwrap();

        assert_eq!(before, after, "reloaded online network predicts identically");
    }

    #[test]
    fn compute_reward_without_rnd_is_pure_shaping() {
        let root = tempdir().unwrap();
        let config = TrainerConfig {
            rnd_enabled: false,
            ..test_config(root.path())
        };
        let mut trainer = Trainer::new(config).unwrap();

        let s = State {
            energy_lvl: 1.0,
            ..State::default()
        };
        let total = trainer.compute_reward(
            &s,
            Direction::Up,
            &[],
            0,
            true,
            0,
            0,
            Direction::Up,
            -1,
            -1,
        );
        assert_eq!(total, -15.0);
    }
}
