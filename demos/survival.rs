//! Scripted stand-in for the grid world: drives the trainer tick-by-tick
//! with synthetic organism states and prints a short progress report.
//!
//! ```sh
//! cargo run --example survival
//! ```

use rand::{rngs::StdRng, Rng, SeedableRng};

use survival_rl::algo::{Trainer, TrainerConfig};
use survival_rl::decay;
use survival_rl::exploration::EpsilonGreedy;
use survival_rl::state::{Direction, State, NUM_SECTORS};

const TICKS: u32 = 5_000;
const REPORT_EVERY: u32 = 1_000;

/// A toy organism wandering a 3x3-sector world
struct ToyWorld {
    rng: StdRng,
    energy: f64,
    sector: u32,
    food_eaten: [f64; NUM_SECTORS],
    ticks: f64,
}

impl ToyWorld {
    fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            energy: 1.0,
            sector: 4,
            food_eaten: [0.0; NUM_SECTORS],
            ticks: 0.0,
        }
    }

    fn state(&mut self) -> State {
        State {
            gender: 0,
            vision_depth: 5,
            speed: 1,
            size: 2,
            energy_lvl: self.energy,
            food_count_in_vision: self.rng.gen_range(0..3),
            wall_in_vision: self.rng.gen_bool(0.2),
            is_eating: false,
        }
    }

    /// Advance one tick; returns (next_state, hit_wall, done)
    fn step(&mut self, action: Direction) -> (State, bool, bool) {
        self.ticks += 1.0;
        self.sector = match action {
            Direction::Up if self.sector >= 3 => self.sector - 3,
            Direction::Down if self.sector < 6 => self.sector + 3,
            Direction::Left if self.sector % 3 != 0 => self.sector - 1,
            Direction::Right if self.sector % 3 != 2 => self.sector + 1,
            _ => self.sector,
        };

        let hit_wall = self.rng.gen_bool(0.1);
        let ate = self.rng.gen_bool(0.3);
        if ate {
            self.food_eaten[self.sector as usize] += 1.0;
            self.energy = (self.energy + 0.2).min(1.0);
        } else {
            self.energy = (self.energy - 0.02).max(0.0);
        }

        let mut next = self.state();
        next.is_eating = ate;
        let done = self.energy <= 0.0;
        if done {
            self.energy = 1.0;
        }
        (next, hit_wall, done)
    }

    fn food_rates(&self) -> Vec<f64> {
        let elapsed = self.ticks.max(1.0);
        self.food_eaten.iter().map(|&n| n / elapsed).collect()
    }
}

fn main() {
    let config = TrainerConfig {
        seed: Some(7),
        ..TrainerConfig::default()
    };
    let mut trainer = Trainer::new(config).expect("trainer construction");
    let policy = EpsilonGreedy::new(
        decay::Exponential::new(1e-3, 1.0, 0.05).expect("valid decay"),
    );

    let mut world = ToyWorld::new(11);
    let mut action_rng = StdRng::seed_from_u64(13);
    let mut episode_reward = 0.0;

    let online = trainer.online_handle();
    for tick in 0..TICKS {
        let state = world.state();
        let action = policy.select_action(
            trainer.registry_mut(),
            online,
            &state,
            tick as u64,
            &mut action_rng,
        );

        let (next_state, hit_wall, done) = world.step(action);
        let food_rates = world.food_rates();
        let reward = trainer.compute_reward(
            &next_state,
            action,
            &food_rates,
            world.sector,
            hit_wall,
            0,
            0,
            action,
            -1,
            -1,
        );
        episode_reward += reward;

        trainer.observe(state, action, reward, next_state, done, &food_rates, world.sector);

        if (tick + 1) % REPORT_EVERY == 0 {
            println!(
                "tick {:>5}  buffer {:>4}  novelty samples {:>5}  reward since last report {:>10.2}",
                tick + 1,
                trainer.replay().len(),
                trainer.stats().n(),
                episode_reward,
            );
            episode_reward = 0.0;
        }
    }

    trainer
        .save_models("models".as_ref())
        .expect("model save");
    println!("saved models to ./models");
}
