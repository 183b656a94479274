mod dqn;

pub use dqn::{BuildError, Trainer, TrainerConfig};
