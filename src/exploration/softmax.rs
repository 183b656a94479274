use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::Rng;

use crate::config::BoltzmannSpec;
use crate::decay::{Decay, Step};
use crate::nn::{NetworkHandle, NetworkRegistry};
use crate::state::{Direction, State};

use super::q_values;

/// Softmax exploration policy (also known as Boltzmann exploration) with
/// time-decaying temperature
///
/// High temperatures flatten the action distribution toward uniform; as the
/// temperature decays the policy sharpens toward the greedy action.
#[derive(Debug, Clone, PartialEq)]
pub struct Boltzmann<D: Decay> {
    temperature: D,
}

impl<D: Decay> Boltzmann<D> {
    /// Initialize softmax policy with a temperature decay strategy
    pub fn new(temperature: D) -> Self {
        Self { temperature }
    }

    /// Action-selection probabilities for one state at step `step`
    ///
    /// The maximum Q-value is subtracted before exponentiation to keep the
    /// exponentials bounded.
    pub fn probabilities(&self, q: &[f64], step: u64) -> Vec<f64> {
        let temp = self.temperature.evaluate(step as f64).max(f64::MIN_POSITIVE);
        let max_q = q.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = q.iter().map(|&v| ((v - max_q) / temp).exp()).collect();
        let sum: f64 = exps.iter().sum();
        exps.into_iter().map(|e| e / sum).collect()
    }

    /// Sample an action from the softmax distribution over Q-values
    pub fn select_action(
        &self,
        registry: &mut NetworkRegistry,
        handle: NetworkHandle,
        state: &State,
        step: u64,
        rng: &mut impl Rng,
    ) -> Direction {
        let q = q_values(registry, handle, state);
        let probs = self.probabilities(&q, step);
        let dist = WeightedIndex::new(&probs).expect("softmax weights are positive");
        Direction::from_index(dist.sample(rng)).expect("network output covers the action space")
    }
}

impl Boltzmann<Step> {
    /// Build the policy from its configuration block: the temperature is
    /// multiplied by `decay_rate` every `decay_interval` steps and floored
    /// at `min_temp`
    pub fn from_spec(spec: &BoltzmannSpec) -> Result<Self, String> {
        let step = Step::new(
            spec.decay_rate,
            spec.initial_temp,
            spec.min_temp,
            spec.decay_interval,
        )?;
        Ok(Self::new(step))
    }
}
