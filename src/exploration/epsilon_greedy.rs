use rand::Rng;

use crate::decay::Decay;
use crate::nn::{NetworkHandle, NetworkRegistry};
use crate::state::{Direction, State};

use super::{greedy_action, Choice};

/// Epsilon greedy exploration policy with time-decaying epsilon threshold
#[derive(Debug, Clone, PartialEq)]
pub struct EpsilonGreedy<D: Decay> {
    epsilon: D,
}

impl<D: Decay> EpsilonGreedy<D> {
    /// Initialize epsilon greedy policy with a decay strategy
    pub fn new(decay: D) -> Self {
        Self { epsilon: decay }
    }

    /// Invoke epsilon greedy policy for the current step
    pub fn choose(&self, step: u64, rng: &mut impl Rng) -> Choice {
        let epsilon = self.epsilon.evaluate(step as f64);
        if rng.gen::<f64>() > epsilon {
            Choice::Exploit
        } else {
            Choice::Explore
        }
    }

    /// Pick an action: a uniform random direction when exploring, the
    /// highest-valued action of the policy network when exploiting
    pub fn select_action(
        &self,
        registry: &mut NetworkRegistry,
        handle: NetworkHandle,
        state: &State,
        step: u64,
        rng: &mut impl Rng,
    ) -> Direction {
        match self.choose(step, rng) {
            Choice::Explore => {
                Direction::VARIANTS[rng.gen_range(0..Direction::VARIANTS.len())]
            }
            Choice::Exploit => greedy_action(registry, handle, state),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use crate::decay;
    use crate::nn::{optim::AdamParams, Network, NetworkSpec, Role};
    use crate::state::DQN_STATE_WIDTH;

    use super::*;

    #[test]
    fn fully_decayed_epsilon_always_exploits() {
        let policy = EpsilonGreedy::new(decay::Constant::new(0.0));
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..20 {
            assert!(matches!(policy.choose(0, &mut rng), Choice::Exploit));
        }
    }

    #[test]
    fn saturated_epsilon_always_explores() {
        let policy = EpsilonGreedy::new(decay::Constant::new(1.0));
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..20 {
            assert!(matches!(policy.choose(0, &mut rng), Choice::Explore));
        }
    }

    #[test]
    fn exploit_returns_the_argmax_action() {
        let spec = NetworkSpec {
            input_dim: DQN_STATE_WIDTH,
            output_dim: 4,
            hidden_dim: 8,
            num_layers: 3,
            batch_size: 1,
        };
        let mut rng = StdRng::seed_from_u64(1);
        let mut registry = NetworkRegistry::new();
        let handle = registry.insert(Network::new(
            spec,
            Role::DqnOnline,
            &AdamParams::default(),
            &mut rng,
        ));

        let policy = EpsilonGreedy::new(decay::Constant::new(0.0));
        let state = State::default();
        let action = policy.select_action(&mut registry, handle, &state, 0, &mut rng);

        let q = super::super::q_values(&mut registry, handle, &state);
        let best = q
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        assert_eq!(action.index(), best);
    }
}
