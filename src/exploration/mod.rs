use crate::nn::{NetworkHandle, NetworkRegistry};
use crate::state::{encode_dqn, Direction, State};

mod epsilon_greedy;
mod softmax;

pub use epsilon_greedy::EpsilonGreedy;
pub use softmax::Boltzmann;

/// Exploration policy result
pub enum Choice {
    Explore,
    Exploit,
}

/// Q-values of every action for one state, via a registry handle
pub(crate) fn q_values(
    registry: &mut NetworkRegistry,
    handle: NetworkHandle,
    state: &State,
) -> Vec<f64> {
    let network = registry
        .get_mut(handle)
        .expect("policy network is registered");
    let encoded = encode_dqn(state);
    assert_eq!(
        encoded.len(),
        network.spec().input_dim,
        "state encoding width does not match the policy network"
    );
    network
        .predict(&encoded, 1)
        .unwrap_or_else(|e| crate::nn::fail_loud(e))
}

/// The action with the highest Q-value
pub fn greedy_action(
    registry: &mut NetworkRegistry,
    handle: NetworkHandle,
    state: &State,
) -> Direction {
    let q = q_values(registry, handle, state);
    let mut best = 0;
    for (i, &value) in q.iter().enumerate() {
        if value > q[best] {
            best = i;
        }
    }
    Direction::from_index(best).expect("network output covers the action space")
}
