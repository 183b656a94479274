use crate::state::{Direction, State};

/// A single experience in the environment
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// The state of the environment before taking the action
    pub state: State,
    /// The action taken in the given state
    pub action: Direction,
    /// The shaped reward received after taking the action
    pub reward: f64,
    /// The state of the environment after the action is taken
    pub next_state: State,
    /// Whether the episode ended on this step
    pub done: bool,
}

/// A zipped batch of [transitions](Transition)
#[derive(Debug, Clone)]
pub struct TransitionBatch {
    pub states: Vec<State>,
    pub actions: Vec<Direction>,
    pub rewards: Vec<f64>,
    pub next_states: Vec<State>,
    pub dones: Vec<bool>,
}

impl TransitionBatch {
    /// Construct a `TransitionBatch` from an iterator of transitions and a
    /// specified batch size
    pub fn from_iter(iter: impl IntoIterator<Item = Transition>, batch_size: usize) -> Self {
        let batch = Self {
            states: Vec::with_capacity(batch_size),
            actions: Vec::with_capacity(batch_size),
            rewards: Vec::with_capacity(batch_size),
            next_states: Vec::with_capacity(batch_size),
            dones: Vec::with_capacity(batch_size),
        };

        iter.into_iter().fold(batch, |mut b, t| {
            b.states.push(t.state);
            b.actions.push(t.action);
            b.rewards.push(t.reward);
            b.next_states.push(t.next_state);
            b.dones.push(t.done);
            b
        })
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
