mod replay;
mod rnd;
mod transition;

pub use replay::ReplayMemory;
pub use rnd::RndReplayBuffer;
pub use transition::{Transition, TransitionBatch};
