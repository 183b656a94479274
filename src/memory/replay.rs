use log::warn;
use rand::Rng;

use crate::ds::RingBuffer;

use super::{Transition, TransitionBatch};

/// A fixed-size memory storage for reinforcement learning experiences
///
/// Backed by a ring buffer: once `capacity` transitions are held, every
/// push evicts the oldest one. Minibatches are drawn uniformly with
/// replacement, so a batch may contain duplicates.
#[derive(Debug, Clone)]
pub struct ReplayMemory {
    memory: RingBuffer<Transition>,
}

impl ReplayMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            memory: RingBuffer::new(capacity),
        }
    }

    /// Add a new transition to the memory
    pub fn push(&mut self, transition: Transition) {
        self.memory.push(transition);
    }

    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.memory.capacity()
    }

    /// Iterate stored transitions oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.memory.iter()
    }

    /// Sample a random batch of transitions from the memory
    ///
    /// ### Returns
    /// - `Some(transitions)` if `batch_size` is less than or equal to the buffer length
    /// - `None` otherwise
    pub fn sample(&self, batch_size: usize, rng: &mut impl Rng) -> Option<Vec<Transition>> {
        if batch_size > self.memory.len() {
            warn!(
                "replay sample of {} requested with only {} stored",
                batch_size,
                self.memory.len()
            );
            return None;
        }
        Some(
            (0..batch_size)
                .map(|_| self.memory[rng.gen_range(0..self.memory.len())].clone())
                .collect(),
        )
    }

    /// Sample a random batch and zip it into a [`TransitionBatch`]
    ///
    /// ### Returns
    /// - `Some(batch)` if `batch_size` is less than or equal to the buffer length
    /// - `None` otherwise
    pub fn sample_zipped(
        &self,
        batch_size: usize,
        rng: &mut impl Rng,
    ) -> Option<TransitionBatch> {
        let transitions = self.sample(batch_size, rng)?;
        Some(TransitionBatch::from_iter(transitions, batch_size))
    }
}
