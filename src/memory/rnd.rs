use log::warn;
use rand::Rng;

use crate::ds::RingBuffer;

/// Replay storage for the novelty subsystem's network inputs
///
/// Holds fixed-width encoded observations rather than full transitions;
/// the predictor only ever needs the input vectors. Eviction and sampling
/// semantics match [`ReplayMemory`](super::ReplayMemory).
#[derive(Debug, Clone)]
pub struct RndReplayBuffer {
    memory: RingBuffer<Vec<f64>>,
    input_dim: usize,
}

impl RndReplayBuffer {
    pub fn new(capacity: usize, input_dim: usize) -> Self {
        Self {
            memory: RingBuffer::new(capacity),
            input_dim,
        }
    }

    /// Add an encoded observation
    ///
    /// **Panics** if the vector's width differs from the configured input
    /// dimension
    pub fn push(&mut self, observation: Vec<f64>) {
        assert_eq!(
            observation.len(),
            self.input_dim,
            "observation width {} does not match the configured input dimension {}",
            observation.len(),
            self.input_dim
        );
        self.memory.push(observation);
    }

    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.len() == 0
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Sample `batch_size` observations uniformly with replacement into one
    /// contiguous column-major `[input_dim, batch_size]` block
    ///
    /// ### Returns
    /// - `Some(block)` if `batch_size` is less than or equal to the buffer length
    /// - `None` otherwise
    pub fn get_batch(&self, batch_size: usize, rng: &mut impl Rng) -> Option<Vec<f64>> {
        if batch_size > self.memory.len() {
            warn!(
                "novelty batch of {} requested with only {} stored",
                batch_size,
                self.memory.len()
            );
            return None;
        }

        let mut block = Vec::with_capacity(batch_size * self.input_dim);
        for _ in 0..batch_size {
            let ix = rng.gen_range(0..self.memory.len());
            block.extend_from_slice(&self.memory[ix]);
        }
        Some(block)
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn batch_is_contiguous_and_column_major() {
        let mut buffer = RndReplayBuffer::new(4, 3);
        buffer.push(vec![1.0, 1.0, 1.0]);
        buffer.push(vec![2.0, 2.0, 2.0]);

        let mut rng = StdRng::seed_from_u64(0);
        let block = buffer.get_batch(2, &mut rng).unwrap();
        assert_eq!(block.len(), 6);
        for sample in block.chunks(3) {
            assert!(sample.iter().all(|&v| v == sample[0]), "samples stay whole");
        }
    }

    #[test]
    fn underflow_returns_none() {
        let buffer = RndReplayBuffer::new(4, 2);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(buffer.get_batch(1, &mut rng).is_none());
    }

    #[test]
    #[should_panic]
    fn wrong_width_observation_is_fatal() {
        let mut buffer = RndReplayBuffer::new(4, 3);
        buffer.push(vec![1.0, 2.0]);
    }

    #[test]
    fn eviction_matches_capacity() {
        let mut buffer = RndReplayBuffer::new(2, 1);
        for i in 0..5 {
            buffer.push(vec![i as f64]);
        }
        assert_eq!(buffer.len(), 2);
    }
}
