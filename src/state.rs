/// Number of cells in the 3x3 world partition
pub const NUM_SECTORS: usize = 9;

/// Width of the DQN input encoding
pub const DQN_STATE_WIDTH: usize = 8;

/// Width of the novelty-network input encoding
pub const RND_STATE_WIDTH: usize = 2 + NUM_SECTORS;

/// Discrete movement action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up = 0,
    Down = 1,
    Left = 2,
    Right = 3,
}

impl Direction {
    pub const VARIANTS: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Action index, matching the Q-value row it owns
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Direction> {
        Self::VARIANTS.get(index).copied()
    }
}

/// The organism scalars that cross into the learning core
///
/// Everything the networks see is derived from this record; positions,
/// sprites, and raw vision rays stay on the game side of the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct State {
    /// 0 or 1
    pub gender: u8,
    pub vision_depth: u32,
    pub speed: u32,
    pub size: u32,
    pub energy_lvl: f64,
    pub food_count_in_vision: i32,
    pub wall_in_vision: bool,
    pub is_eating: bool,
}

/// Encode a state for the Q networks
///
/// Layout: gender, vision depth, speed, size, energy level, visible food
/// count, wall flag, eating flag.
pub fn encode_dqn(state: &State) -> Vec<f64> {
    vec![
        state.gender as f64,
        state.vision_depth as f64,
        state.speed as f64,
        state.size as f64,
        state.energy_lvl,
        state.food_count_in_vision as f64,
        state.wall_in_vision as u8 as f64,
        state.is_eating as u8 as f64,
    ]
}

/// Encode a state for the novelty networks
///
/// Layout: the organism's sector in the 3x3 world partition, energy level,
/// then one food-consumption rate per sector.
///
/// **Panics** if `food_rates` does not cover all [`NUM_SECTORS`] sectors or
/// `sector` is out of range
pub fn encode_rnd(state: &State, food_rates: &[f64], sector: u32) -> Vec<f64> {
    assert_eq!(
        food_rates.len(),
        NUM_SECTORS,
        "expected one food rate per sector"
    );
    assert!(
        (sector as usize) < NUM_SECTORS,
        "sector {} outside the 3x3 partition",
        sector
    );

    let mut encoded = Vec::with_capacity(RND_STATE_WIDTH);
    encoded.push(sector as f64);
    encoded.push(state.energy_lvl);
    encoded.extend_from_slice(food_rates);
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_indices_are_stable() {
        assert_eq!(Direction::Up.index(), 0);
        assert_eq!(Direction::Down.index(), 1);
        assert_eq!(Direction::Left.index(), 2);
        assert_eq!(Direction::Right.index(), 3);

        for dir in Direction::VARIANTS {
            assert_eq!(Direction::from_index(dir.index()), Some(dir));
        }
        assert_eq!(Direction::from_index(4), None);
    }

    #[test]
    fn dqn_encoding_has_the_configured_width() {
        let state = State {
            gender: 1,
            vision_depth: 5,
            speed: 2,
            size: 3,
            energy_lvl: 0.75,
            food_count_in_vision: 2,
            wall_in_vision: true,
            is_eating: false,
        };

        let encoded = encode_dqn(&state);
        assert_eq!(encoded.len(), DQN_STATE_WIDTH);
        assert_eq!(encoded, [1.0, 5.0, 2.0, 3.0, 0.75, 2.0, 1.0, 0.0]);
    }

    #[test]
    fn rnd_encoding_has_the_configured_width() {
        let rates = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];
        let state = State {
            energy_lvl: 0.5,
            ..State::default()
        };

        let encoded = encode_rnd(&state, &rates, 4);
        assert_eq!(encoded.len(), RND_STATE_WIDTH);
        assert_eq!(encoded[0], 4.0);
        assert_eq!(encoded[1], 0.5);
        assert_eq!(&encoded[2..], &rates);
    }

    #[test]
    #[should_panic]
    fn rnd_encoding_rejects_short_rate_vectors() {
        encode_rnd(&State::default(), &[0.0; 4], 0);
    }
}
