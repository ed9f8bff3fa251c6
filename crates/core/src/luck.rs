//! Deterministic per-key rolls and the cell generator built on them.
//!
//! A roll depends only on its string key and the world seed, so a cell that
//! was never observed regenerates identically in every session.

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::types::{CellCoord, CellState, Token};

/// Reproducible float in `[0, 1)` for `key` in the default world.
pub fn luck(key: &str) -> f64 {
    seeded_luck(key, 0)
}

/// Reproducible float in `[0, 1)` for `key` in the world salted by `world_seed`.
pub fn seeded_luck(key: &str, world_seed: u64) -> f64 {
    // 53 high bits fill an f64 mantissa exactly.
    let bits = xxh3_64_with_seed(key.as_bytes(), world_seed) >> 11;
    bits as f64 / (1_u64 << 53) as f64
}

/// One step of the value table: rolls strictly below `below` produce `value`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueTier {
    pub below: f64,
    pub value: u32,
}

pub fn default_value_tiers() -> Vec<ValueTier> {
    vec![
        ValueTier { below: 0.01, value: 8 },
        ValueTier { below: 0.05, value: 4 },
        ValueTier { below: 0.25, value: 2 },
    ]
}

/// Rolls the initial state of never-seen cells.
#[derive(Clone, Debug, PartialEq)]
pub struct CellGenerator {
    world_seed: u64,
    token_probability: f64,
    value_tiers: Vec<ValueTier>,
    base_value: Token,
}

impl CellGenerator {
    /// Tier values that are not powers of two are skipped; `GameConfig::validate`
    /// reports them before a generator is ever built from configuration.
    pub fn new(
        world_seed: u64,
        token_probability: f64,
        value_tiers: Vec<ValueTier>,
        base_value: Token,
    ) -> Self {
        let value_tiers =
            value_tiers.into_iter().filter(|tier| tier.value.is_power_of_two()).collect();
        Self { world_seed, token_probability, value_tiers, base_value }
    }

    pub fn world_seed(&self) -> u64 {
        self.world_seed
    }

    pub fn with_world_seed(mut self, world_seed: u64) -> Self {
        self.world_seed = world_seed;
        self
    }

    pub fn roll(&self, coord: CellCoord) -> CellState {
        let has_token = seeded_luck(&format!("token-{coord}"), self.world_seed)
            < self.token_probability;
        CellState { has_token, value: self.initial_value(coord).value() }
    }

    fn initial_value(&self, coord: CellCoord) -> Token {
        let roll = seeded_luck(&format!("value-{coord}"), self.world_seed);
        self.value_tiers
            .iter()
            .find(|tier| roll < tier.below)
            .and_then(|tier| Token::new(tier.value))
            .unwrap_or(self.base_value)
    }
}

impl Default for CellGenerator {
    fn default() -> Self {
        Self::new(0, 0.5, default_value_tiers(), Token::ONE)
    }
}
