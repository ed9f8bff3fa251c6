//! Tunable game parameters. Every field has a default, so a partial config
//! file only overrides what it names.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grid::{LatLng, Tiling};
use crate::luck::{CellGenerator, ValueTier, default_value_tiers};
use crate::types::Token;

pub const DEFAULT_SAVE_KEY: &str = "geomerge-save";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid config field `{field}`: {reason}")]
pub struct ConfigError {
    pub field: &'static str,
    pub reason: String,
}

impl ConfigError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self { field, reason: reason.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Side of one cell, in degrees of latitude/longitude.
    pub tile_degrees: f64,
    /// Where a fresh player starts.
    pub origin: LatLng,
    /// Chebyshev radius, in cells, inside which clicks are accepted.
    pub interaction_radius: u32,
    /// Held value that shows the win banner.
    pub win_value: u32,
    /// Extra cells materialized on every side of the visible region.
    pub viewport_margin: u32,
    /// Initial visible region, in cells on each side of the player.
    pub view_half_width_cells: u32,
    pub view_half_height_cells: u32,
    /// When set, the view is always this Chebyshev radius around the player
    /// and host-reported map bounds are ignored.
    pub fixed_view_radius: Option<u32>,
    pub token_probability: f64,
    pub value_tiers: Vec<ValueTier>,
    pub base_value: u32,
    pub world_seed: u64,
    pub save_key: String,
    /// Upper bound on cells one recompute may materialize.
    pub max_rendered_cells: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tile_degrees: 1e-4,
            origin: LatLng::new(36.997936938057016, -122.05703507501151),
            interaction_radius: 3,
            win_value: 16,
            viewport_margin: 1,
            view_half_width_cells: 20,
            view_half_height_cells: 10,
            fixed_view_radius: None,
            token_probability: 0.5,
            value_tiers: default_value_tiers(),
            base_value: 1,
            world_seed: 0,
            save_key: DEFAULT_SAVE_KEY.to_string(),
            max_rendered_cells: 10_000,
        }
    }
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tile_degrees.is_finite() && self.tile_degrees > 0.0) {
            return Err(ConfigError::new("tile_degrees", "must be a positive finite number"));
        }
        if !(self.origin.lat.is_finite() && self.origin.lng.is_finite()) {
            return Err(ConfigError::new("origin", "latitude and longitude must be finite"));
        }
        if self.win_value == 0 {
            return Err(ConfigError::new("win_value", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.token_probability) {
            return Err(ConfigError::new("token_probability", "must lie in [0, 1]"));
        }
        if !self.base_value.is_power_of_two() {
            return Err(ConfigError::new(
                "base_value",
                format!("{} is not a power of two", self.base_value),
            ));
        }
        let mut previous = 0.0;
        for tier in &self.value_tiers {
            if !tier.value.is_power_of_two() {
                return Err(ConfigError::new(
                    "value_tiers",
                    format!("{} is not a power of two", tier.value),
                ));
            }
            if !(previous..=1.0).contains(&tier.below) {
                return Err(ConfigError::new(
                    "value_tiers",
                    "thresholds must ascend within [0, 1]",
                ));
            }
            previous = tier.below;
        }
        if self.save_key.trim().is_empty() {
            return Err(ConfigError::new("save_key", "must not be empty"));
        }
        if self.max_rendered_cells == 0 {
            return Err(ConfigError::new("max_rendered_cells", "must be at least 1"));
        }
        Ok(())
    }

    pub fn tiling(&self) -> Tiling {
        Tiling::new(self.tile_degrees)
    }

    pub fn generator(&self) -> CellGenerator {
        CellGenerator::new(
            self.world_seed,
            self.token_probability,
            self.value_tiers.clone(),
            Token::new(self.base_value).unwrap_or(Token::ONE),
        )
    }
}
