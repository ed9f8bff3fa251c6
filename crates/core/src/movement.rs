//! Interchangeable movement sources.
//!
//! The strategies form a closed set. The facade keeps at most one of them
//! live; every input source has exactly one entry point on the facade that
//! forwards to the active strategy, so a stopped strategy can never move the
//! player.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::grid::{LatLng, Tiling};
use crate::types::{CellCoord, Direction};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyName {
    Buttons,
    Geolocation,
}

impl StrategyName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buttons => "buttons",
            Self::Geolocation => "geolocation",
        }
    }
}

impl fmt::Display for StrategyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown movement strategy '{0}' (expected buttons or geolocation)")]
pub struct UnknownStrategy(pub String);

impl FromStr for StrategyName {
    type Err = UnknownStrategy;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "buttons" => Ok(Self::Buttons),
            "geolocation" | "geo" => Ok(Self::Geolocation),
            _ => Err(UnknownStrategy(raw.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("position source unavailable: {reason}")]
pub struct SourceUnavailable {
    pub reason: String,
}

/// Host-side stream of position fixes.
///
/// `clear_watch` must take effect before it returns.
pub trait PositionSource {
    fn watch(&mut self) -> Result<WatchId, SourceUnavailable>;
    fn clear_watch(&mut self, id: WatchId);
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MovementError {
    #[error("movement strategy '{0}' is not registered")]
    Unregistered(StrategyName),
    #[error("movement strategy '{strategy}' could not start: {source}")]
    SourceUnavailable {
        strategy: StrategyName,
        #[source]
        source: SourceUnavailable,
    },
}

/// Discrete steps from four directional inputs.
#[derive(Debug, Default)]
pub struct ButtonMovement {
    live: bool,
}

impl ButtonMovement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self, direction: Direction, current: CellCoord) -> Option<CellCoord> {
        self.live.then(|| current.stepped(direction))
    }
}

/// Relocation to whatever cell the position source reports.
pub struct GeolocationMovement {
    tiling: Tiling,
    source: Box<dyn PositionSource>,
    watch: Option<WatchId>,
}

impl GeolocationMovement {
    pub fn new(tiling: Tiling, source: Box<dyn PositionSource>) -> Self {
        Self { tiling, source, watch: None }
    }

    /// The cell to relocate to, if the fix lands outside the current cell.
    pub fn position(&self, fix: LatLng, current: CellCoord) -> Option<CellCoord> {
        self.watch?;
        if !fix.is_valid() {
            warn!(lat = fix.lat, lng = fix.lng, "position_fix_rejected");
            return None;
        }
        let cell = self.tiling.cell_at(fix);
        (cell != current).then_some(cell)
    }
}

pub enum MovementStrategy {
    Buttons(ButtonMovement),
    Geolocation(GeolocationMovement),
}

impl MovementStrategy {
    pub fn name(&self) -> StrategyName {
        match self {
            Self::Buttons(_) => StrategyName::Buttons,
            Self::Geolocation(_) => StrategyName::Geolocation,
        }
    }

    pub fn is_live(&self) -> bool {
        match self {
            Self::Buttons(buttons) => buttons.live,
            Self::Geolocation(geo) => geo.watch.is_some(),
        }
    }

    pub fn start(&mut self) -> Result<(), SourceUnavailable> {
        match self {
            Self::Buttons(buttons) => buttons.live = true,
            Self::Geolocation(geo) => {
                if geo.watch.is_none() {
                    geo.watch = Some(geo.source.watch()?);
                }
            }
        }
        Ok(())
    }

    pub fn stop(&mut self) {
        match self {
            Self::Buttons(buttons) => buttons.live = false,
            Self::Geolocation(geo) => {
                if let Some(id) = geo.watch.take() {
                    geo.source.clear_watch(id);
                }
            }
        }
    }
}

impl From<ButtonMovement> for MovementStrategy {
    fn from(buttons: ButtonMovement) -> Self {
        Self::Buttons(buttons)
    }
}

impl From<GeolocationMovement> for MovementStrategy {
    fn from(geo: GeolocationMovement) -> Self {
        Self::Geolocation(geo)
    }
}

/// Registry of strategies with at most one active.
#[derive(Default)]
pub struct MovementFacade {
    strategies: BTreeMap<StrategyName, MovementStrategy>,
    active: Option<StrategyName>,
}

impl MovementFacade {
    pub fn new() -> Self {
        Self::default()
    }

    /// Facade with only the button strategy registered.
    pub fn with_buttons() -> Self {
        let mut facade = Self::new();
        facade.register(ButtonMovement::new());
        facade
    }

    /// Register a strategy, replacing (and stopping) any previous one of the same kind.
    pub fn register(&mut self, strategy: impl Into<MovementStrategy>) {
        let strategy = strategy.into();
        let name = strategy.name();
        if let Some(mut previous) = self.strategies.insert(name, strategy) {
            previous.stop();
            if self.active == Some(name) {
                self.active = None;
            }
        }
    }

    pub fn is_registered(&self, name: StrategyName) -> bool {
        self.strategies.contains_key(&name)
    }

    pub fn active(&self) -> Option<StrategyName> {
        self.active
    }

    pub fn live_count(&self) -> usize {
        self.strategies.values().filter(|strategy| strategy.is_live()).count()
    }

    /// Make `name` the only live strategy.
    ///
    /// An unregistered name changes nothing. If the new strategy cannot start,
    /// the previously active one is restarted.
    pub fn activate(&mut self, name: StrategyName) -> Result<(), MovementError> {
        if !self.strategies.contains_key(&name) {
            warn!(strategy = %name, "movement_strategy_unregistered");
            return Err(MovementError::Unregistered(name));
        }

        let previous = self.active.take();
        if let Some(previous) = previous {
            self.stop_strategy(previous);
        }

        match self.start_strategy(name) {
            Ok(()) => {
                self.active = Some(name);
                info!(strategy = %name, "movement_strategy_activated");
                Ok(())
            }
            Err(source) => {
                warn!(strategy = %name, error = %source, "movement_source_unavailable");
                if let Some(previous) = previous
                    && previous != name
                    && self.start_strategy(previous).is_ok()
                {
                    self.active = Some(previous);
                }
                Err(MovementError::SourceUnavailable { strategy: name, source })
            }
        }
    }

    pub fn deactivate(&mut self) {
        if let Some(name) = self.active.take() {
            self.stop_strategy(name);
            info!(strategy = %name, "movement_strategy_deactivated");
        }
    }

    /// A directional input. Only the button strategy, while active, accepts it.
    pub fn step(&self, direction: Direction, current: CellCoord) -> Option<CellCoord> {
        match self.active_strategy() {
            Some(MovementStrategy::Buttons(buttons)) => buttons.step(direction, current),
            _ => {
                debug!(?direction, "step_ignored_without_button_movement");
                None
            }
        }
    }

    /// A position fix. Only the geolocation strategy, while active, accepts it.
    pub fn position(&self, fix: LatLng, current: CellCoord) -> Option<CellCoord> {
        match self.active_strategy() {
            Some(MovementStrategy::Geolocation(geo)) => geo.position(fix, current),
            _ => {
                debug!(lat = fix.lat, lng = fix.lng, "position_ignored_without_geolocation");
                None
            }
        }
    }

    fn active_strategy(&self) -> Option<&MovementStrategy> {
        self.active.and_then(|name| self.strategies.get(&name))
    }

    fn start_strategy(&mut self, name: StrategyName) -> Result<(), SourceUnavailable> {
        match self.strategies.get_mut(&name) {
            Some(strategy) => strategy.start(),
            None => Ok(()),
        }
    }

    fn stop_strategy(&mut self, name: StrategyName) {
        if let Some(strategy) = self.strategies.get_mut(&name) {
            strategy.stop();
        }
    }
}
