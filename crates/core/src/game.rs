//! Session controller. Owns the game state and every collaborator, and is the
//! single entry point for host events (clicks, steps, position fixes, map
//! moves). Each handler runs to completion before the next is accepted.

use tracing::{debug, error, info, warn};

use crate::config::{ConfigError, GameConfig};
use crate::grid::{LatLng, LatLngBounds, Tiling};
use crate::interaction::{Transition, interact, is_win, status_text};
use crate::journal::SessionInput;
use crate::movement::{MovementError, MovementFacade, StrategyName};
use crate::persistence::{BlobStore, LoadOutcome, Persistence};
use crate::render::Renderer;
use crate::state::{CellStore, GameState, Snapshot};
use crate::types::{CellCoord, Direction, InvariantError, PlayerState};
use crate::viewport::{View, ViewTooLarge, Viewport, ViewportDiff};

mod hash;

pub use hash::snapshot_hash;

/// Launch-time toggles handed over by the bootstrap layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    pub movement: Option<StrategyName>,
    pub reset: bool,
}

/// How a session's initial state was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStart {
    Fresh,
    Restored,
    /// A save existed but was unusable and was ignored.
    Discarded,
    Reset,
}

/// What one `SessionInput` did.
#[derive(Clone, Debug, PartialEq)]
pub enum InputOutcome {
    Interaction(Transition),
    /// The player's new cell, or `None` when no live strategy accepted the input.
    Moved(Option<CellCoord>),
    View(ViewportDiff),
    ViewRefused(ViewTooLarge),
    MovementActivated(StrategyName),
    MovementRefused(MovementError),
    MovementStopped,
    Reset,
}

pub struct Game<R: Renderer, B: BlobStore> {
    config: GameConfig,
    tiling: Tiling,
    state: GameState,
    viewport: Viewport,
    view: View,
    movement: MovementFacade,
    persistence: Persistence,
    renderer: R,
    blobs: B,
}

impl<R: Renderer, B: BlobStore> Game<R, B> {
    pub fn new(
        config: GameConfig,
        movement: MovementFacade,
        renderer: R,
        blobs: B,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let tiling = config.tiling();
        let state = fresh_state(&config, tiling);
        let view = initial_view(&config, tiling, state.player.cell);
        Ok(Self {
            viewport: Viewport::new(tiling, config.viewport_margin, config.max_rendered_cells),
            persistence: Persistence::new(config.save_key.clone()),
            config,
            tiling,
            state,
            view,
            movement,
            renderer,
            blobs,
        })
    }

    /// Load (or reset) the saved state, activate the requested movement
    /// strategy and draw the initial view.
    pub fn start(&mut self, launch: LaunchOptions) -> SessionStart {
        let session = if launch.reset {
            self.reset();
            SessionStart::Reset
        } else {
            self.restore()
        };

        if let Some(name) = launch.movement
            && let Err(err) = self.activate_movement(name)
        {
            warn!(error = %err, "initial_movement_not_started");
        }

        info!(
            ?session,
            cell = %self.state.player.cell,
            cells = self.state.store.len(),
            movement = ?self.movement.active(),
            "session_started"
        );
        session
    }

    /// Replace in-memory state with the saved snapshot, if a usable one exists.
    pub fn restore(&mut self) -> SessionStart {
        let session = match self.persistence.load(&self.blobs) {
            LoadOutcome::Missing => SessionStart::Fresh,
            LoadOutcome::Restored(snapshot) => match self.state.restore(&snapshot) {
                Ok(()) => SessionStart::Restored,
                Err(err) => {
                    warn!(error = %err, "snapshot_rejected_on_hydrate");
                    SessionStart::Discarded
                }
            },
            LoadOutcome::Discarded(_) | LoadOutcome::Unreadable(_) => SessionStart::Discarded,
        };

        self.viewport.clear(&mut self.renderer);
        self.sync_view_to_player();
        self.place_player();
        self.refresh_view();
        self.refresh_status();
        session
    }

    /// Forget the save and start over from the origin. Nothing is reloaded.
    pub fn reset(&mut self) {
        self.persistence.clear(&mut self.blobs);
        self.viewport.clear(&mut self.renderer);
        self.state = fresh_state(&self.config, self.tiling);
        self.view = initial_view(&self.config, self.tiling, self.state.player.cell);
        self.place_player();
        self.refresh_view();
        self.refresh_status();
        info!(cell = %self.state.player.cell, "game_reset");
    }

    /// Route one input to its handler.
    pub fn apply(&mut self, input: &SessionInput) -> Result<InputOutcome, InvariantError> {
        let outcome = match *input {
            SessionInput::Click { cell } => InputOutcome::Interaction(self.click(cell)?),
            SessionInput::Step { direction } => InputOutcome::Moved(self.step(direction)),
            SessionInput::Position { fix } => InputOutcome::Moved(self.position_update(fix)),
            SessionInput::ViewChanged { bounds } => match self.view_changed(bounds) {
                Ok(diff) => InputOutcome::View(diff),
                Err(err) => InputOutcome::ViewRefused(err),
            },
            SessionInput::Activate { strategy } => match self.activate_movement(strategy) {
                Ok(()) => InputOutcome::MovementActivated(strategy),
                Err(err) => InputOutcome::MovementRefused(err),
            },
            SessionInput::Deactivate => {
                self.deactivate_movement();
                InputOutcome::MovementStopped
            }
            SessionInput::Reset => {
                self.reset();
                InputOutcome::Reset
            }
        };
        Ok(outcome)
    }

    /// A click on a rendered cell.
    pub fn click(&mut self, coord: CellCoord) -> Result<Transition, InvariantError> {
        let result = interact(&mut self.state, coord, self.config.interaction_radius);
        debug_assert!(result.is_ok(), "interaction broke a cell invariant: {result:?}");
        let transition = match result {
            Ok(transition) => transition,
            Err(err) => {
                error!(cell = %coord, error = %err, "interaction_rejected");
                return Err(err);
            }
        };

        if !transition.changes_state() {
            debug!(cell = %coord, ?transition, "click_without_effect");
            return Ok(transition);
        }

        if let Some(cell) = self.state.store.get(coord) {
            self.viewport.refresh_cell(coord, cell, &mut self.renderer);
        }
        self.refresh_status();
        self.save();

        let held = self.state.player.held_token;
        info!(cell = %coord, ?transition, held = ?held.map(u32::from), "cell_interaction");
        if matches!(transition, Transition::Merge { .. }) && is_win(held, self.config.win_value) {
            info!(held = ?held.map(u32::from), "win_value_reached");
        }
        Ok(transition)
    }

    /// A directional input, routed to the active strategy.
    pub fn step(&mut self, direction: Direction) -> Option<CellCoord> {
        let target = self.movement.step(direction, self.state.player.cell)?;
        self.relocate_player(target);
        Some(target)
    }

    /// A position fix from the host's position stream.
    pub fn position_update(&mut self, fix: LatLng) -> Option<CellCoord> {
        let target = self.movement.position(fix, self.state.player.cell)?;
        self.relocate_player(target);
        Some(target)
    }

    /// The host's map finished moving. Ignored when the view is a fixed radius
    /// around the player. An oversized region leaves the previous view in place.
    pub fn view_changed(&mut self, bounds: LatLngBounds) -> Result<ViewportDiff, ViewTooLarge> {
        if matches!(self.view, View::Around { .. }) {
            debug!("view_change_ignored_for_fixed_radius");
            return Ok(ViewportDiff::default());
        }
        if !bounds.is_valid() {
            warn!(?bounds, "view_bounds_rejected");
            return Ok(ViewportDiff::default());
        }
        let candidate = View::Bounds(bounds);
        let diff =
            self.viewport.recompute(&candidate, &mut self.state.store, &mut self.renderer)?;
        self.view = candidate;
        Ok(diff)
    }

    pub fn activate_movement(&mut self, name: StrategyName) -> Result<(), MovementError> {
        self.movement.activate(name)?;
        self.refresh_status();
        Ok(())
    }

    pub fn deactivate_movement(&mut self) {
        self.movement.deactivate();
    }

    /// Persist the current state. Failures are logged, never fatal.
    pub fn save(&mut self) -> bool {
        let snapshot = self.state.snapshot();
        self.persistence.save(&mut self.blobs, &snapshot)
    }

    /// Stop the movement source and persist.
    pub fn shutdown(&mut self) {
        self.movement.deactivate();
        self.save();
        info!(cells = self.state.store.len(), "session_ended");
    }

    pub fn player(&self) -> &PlayerState {
        &self.state.player
    }

    pub fn store(&self) -> &CellStore {
        &self.state.store
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn tiling(&self) -> Tiling {
        self.tiling
    }

    pub fn active_movement(&self) -> Option<StrategyName> {
        self.movement.active()
    }

    pub fn movement(&self) -> &MovementFacade {
        &self.movement
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    pub fn status_text(&self) -> String {
        status_text(self.state.player.held_token, self.config.win_value)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.snapshot()
    }

    /// Hand back the collaborators, e.g. to start a new session on the same store.
    pub fn into_parts(self) -> (R, B) {
        (self.renderer, self.blobs)
    }

    fn relocate_player(&mut self, cell: CellCoord) {
        let from = self.state.player.cell;
        self.state.player.cell = cell;
        self.place_player();
        self.sync_view_to_player();
        self.refresh_view();
        self.refresh_status();
        self.save();
        debug!(%from, to = %cell, "player_moved");
    }

    fn place_player(&mut self) {
        let center = self.tiling.cell_center(self.state.player.cell);
        self.renderer.set_player_marker(center);
        self.renderer
            .set_range_indicator(center, self.tiling.radius_meters(self.config.interaction_radius));
        self.renderer.pan_to(center);
    }

    fn sync_view_to_player(&mut self) {
        let cell = self.state.player.cell;
        self.view = match self.view {
            View::Bounds(bounds) => View::Bounds(bounds.recentered(self.tiling.cell_center(cell))),
            View::Around { radius, .. } => View::Around { center: cell, radius },
        };
    }

    fn refresh_view(&mut self) -> ViewportDiff {
        self.viewport
            .recompute(&self.view, &mut self.state.store, &mut self.renderer)
            .unwrap_or_default()
    }

    fn refresh_status(&mut self) {
        let text = self.status_text();
        self.renderer.set_status(&text);
    }
}

fn fresh_state(config: &GameConfig, tiling: Tiling) -> GameState {
    GameState::new(tiling.cell_at(config.origin), config.generator())
}

fn initial_view(config: &GameConfig, tiling: Tiling, player: CellCoord) -> View {
    match config.fixed_view_radius {
        Some(radius) => View::Around { center: player, radius },
        None => View::Bounds(tiling.bounds_around(
            player,
            config.view_half_width_cells,
            config.view_half_height_cells,
        )),
    }
}
