//! Headless re-execution of an input journal against a fresh world.

use thiserror::Error;
use tracing::info;

use crate::config::{ConfigError, GameConfig};
use crate::game::{Game, InputOutcome, LaunchOptions};
use crate::grid::Tiling;
use crate::interaction::{Transition, is_win};
use crate::journal::{InputJournal, JOURNAL_FORMAT_VERSION, SessionInput};
use crate::movement::{
    GeolocationMovement, MovementFacade, PositionSource, SourceUnavailable, WatchId,
};
use crate::persistence::MemoryBlobStore;
use crate::render::RecordingRenderer;
use crate::state::Snapshot;
use crate::types::InvariantError;

/// Position source for replays: always available, fixes arrive as journal inputs.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    next_watch: u64,
}

impl PositionSource for ScriptedSource {
    fn watch(&mut self) -> Result<WatchId, SourceUnavailable> {
        self.next_watch += 1;
        Ok(WatchId(self.next_watch))
    }

    fn clear_watch(&mut self, _id: WatchId) {}
}

/// Both strategies registered, geolocation fed by a `ScriptedSource`.
pub fn replay_movement(tiling: Tiling) -> MovementFacade {
    let mut movement = MovementFacade::with_buttons();
    movement.register(GeolocationMovement::new(tiling, Box::new(ScriptedSource::default())));
    movement
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("unsupported journal format version {found} (expected {JOURNAL_FORMAT_VERSION})")]
    UnsupportedVersion { found: u16 },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("input #{index} (`{input}`) was rejected: {source}")]
    Invariant {
        index: usize,
        input: SessionInput,
        #[source]
        source: InvariantError,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransitionCounts {
    pub pick_ups: u32,
    pub drops: u32,
    pub merges: u32,
    pub blocked: u32,
    pub out_of_range: u32,
    pub nothing: u32,
}

impl TransitionCounts {
    fn record(&mut self, transition: Transition) {
        let counter = match transition {
            Transition::PickUp { .. } => &mut self.pick_ups,
            Transition::Drop { .. } => &mut self.drops,
            Transition::Merge { .. } => &mut self.merges,
            Transition::Blocked { .. } => &mut self.blocked,
            Transition::OutOfRange { .. } => &mut self.out_of_range,
            Transition::Nothing => &mut self.nothing,
        };
        *counter += 1;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReplayResult {
    pub final_snapshot_hash: u64,
    pub snapshot: Snapshot,
    pub transitions: TransitionCounts,
    pub moves: u32,
    pub won: bool,
}

/// Play `journal` from a fresh state. The journal's world seed replaces the
/// one in `config`.
pub fn replay_journal(
    config: &GameConfig,
    journal: &InputJournal,
) -> Result<ReplayResult, ReplayError> {
    if journal.format_version != JOURNAL_FORMAT_VERSION {
        return Err(ReplayError::UnsupportedVersion { found: journal.format_version });
    }

    let config = GameConfig { world_seed: journal.world_seed, ..config.clone() };
    let movement = replay_movement(config.tiling());
    let mut game = Game::new(config, movement, RecordingRenderer::new(), MemoryBlobStore::new())?;
    game.start(LaunchOptions::default());

    let mut transitions = TransitionCounts::default();
    let mut moves = 0;
    for (index, input) in journal.inputs.iter().enumerate() {
        match game.apply(input) {
            Ok(InputOutcome::Interaction(transition)) => transitions.record(transition),
            Ok(InputOutcome::Moved(Some(_))) => moves += 1,
            Ok(_) => {}
            Err(source) => return Err(ReplayError::Invariant { index, input: *input, source }),
        }
    }

    let won = is_win(game.player().held_token, game.config().win_value);
    let result = ReplayResult {
        final_snapshot_hash: game.snapshot_hash(),
        snapshot: game.snapshot(),
        transitions,
        moves,
        won,
    };
    info!(
        inputs = journal.inputs.len(),
        hash = result.final_snapshot_hash,
        moves,
        won,
        "journal_replayed"
    );
    Ok(result)
}

#[cfg(test)]
mod tests;
