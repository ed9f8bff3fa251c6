use std::collections::BTreeMap;

use tracing::{error, trace};

use crate::luck::CellGenerator;
use crate::types::{CellCoord, CellState, InvariantError, PlayerState};

/// Authoritative mapping from coordinate to cell state.
///
/// Entries are created on first access from the generator and never removed
/// except by a full reset.
#[derive(Clone, Debug)]
pub struct CellStore {
    generator: CellGenerator,
    cells: BTreeMap<CellCoord, CellState>,
}

impl CellStore {
    pub fn new(generator: CellGenerator) -> Self {
        Self { generator, cells: BTreeMap::new() }
    }

    pub fn generator(&self) -> &CellGenerator {
        &self.generator
    }

    pub fn world_seed(&self) -> u64 {
        self.generator.world_seed()
    }

    pub fn get(&self, coord: CellCoord) -> Option<CellState> {
        self.cells.get(&coord).copied()
    }

    pub fn contains(&self, coord: CellCoord) -> bool {
        self.cells.contains_key(&coord)
    }

    pub fn get_or_create(&mut self, coord: CellCoord) -> CellState {
        *self.cells.entry(coord).or_insert_with(|| {
            let rolled = self.generator.roll(coord);
            trace!(
                cell = %coord,
                has_token = rolled.has_token,
                value = rolled.value,
                "cell_rolled"
            );
            rolled
        })
    }

    /// Inserts or overwrites one entry. A non-power-of-two value is rejected
    /// and the previous entry is left as it was.
    pub fn set(&mut self, coord: CellCoord, state: CellState) -> Result<(), InvariantError> {
        if let Err(err) = state.validate(coord) {
            error!(error = %err, "cell_invariant_violated");
            return Err(err);
        }
        self.cells.insert(coord, state);
        Ok(())
    }

    /// Replaces the whole content with persisted entries, adopting the world
    /// seed they were generated under. Nothing changes if any entry is invalid.
    pub fn hydrate(
        &mut self,
        world_seed: u64,
        entries: impl IntoIterator<Item = (CellCoord, CellState)>,
    ) -> Result<(), InvariantError> {
        let mut cells = BTreeMap::new();
        for (coord, state) in entries {
            state.validate(coord)?;
            cells.insert(coord, state);
        }
        self.generator = self.generator.clone().with_world_seed(world_seed);
        self.cells = cells;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Entries in coordinate order.
    pub fn iter(&self) -> impl Iterator<Item = (CellCoord, CellState)> + '_ {
        self.cells.iter().map(|(coord, state)| (*coord, *state))
    }
}

/// Everything that survives a session: the player and every materialized cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub world_seed: u64,
    pub player: PlayerState,
    pub cells: Vec<(CellCoord, CellState)>,
}

/// The single aggregate of mutable game data, owned by the `Game` controller.
#[derive(Clone, Debug)]
pub struct GameState {
    pub player: PlayerState,
    pub store: CellStore,
}

impl GameState {
    pub fn new(start: CellCoord, generator: CellGenerator) -> Self {
        Self { player: PlayerState::at(start), store: CellStore::new(generator) }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            world_seed: self.store.world_seed(),
            player: self.player,
            cells: self.store.iter().collect(),
        }
    }

    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<(), InvariantError> {
        self.store.hydrate(snapshot.world_seed, snapshot.cells.iter().copied())?;
        self.player = snapshot.player;
        Ok(())
    }
}
