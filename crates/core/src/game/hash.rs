//! Stable snapshot hashing for deterministic verification.
//! Kept apart from the controller so hashing never depends on render or
//! persistence state.

use std::hash::Hasher;

use xxhash_rust::xxh3::Xxh3;

use super::Game;
use crate::persistence::BlobStore;
use crate::render::Renderer;
use crate::state::Snapshot;

/// Order-sensitive hash over every persisted field. Cells are hashed in the
/// order they appear, which for snapshots taken from a `CellStore` is
/// coordinate order.
pub fn snapshot_hash(snapshot: &Snapshot) -> u64 {
    let mut hasher = Xxh3::new();
    hasher.write_u64(snapshot.world_seed);
    hasher.write_i32(snapshot.player.cell.i);
    hasher.write_i32(snapshot.player.cell.j);
    match snapshot.player.held_token {
        Some(token) => {
            hasher.write_u8(1);
            hasher.write_u32(token.value());
        }
        None => hasher.write_u8(0),
    }
    hasher.write_usize(snapshot.cells.len());
    for (coord, state) in &snapshot.cells {
        hasher.write_i32(coord.i);
        hasher.write_i32(coord.j);
        hasher.write_u8(u8::from(state.has_token));
        hasher.write_u32(state.value);
    }
    hasher.finish()
}

impl<R: Renderer, B: BlobStore> Game<R, B> {
    pub fn snapshot_hash(&self) -> u64 {
        snapshot_hash(&self.state.snapshot())
    }
}
