//! Save-file codec and the key-value blob store boundary.
//!
//! The save file is one JSON document:
//! - `formatVersion`, `worldSeed`, `player: { cell: {i, j}, heldToken }`
//! - `cells`: `[["i,j", { hasToken, value }], ...]` in coordinate order
//! - `sha256Hex`: SHA-256 of the canonical JSON of every other field.
//!
//! Anything that fails to parse, validate, or checksum is reported as a
//! `SnapshotError`; callers discard it and carry on with default state.

use std::collections::{BTreeSet, HashMap};
use std::io;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::state::Snapshot;
use crate::types::{CellCoord, CellState, CoordParseError, InvariantError, PlayerState};

pub const SAVE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("blob store I/O error for key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid blob key '{0}'")]
    InvalidKey(String),
}

/// Opaque key-value storage supplied by the host.
pub trait BlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobStoreError>;
    fn set(&mut self, key: &str, bytes: &[u8]) -> Result<(), BlobStoreError>;
    fn remove(&mut self, key: &str) -> Result<(), BlobStoreError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryBlobStore {
    blobs: HashMap<String, Vec<u8>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.blobs.contains_key(key)
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobStoreError> {
        Ok(self.blobs.get(key).cloned())
    }

    fn set(&mut self, key: &str, bytes: &[u8]) -> Result<(), BlobStoreError> {
        self.blobs.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), BlobStoreError> {
        self.blobs.remove(key);
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("save file is not valid JSON for this schema: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unsupported save format version {found} (expected {SAVE_FORMAT_VERSION})")]
    UnsupportedVersion { found: u32 },
    #[error("save file checksum does not match its contents")]
    ChecksumMismatch,
    #[error("invalid cell key: {0}")]
    CellKey(#[from] CoordParseError),
    #[error("cell {0} appears more than once")]
    DuplicateCell(CellCoord),
    #[error(transparent)]
    Invariant(#[from] InvariantError),
}

/// Fields covered by the checksum, serialized in this order.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveBody<'a> {
    format_version: u32,
    world_seed: u64,
    player: &'a PlayerState,
    cells: &'a [(String, CellState)],
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SaveFile {
    /// Absent in bare `{player, cells}` blobs; those skip the version and checksum checks.
    #[serde(default)]
    format_version: Option<u32>,
    #[serde(default)]
    world_seed: u64,
    player: PlayerState,
    cells: Vec<(String, CellState)>,
    #[serde(default)]
    sha256_hex: Option<String>,
}

fn body_sha256(body: &SaveBody<'_>) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(body)?;
    let digest = Sha256::digest(json.as_bytes());
    Ok(format!("{digest:064x}"))
}

pub fn encode_snapshot(snapshot: &Snapshot) -> Result<Vec<u8>, SnapshotError> {
    let cells: Vec<(String, CellState)> =
        snapshot.cells.iter().map(|(coord, state)| (coord.to_string(), *state)).collect();
    let body = SaveBody {
        format_version: SAVE_FORMAT_VERSION,
        world_seed: snapshot.world_seed,
        player: &snapshot.player,
        cells: &cells,
    };
    let sha256_hex = body_sha256(&body)?;
    let file = SaveFile {
        format_version: Some(SAVE_FORMAT_VERSION),
        world_seed: snapshot.world_seed,
        player: snapshot.player,
        cells,
        sha256_hex: Some(sha256_hex),
    };
    Ok(serde_json::to_vec(&file)?)
}

pub fn decode_snapshot(bytes: &[u8]) -> Result<Snapshot, SnapshotError> {
    let file: SaveFile = serde_json::from_slice(bytes)?;
    if let Some(found) = file.format_version
        && found != SAVE_FORMAT_VERSION
    {
        return Err(SnapshotError::UnsupportedVersion { found });
    }

    if let Some(expected) = &file.sha256_hex {
        let body = SaveBody {
            format_version: file.format_version.unwrap_or(SAVE_FORMAT_VERSION),
            world_seed: file.world_seed,
            player: &file.player,
            cells: &file.cells,
        };
        if body_sha256(&body)? != *expected {
            return Err(SnapshotError::ChecksumMismatch);
        }
    }

    let mut seen = BTreeSet::new();
    let mut cells = Vec::with_capacity(file.cells.len());
    for (key, state) in &file.cells {
        let coord: CellCoord = key.parse()?;
        if !seen.insert(coord) {
            return Err(SnapshotError::DuplicateCell(coord));
        }
        state.validate(coord)?;
        cells.push((coord, *state));
    }
    cells.sort_by_key(|(coord, _)| *coord);

    Ok(Snapshot { world_seed: file.world_seed, player: file.player, cells })
}

#[derive(Debug)]
pub enum LoadOutcome {
    /// No save under the key; start fresh.
    Missing,
    Restored(Snapshot),
    /// A save existed but could not be used; start fresh.
    Discarded(SnapshotError),
    /// The store itself failed; start fresh.
    Unreadable(BlobStoreError),
}

/// Reads and writes the game's snapshot under one fixed key.
#[derive(Debug, Clone)]
pub struct Persistence {
    key: String,
}

impl Persistence {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Fire-and-forget: failures are logged and reported, never fatal.
    pub fn save<B: BlobStore>(&self, blobs: &mut B, snapshot: &Snapshot) -> bool {
        let bytes = match encode_snapshot(snapshot) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(key = %self.key, error = %err, "snapshot_encode_failed");
                return false;
            }
        };
        match blobs.set(&self.key, &bytes) {
            Ok(()) => {
                debug!(
                    key = %self.key,
                    bytes = bytes.len(),
                    cells = snapshot.cells.len(),
                    "snapshot_saved"
                );
                true
            }
            Err(err) => {
                warn!(key = %self.key, error = %err, "snapshot_save_failed");
                false
            }
        }
    }

    pub fn load<B: BlobStore>(&self, blobs: &B) -> LoadOutcome {
        let bytes = match blobs.get(&self.key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                info!(key = %self.key, "no_saved_snapshot");
                return LoadOutcome::Missing;
            }
            Err(err) => {
                warn!(key = %self.key, error = %err, "snapshot_read_failed");
                return LoadOutcome::Unreadable(err);
            }
        };
        match decode_snapshot(&bytes) {
            Ok(snapshot) => {
                info!(key = %self.key, cells = snapshot.cells.len(), "snapshot_loaded");
                LoadOutcome::Restored(snapshot)
            }
            Err(err) => {
                warn!(key = %self.key, error = %err, "snapshot_discarded");
                LoadOutcome::Discarded(err)
            }
        }
    }

    pub fn clear<B: BlobStore>(&self, blobs: &mut B) {
        if let Err(err) = blobs.remove(&self.key) {
            warn!(key = %self.key, error = %err, "snapshot_clear_failed");
        }
    }
}

#[cfg(test)]
mod tests;
