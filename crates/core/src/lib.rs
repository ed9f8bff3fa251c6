pub mod config;
pub mod game;
pub mod grid;
pub mod interaction;
pub mod journal;
pub mod luck;
pub mod movement;
pub mod persistence;
pub mod render;
pub mod replay;
pub mod state;
pub mod types;
pub mod viewport;

pub use config::{ConfigError, GameConfig};
pub use game::{Game, InputOutcome, LaunchOptions, SessionStart, snapshot_hash};
pub use grid::{LatLng, LatLngBounds, Tiling};
pub use interaction::Transition;
pub use journal::{InputJournal, InputParseError, SessionInput};
pub use movement::{
    ButtonMovement, GeolocationMovement, MovementError, MovementFacade, PositionSource,
    SourceUnavailable, StrategyName, WatchId,
};
pub use persistence::{BlobStore, BlobStoreError, MemoryBlobStore, SnapshotError};
pub use render::{DrawHandle, OutlineStyle, RecordingRenderer, Renderer};
pub use replay::{ReplayError, ReplayResult, replay_journal};
pub use state::{CellStore, GameState, Snapshot};
pub use types::*;
pub use viewport::{View, ViewTooLarge, Viewport, ViewportDiff};
