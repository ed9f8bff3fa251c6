use super::*;
use crate::grid::LatLng;
use crate::movement::StrategyName;
use crate::types::{CellCoord, Direction};

fn unit_config() -> GameConfig {
    GameConfig {
        tile_degrees: 1.0,
        origin: LatLng::new(0.5, 0.5),
        fixed_view_radius: Some(4),
        token_probability: 1.0,
        value_tiers: Vec::new(),
        win_value: 2,
        ..GameConfig::default()
    }
}

#[test]
fn replay_matches_a_live_session() {
    let config = unit_config();
    let script =
        "use buttons\nclick 0 0\nn\nclick 0 1\nclick 0 0\nuse geo\npos 3.5 3.5\nclick 9 9\n";
    let journal = InputJournal::from_script(config.world_seed, script).unwrap();

    let mut live = Game::new(
        config.clone(),
        replay_movement(config.tiling()),
        RecordingRenderer::new(),
        MemoryBlobStore::new(),
    )
    .unwrap();
    live.start(LaunchOptions::default());
    for input in &journal.inputs {
        live.apply(input).unwrap();
    }

    let result = replay_journal(&config, &journal).unwrap();
    assert_eq!(result.final_snapshot_hash, live.snapshot_hash());
    assert_eq!(result.snapshot, live.snapshot());
    assert_eq!(
        result.transitions,
        TransitionCounts { pick_ups: 1, merges: 1, drops: 1, out_of_range: 1, ..Default::default() }
    );
    assert_eq!(result.moves, 2);
    assert_eq!(result.snapshot.player.cell, CellCoord::new(3, 3));
    assert!(!result.won);
}

#[test]
fn replaying_twice_is_deterministic() {
    let mut journal = InputJournal::new(99);
    journal.push(SessionInput::Activate { strategy: StrategyName::Buttons });
    for direction in [Direction::East, Direction::East, Direction::North, Direction::West] {
        journal.push(SessionInput::Step { direction });
        journal.push(SessionInput::Click { cell: CellCoord::new(1, 1) });
    }
    let config = GameConfig { token_probability: 0.5, ..unit_config() };

    let first = replay_journal(&config, &journal).unwrap();
    let second = replay_journal(&config, &journal).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.snapshot.world_seed, 99);
}

#[test]
fn win_is_reported() {
    let journal = InputJournal::from_script(0, "click 0 0\nclick 1 0\n").unwrap();
    let result = replay_journal(&unit_config(), &journal).unwrap();
    assert_eq!(result.transitions.merges, 1);
    assert!(result.won);
}

#[test]
fn unknown_journal_versions_are_refused() {
    let journal = InputJournal { format_version: 7, ..InputJournal::new(0) };
    assert!(matches!(
        replay_journal(&unit_config(), &journal),
        Err(ReplayError::UnsupportedVersion { found: 7 })
    ));
}

#[test]
fn invalid_config_is_reported() {
    let config = GameConfig { tile_degrees: 0.0, ..unit_config() };
    assert!(matches!(
        replay_journal(&config, &InputJournal::new(0)),
        Err(ReplayError::Config(_))
    ));
}
