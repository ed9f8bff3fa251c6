use proptest::collection::btree_map;
use proptest::prelude::*;
use serde_json::Value;

use super::*;
use crate::types::Token;

fn sample_snapshot() -> Snapshot {
    Snapshot {
        world_seed: 42,
        player: PlayerState { cell: CellCoord::new(-3, 7), held_token: Token::new(4) },
        cells: vec![
            (CellCoord::new(-4, 7), CellState { has_token: false, value: 2 }),
            (CellCoord::new(-3, 7), CellState { has_token: true, value: 8 }),
            (CellCoord::new(0, 0), CellState { has_token: true, value: 1 }),
        ],
    }
}

fn reencode(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).expect("value serializes")
}

#[test]
fn snapshot_roundtrips_through_the_codec() {
    let snapshot = sample_snapshot();
    let bytes = encode_snapshot(&snapshot).unwrap();
    assert_eq!(decode_snapshot(&bytes).unwrap(), snapshot);
}

#[test]
fn encoded_layout_follows_the_logical_schema() {
    let bytes = encode_snapshot(&sample_snapshot()).unwrap();
    let value: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(value["player"]["cell"]["i"], -3);
    assert_eq!(value["player"]["cell"]["j"], 7);
    assert_eq!(value["player"]["heldToken"], 4);
    assert_eq!(value["cells"][1][0], "-3,7");
    assert_eq!(value["cells"][1][1]["hasToken"], true);
    assert_eq!(value["cells"][1][1]["value"], 8);
    assert_eq!(value["sha256Hex"].as_str().map(str::len), Some(64));
}

#[test]
fn empty_hands_serialize_as_null() {
    let mut snapshot = sample_snapshot();
    snapshot.player.held_token = None;
    let value: Value = serde_json::from_slice(&encode_snapshot(&snapshot).unwrap()).unwrap();
    assert!(value["player"]["heldToken"].is_null());
    assert_eq!(decode_snapshot(&reencode(&value)).unwrap().player.held_token, None);
}

#[test]
fn tampered_contents_fail_the_checksum() {
    let bytes = encode_snapshot(&sample_snapshot()).unwrap();
    let mut value: Value = serde_json::from_slice(&bytes).unwrap();
    value["cells"][0][1]["value"] = Value::from(16);
    assert!(matches!(decode_snapshot(&reencode(&value)), Err(SnapshotError::ChecksumMismatch)));
}

#[test]
fn missing_fields_and_garbage_are_parse_errors() {
    assert!(matches!(decode_snapshot(b"not json"), Err(SnapshotError::Parse(_))));
    assert!(matches!(decode_snapshot(b"{}"), Err(SnapshotError::Parse(_))));

    let bytes = encode_snapshot(&sample_snapshot()).unwrap();
    let mut value: Value = serde_json::from_slice(&bytes).unwrap();
    if let Some(player) = value["player"].as_object_mut() {
        player.remove("cell");
    }
    assert!(matches!(decode_snapshot(&reencode(&value)), Err(SnapshotError::Parse(_))));
}

#[test]
fn bare_player_and_cells_blob_decodes_without_envelope_fields() {
    let blob = concat!(
        r#"{"player":{"cell":{"i":0,"j":0},"heldToken":2},"#,
        r#""cells":[["0,0",{"hasToken":true,"value":2}]]}"#
    );
    let snapshot = decode_snapshot(blob.as_bytes()).unwrap();
    assert_eq!(snapshot.world_seed, 0);
    assert_eq!(snapshot.player.cell, CellCoord::ORIGIN);
    assert_eq!(snapshot.player.held_token, Token::new(2));
    assert_eq!(snapshot.cells, vec![(CellCoord::ORIGIN, CellState { has_token: true, value: 2 })]);

    let bad = concat!(
        r#"{"player":{"cell":{"i":0,"j":0},"heldToken":null},"#,
        r#""cells":[["0,0",{"hasToken":true,"value":5}]]}"#
    );
    assert!(matches!(decode_snapshot(bad.as_bytes()), Err(SnapshotError::Invariant(_))));
}

#[test]
fn a_stripped_checksum_still_checks_the_version() {
    let mut value: Value =
        serde_json::from_slice(&encode_snapshot(&sample_snapshot()).unwrap()).unwrap();
    if let Some(file) = value.as_object_mut() {
        file.remove("sha256Hex");
    }
    value["formatVersion"] = Value::from(2);
    assert!(matches!(
        decode_snapshot(&reencode(&value)),
        Err(SnapshotError::UnsupportedVersion { found: 2 })
    ));
}

#[test]
fn held_token_that_is_not_a_power_of_two_is_rejected() {
    let mut value: Value =
        serde_json::from_slice(&encode_snapshot(&sample_snapshot()).unwrap()).unwrap();
    value["player"]["heldToken"] = Value::from(3);
    assert!(matches!(decode_snapshot(&reencode(&value)), Err(SnapshotError::Parse(_))));
}

#[test]
fn other_format_versions_are_rejected() {
    let mut value: Value =
        serde_json::from_slice(&encode_snapshot(&sample_snapshot()).unwrap()).unwrap();
    value["formatVersion"] = Value::from(99);
    assert!(matches!(
        decode_snapshot(&reencode(&value)),
        Err(SnapshotError::UnsupportedVersion { found: 99 })
    ));
}

#[test]
fn invalid_cells_are_rejected_even_with_a_valid_checksum() {
    let bad_value = Snapshot {
        cells: vec![(CellCoord::ORIGIN, CellState { has_token: true, value: 6 })],
        ..sample_snapshot()
    };
    assert!(matches!(
        decode_snapshot(&encode_snapshot(&bad_value).unwrap()),
        Err(SnapshotError::Invariant(_))
    ));

    let duplicated = Snapshot {
        cells: vec![
            (CellCoord::ORIGIN, CellState { has_token: true, value: 2 }),
            (CellCoord::ORIGIN, CellState { has_token: false, value: 2 }),
        ],
        ..sample_snapshot()
    };
    assert!(matches!(
        decode_snapshot(&encode_snapshot(&duplicated).unwrap()),
        Err(SnapshotError::DuplicateCell(_))
    ));
}

#[test]
fn persistence_reports_missing_restored_and_discarded() {
    let persistence = Persistence::new("save");
    let mut blobs = MemoryBlobStore::new();
    assert!(matches!(persistence.load(&blobs), LoadOutcome::Missing));

    assert!(persistence.save(&mut blobs, &sample_snapshot()));
    match persistence.load(&blobs) {
        LoadOutcome::Restored(snapshot) => assert_eq!(snapshot, sample_snapshot()),
        other => panic!("expected a restored snapshot, got {other:?}"),
    }

    blobs.set("save", b"{\"player\":").unwrap();
    assert!(matches!(persistence.load(&blobs), LoadOutcome::Discarded(_)));

    persistence.clear(&mut blobs);
    assert!(!blobs.contains("save"));
    assert!(matches!(persistence.load(&blobs), LoadOutcome::Missing));
}

fn any_state() -> impl Strategy<Value = CellState> {
    (any::<bool>(), 0_u32..31).prop_map(|(has_token, exp)| CellState { has_token, value: 1 << exp })
}

proptest! {
    #[test]
    fn any_reachable_snapshot_roundtrips(
        world_seed in any::<u64>(),
        player_i in -2_000_000_i32..2_000_000,
        player_j in -2_000_000_i32..2_000_000,
        held_exp in proptest::option::of(0_u32..31),
        cells in btree_map((-500_i32..500, -500_i32..500), any_state(), 0..64),
    ) {
        let snapshot = Snapshot {
            world_seed,
            player: PlayerState {
                cell: CellCoord::new(player_i, player_j),
                held_token: held_exp.and_then(|exp| Token::new(1 << exp)),
            },
            cells: cells.into_iter().map(|((i, j), state)| (CellCoord::new(i, j), state)).collect(),
        };
        let bytes = encode_snapshot(&snapshot).unwrap();
        prop_assert_eq!(decode_snapshot(&bytes).unwrap(), snapshot);
    }
}
