use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use game_core::luck::CellGenerator;
use game_core::persistence::decode_snapshot;
use game_core::{CellCoord, GameConfig, InputJournal, ReplayResult, replay_journal, snapshot_hash};
use serde::Serialize;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Game config (TOML); defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a journal (JSON, or a text script of console inputs) in a fresh world
    Replay {
        #[arg(short, long)]
        journal: PathBuf,
        /// World seed for text scripts (JSON journals carry their own)
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Summarize a save file
    Inspect {
        save: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Print the generated tokens around a cell
    Preview {
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        i: i32,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        j: i32,
        #[arg(long, default_value_t = 6)]
        radius: i32,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveSummary {
    world_seed: u64,
    player_cell: String,
    held_token: Option<u32>,
    cells: usize,
    cells_with_tokens: usize,
    highest_token: Option<u32>,
    snapshot_hash: String,
}

fn load_config(path: Option<&Path>) -> Result<GameConfig> {
    let config = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        }
        None => GameConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn load_journal(path: &Path, seed: u64) -> Result<InputJournal> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read journal file: {}", path.display()))?;
    if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&data).with_context(|| "Failed to deserialize journal JSON")
    } else {
        InputJournal::from_script(seed, &data)
            .with_context(|| format!("Failed to parse script: {}", path.display()))
    }
}

fn replay(config: &GameConfig, journal_path: &Path, seed: Option<u64>) -> Result<()> {
    let journal = load_journal(journal_path, seed.unwrap_or(config.world_seed))?;
    let result: ReplayResult = replay_journal(config, &journal)
        .map_err(|e| anyhow!("Replay failed during execution: {e}"))?;

    let counts = result.transitions;
    println!("Replay complete.");
    println!("Inputs: {}", journal.inputs.len());
    println!("Moves: {}", result.moves);
    println!(
        "Transitions: {} pick-ups, {} drops, {} merges, {} blocked, {} out of range, {} empty",
        counts.pick_ups,
        counts.drops,
        counts.merges,
        counts.blocked,
        counts.out_of_range,
        counts.nothing
    );
    println!("Player: {}", result.snapshot.player.cell);
    println!("Won: {}", result.won);
    println!("Snapshot Hash: 0x{:016x}", result.final_snapshot_hash);
    Ok(())
}

fn summarize(bytes: &[u8]) -> Result<SaveSummary> {
    let snapshot = decode_snapshot(bytes)?;
    let tokens: Vec<u32> = snapshot
        .cells
        .iter()
        .filter(|(_, cell)| cell.has_token)
        .map(|(_, cell)| cell.value)
        .collect();
    Ok(SaveSummary {
        world_seed: snapshot.world_seed,
        player_cell: snapshot.player.cell.to_string(),
        held_token: snapshot.player.held_token.map(u32::from),
        cells: snapshot.cells.len(),
        cells_with_tokens: tokens.len(),
        highest_token: tokens.iter().copied().max(),
        snapshot_hash: format!("0x{:016x}", snapshot_hash(&snapshot)),
    })
}

fn inspect(path: &Path, json: bool) -> Result<()> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read save file: {}", path.display()))?;
    let summary =
        summarize(&bytes).with_context(|| format!("Not a usable save: {}", path.display()))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    println!("World seed: {}", summary.world_seed);
    println!("Player: {}", summary.player_cell);
    match summary.held_token {
        Some(value) => println!("Holding: {value}"),
        None => println!("Holding: nothing"),
    }
    println!("Cells: {} ({} with tokens)", summary.cells, summary.cells_with_tokens);
    if let Some(highest) = summary.highest_token {
        println!("Highest token on the map: {highest}");
    }
    println!("Snapshot Hash: {}", summary.snapshot_hash);
    Ok(())
}

/// One row per latitude band, north first. `.` marks a cell without a token.
/// The window is clipped at the edges of the cell grid.
fn preview_grid(generator: &CellGenerator, center: CellCoord, radius: i32) -> Vec<String> {
    (center.j.saturating_sub(radius)..=center.j.saturating_add(radius))
        .rev()
        .map(|j| {
            (center.i.saturating_sub(radius)..=center.i.saturating_add(radius))
                .map(|i| {
                    let cell = generator.roll(CellCoord::new(i, j));
                    if cell.has_token { format!("{:>5}", cell.value) } else { "    .".to_string() }
                })
                .collect()
        })
        .collect()
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Replay { journal, seed } => replay(&config, &journal, seed),
        Command::Inspect { save, json } => inspect(&save, json),
        Command::Preview { seed, i, j, radius } => {
            let generator = config.generator().with_world_seed(seed.unwrap_or(config.world_seed));
            for row in preview_grid(&generator, CellCoord::new(i, j), radius.clamp(0, 30)) {
                println!("{row}");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use game_core::persistence::encode_snapshot;
    use game_core::{PlayerState, Snapshot};
    use proptest::prelude::*;

    #[test]
    fn summary_counts_tokens_in_a_save() {
        let config = GameConfig { token_probability: 1.0, ..GameConfig::default() };
        let generator = config.generator();
        let cells: Vec<_> = (0..3)
            .map(|i| {
                let coord = CellCoord::new(i, 0);
                (coord, generator.roll(coord))
            })
            .collect();
        let snapshot = Snapshot {
            world_seed: 7,
            player: PlayerState { cell: CellCoord::ORIGIN, held_token: None },
            cells,
        };
        let bytes = encode_snapshot(&snapshot).unwrap();

        let summary = summarize(&bytes).unwrap();
        assert_eq!(summary.world_seed, 7);
        assert_eq!(summary.cells, 3);
        assert_eq!(summary.cells_with_tokens, 3);
        assert_eq!(summary.held_token, None);
        assert_eq!(summary.snapshot_hash, format!("0x{:016x}", snapshot_hash(&snapshot)));
    }

    #[test]
    fn garbage_is_not_a_save() {
        assert!(summarize(b"[1, 2, 3]").is_err());
    }

    #[test]
    fn preview_clips_at_the_grid_edge() {
        let generator = GameConfig::default().generator();
        let rows = preview_grid(&generator, CellCoord::new(i32::MAX, i32::MIN), 2);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.len() == 3 * 5));
    }

    proptest! {
        #[test]
        fn preview_is_square(
            seed in any::<u64>(),
            i in -1000i32..1000,
            j in -1000i32..1000,
            radius in 0i32..5,
        ) {
            let generator = GameConfig::default().generator().with_world_seed(seed);
            let rows = preview_grid(&generator, CellCoord::new(i, j), radius);
            let side = (2 * radius + 1) as usize;
            prop_assert_eq!(rows.len(), side);
            for row in rows {
                prop_assert_eq!(row.len(), side * 5);
            }
        }
    }
}
