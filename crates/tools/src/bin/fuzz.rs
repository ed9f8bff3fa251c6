use anyhow::{Result, bail};
use clap::Parser;
use game_core::replay::replay_movement;
use game_core::{
    CellCoord, Direction, Game, GameConfig, InputOutcome, LatLng, LaunchOptions,
    MemoryBlobStore, RecordingRenderer, SessionInput, StrategyName, Transition,
};
use rand_chacha::{
    ChaCha8Rng,
    rand_core::{Rng, SeedableRng},
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value_t = 42)]
    seed: u64,
    #[arg(short = 'n', long, default_value_t = 1000)]
    steps: u32,
}

fn choose<T: Clone>(rng: &mut ChaCha8Rng, slice: &[T]) -> T {
    let p = rng.next_u64() as usize % slice.len();
    slice[p].clone()
}

fn offset(rng: &mut ChaCha8Rng, spread: u64) -> i32 {
    (rng.next_u64() % (2 * spread + 1)) as i32 - spread as i32
}

fn random_input(rng: &mut ChaCha8Rng, player: CellCoord, config: &GameConfig) -> SessionInput {
    match rng.next_u64() % 20 {
        0..=9 => SessionInput::Click {
            cell: CellCoord::new(player.i + offset(rng, 4), player.j + offset(rng, 4)),
        },
        10..=15 => SessionInput::Step { direction: choose(rng, &Direction::ALL) },
        16 => {
            let center = config.tiling().cell_center(player);
            let jitter = config.tile_degrees * f64::from(offset(rng, 3));
            SessionInput::Position { fix: LatLng::new(center.lat + jitter, center.lng - jitter) }
        }
        17 => SessionInput::Activate {
            strategy: choose(rng, &[StrategyName::Buttons, StrategyName::Geolocation]),
        },
        18 => SessionInput::Deactivate,
        _ if rng.next_u64() % 10 == 0 => SessionInput::Reset,
        _ => SessionInput::Activate { strategy: StrategyName::Buttons },
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    println!("Starting fuzz session on seed {} for {} inputs...", args.seed, args.steps);
    let config = GameConfig { world_seed: args.seed, ..GameConfig::default() };
    let mut game = Game::new(
        config.clone(),
        replay_movement(config.tiling()),
        RecordingRenderer::new(),
        MemoryBlobStore::new(),
    )?;
    game.start(LaunchOptions { movement: Some(StrategyName::Buttons), reset: false });
    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);

    let mut merges = 0;
    for step in 0..args.steps {
        let input = random_input(&mut rng, game.player().cell, &config);
        let held_before = game.player().held_token;
        let player_before = game.player().cell;
        let cells_before = game.store().len();
        let outcome = game.apply(&input)?;

        match (input, outcome) {
            (SessionInput::Click { cell }, InputOutcome::Interaction(transition)) => {
                let distance = player_before.chebyshev(cell);
                let gated = matches!(transition, Transition::OutOfRange { .. });
                if gated != (distance > config.interaction_radius) {
                    bail!("step {step}: click at distance {distance} resolved to {transition:?}");
                }
                if gated && game.store().len() != cells_before {
                    bail!("step {step}: out-of-range click materialized {cell}");
                }
                if let Transition::Merge { consumed, result } = transition {
                    merges += 1;
                    if Some(consumed) != held_before || result.value() != consumed.value() * 2 {
                        bail!("step {step}: merge of {consumed} produced {result}");
                    }
                }
            }
            (SessionInput::Click { .. }, other) => {
                bail!("step {step}: click produced {other:?}");
            }
            _ => {}
        }

        // Assert invariants
        if game.movement().live_count() > 1 {
            bail!("step {step}: more than one movement strategy is live");
        }
        for (coord, cell) in game.store().iter() {
            if cell.value == 0 || !cell.value.is_power_of_two() {
                bail!("step {step}: cell {coord} holds value {}", cell.value);
            }
        }
        for coord in game.viewport().rendered_coords() {
            let Some(cell) = game.store().get(coord) else {
                bail!("step {step}: rendered cell {coord} is not in the store");
            };
            let drawn = game.renderer().token_at(coord);
            if drawn != cell.token() {
                bail!("step {step}: {coord} shows {drawn:?} but holds {:?}", cell.token());
            }
        }
        if game.renderer().status() != game.status_text() {
            bail!("step {step}: status line is stale");
        }
    }

    game.shutdown();
    println!(
        "Fuzzing completed successfully: {} merges, {} cells, snapshot hash 0x{:016x}",
        merges,
        game.store().len(),
        game.snapshot_hash()
    );
    Ok(())
}
