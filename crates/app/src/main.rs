use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use app::app_loop::{self, Session};
use app::blob_file::FileBlobStore;
use app::console::{ConsoleRenderer, console_movement};
use app::launch::Args;
use app::{format_snapshot_hash, init_tracing};
use clap::Parser;
use merge_core::{Game, SessionStart};
use tracing::{info, warn};

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let data_dir: PathBuf = match &args.data_dir {
        Some(dir) => dir.clone(),
        None => FileBlobStore::get_default_dir()
            .ok_or_else(|| anyhow!("no home directory found; pass --data-dir"))?,
    };
    let config = args.resolve_config(&data_dir)?;
    info!(data_dir = %data_dir.display(), world_seed = config.world_seed, "launching");

    let mut game = Game::new(
        config.clone(),
        console_movement(config.tiling()),
        ConsoleRenderer::new(),
        FileBlobStore::new(&data_dir),
    )
    .context("invalid game configuration")?;
    let start = game.start(args.launch_options());
    if start == SessionStart::Restored && args.journal_out.is_some() {
        warn!("journal_starts_from_restored_save");
    }

    let mut session = Session::new(game);
    match &args.script {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open script: {}", path.display()))?;
            app_loop::run(&mut session, BufReader::new(file), io::stdout().lock())?;
        }
        None => app_loop::run(&mut session, io::stdin().lock(), io::stdout().lock())?,
    }

    let (mut game, journal) = session.into_parts();
    game.shutdown();
    info!(snapshot_hash = %format_snapshot_hash(game.snapshot_hash()), "final_state");

    if let Some(path) = &args.journal_out {
        let json = serde_json::to_string_pretty(&journal)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write journal: {}", path.display()))?;
        info!(path = %path.display(), inputs = journal.inputs.len(), "journal_written");
    }
    Ok(())
}
