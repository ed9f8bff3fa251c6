//! Command-line launch options and the optional TOML config file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use merge_core::{GameConfig, LaunchOptions, StrategyName};
use tracing::info;

pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(author, version, about = "Console front end for the map merge game", long_about = None)]
pub struct Args {
    /// Movement strategy to activate at launch (buttons or geolocation)
    #[arg(short, long)]
    pub movement: Option<StrategyName>,

    /// Discard any saved game before starting
    #[arg(long)]
    pub reset: bool,

    /// World seed, overriding the config file
    #[arg(long)]
    pub seed: Option<u64>,

    /// Config file (defaults to config.toml in the data directory, if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory holding the save file and the default config file
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Read commands from this file instead of standard input
    #[arg(long)]
    pub script: Option<PathBuf>,

    /// Write every accepted input to this JSON journal on exit
    #[arg(long)]
    pub journal_out: Option<PathBuf>,
}

impl Args {
    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions { movement: self.movement, reset: self.reset }
    }

    /// Config file contents with command-line overrides applied, validated.
    pub fn resolve_config(&self, data_dir: &Path) -> Result<GameConfig> {
        let mut config = match &self.config {
            Some(path) => load_config_file(path)?,
            None => {
                let default_path = data_dir.join(CONFIG_FILE_NAME);
                if default_path.exists() {
                    load_config_file(&default_path)?
                } else {
                    GameConfig::default()
                }
            }
        };
        if let Some(seed) = self.seed {
            config.world_seed = seed;
        }
        config.validate().context("invalid game configuration")?;
        Ok(config)
    }
}

pub fn load_config_file(path: &Path) -> Result<GameConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: GameConfig = toml::from_str(&text)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    info!(path = %path.display(), "config_loaded");
    Ok(config)
}
