//! Host inputs as data: the one-line text form typed at the console and the
//! JSON journal replayed by the tools.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grid::{LatLng, LatLngBounds};
use crate::movement::{StrategyName, UnknownStrategy};
use crate::types::{CellCoord, Direction, UnknownDirection};

pub const JOURNAL_FORMAT_VERSION: u16 = 1;

/// One event delivered to the game controller.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionInput {
    Click { cell: CellCoord },
    Step { direction: Direction },
    Position { fix: LatLng },
    ViewChanged { bounds: LatLngBounds },
    Activate { strategy: StrategyName },
    Deactivate,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputParseError {
    #[error("empty input")]
    Empty,
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("`{command}` needs a {argument}")]
    MissingArgument { command: &'static str, argument: &'static str },
    #[error("`{command}` got an unexpected extra argument '{extra}'")]
    TrailingArgument { command: String, extra: String },
    #[error("{argument} '{raw}' is not a number")]
    InvalidNumber { argument: &'static str, raw: String },
    #[error(transparent)]
    Direction(#[from] UnknownDirection),
    #[error(transparent)]
    Strategy(#[from] UnknownStrategy),
}

fn word<'a>(
    words: &mut impl Iterator<Item = &'a str>,
    command: &'static str,
    argument: &'static str,
) -> Result<&'a str, InputParseError> {
    words.next().ok_or(InputParseError::MissingArgument { command, argument })
}

fn number<'a, T: FromStr>(
    words: &mut impl Iterator<Item = &'a str>,
    command: &'static str,
    argument: &'static str,
) -> Result<T, InputParseError> {
    let raw = word(words, command, argument)?;
    raw.parse().map_err(|_| InputParseError::InvalidNumber { argument, raw: raw.to_string() })
}

impl FromStr for SessionInput {
    type Err = InputParseError;

    /// `click I J`, `step DIR` (or a bare `n`/`s`/`e`/`w`), `pos LAT LNG`,
    /// `view SOUTH WEST NORTH EAST`, `use STRATEGY`, `stop`, `reset`.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = words.next().ok_or(InputParseError::Empty)?.to_ascii_lowercase();

        let input = match command.as_str() {
            "click" | "c" => Self::Click {
                cell: CellCoord::new(
                    number(&mut words, "click", "column (i)")?,
                    number(&mut words, "click", "row (j)")?,
                ),
            },
            "step" => Self::Step { direction: word(&mut words, "step", "direction")?.parse()? },
            "pos" | "position" => Self::Position {
                fix: LatLng::new(
                    number(&mut words, "pos", "latitude")?,
                    number(&mut words, "pos", "longitude")?,
                ),
            },
            "view" => {
                let south = number(&mut words, "view", "south latitude")?;
                let west = number(&mut words, "view", "west longitude")?;
                let north = number(&mut words, "view", "north latitude")?;
                let east = number(&mut words, "view", "east longitude")?;
                Self::ViewChanged {
                    bounds: LatLngBounds::new(LatLng::new(south, west), LatLng::new(north, east)),
                }
            }
            "use" => Self::Activate { strategy: word(&mut words, "use", "strategy")?.parse()? },
            "stop" => Self::Deactivate,
            "reset" => Self::Reset,
            other => match other.parse::<Direction>() {
                Ok(direction) => Self::Step { direction },
                Err(_) => return Err(InputParseError::UnknownCommand(other.to_string())),
            },
        };

        if let Some(extra) = words.next() {
            return Err(InputParseError::TrailingArgument { command, extra: extra.to_string() });
        }
        Ok(input)
    }
}

impl fmt::Display for SessionInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Click { cell } => write!(f, "click {} {}", cell.i, cell.j),
            Self::Step { direction } => write!(f, "step {}", direction_word(*direction)),
            Self::Position { fix } => write!(f, "pos {} {}", fix.lat, fix.lng),
            Self::ViewChanged { bounds } => write!(
                f,
                "view {} {} {} {}",
                bounds.south_west.lat,
                bounds.south_west.lng,
                bounds.north_east.lat,
                bounds.north_east.lng
            ),
            Self::Activate { strategy } => write!(f, "use {strategy}"),
            Self::Deactivate => f.write_str("stop"),
            Self::Reset => f.write_str("reset"),
        }
    }
}

fn direction_word(direction: Direction) -> &'static str {
    match direction {
        Direction::North => "north",
        Direction::South => "south",
        Direction::East => "east",
        Direction::West => "west",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {source}")]
pub struct ScriptError {
    pub line: usize,
    #[source]
    pub source: InputParseError,
}

/// A recorded session: the world it was played in and every input, in order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputJournal {
    pub format_version: u16,
    pub world_seed: u64,
    pub inputs: Vec<SessionInput>,
}

impl InputJournal {
    pub fn new(world_seed: u64) -> Self {
        Self { format_version: JOURNAL_FORMAT_VERSION, world_seed, inputs: Vec::new() }
    }

    pub fn push(&mut self, input: SessionInput) {
        self.inputs.push(input);
    }

    /// Parse a text script, one input per line. Blank lines and `#` comments
    /// are skipped.
    pub fn from_script(world_seed: u64, script: &str) -> Result<Self, ScriptError> {
        let mut journal = Self::new(world_seed);
        for (index, raw) in script.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            let input = line
                .parse::<SessionInput>()
                .map_err(|source| ScriptError { line: index + 1, source })?;
            journal.push(input);
        }
        Ok(journal)
    }
}
