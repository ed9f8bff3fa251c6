use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Address of one cell on the unbounded grid.
///
/// `i` runs east (longitude), `j` runs north (latitude). The canonical text
/// form is `"{i},{j}"` and only appears at the persistence boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellCoord {
    pub i: i32,
    pub j: i32,
}

impl CellCoord {
    pub const ORIGIN: Self = Self { i: 0, j: 0 };

    pub const fn new(i: i32, j: i32) -> Self {
        Self { i, j }
    }

    /// `max(|di|, |dj|)` between two cells.
    pub fn chebyshev(self, other: Self) -> u32 {
        self.i.abs_diff(other.i).max(self.j.abs_diff(other.j))
    }

    pub fn stepped(self, direction: Direction) -> Self {
        let (di, dj) = direction.delta();
        Self { i: self.i.saturating_add(di), j: self.j.saturating_add(dj) }
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.i, self.j)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordParseError {
    #[error("cell key '{0}' is not of the form 'i,j'")]
    MissingSeparator(String),
    #[error("cell key '{key}' has a non-integer component: {source}")]
    NotAnInteger {
        key: String,
        #[source]
        source: ParseIntError,
    },
}

impl FromStr for CellCoord {
    type Err = CoordParseError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        let Some((raw_i, raw_j)) = key.split_once(',') else {
            return Err(CoordParseError::MissingSeparator(key.to_string()));
        };
        let parse = |raw: &str| {
            raw.trim().parse::<i32>().map_err(|source| CoordParseError::NotAnInteger {
                key: key.to_string(),
                source,
            })
        };
        Ok(Self { i: parse(raw_i)?, j: parse(raw_j)? })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub const ALL: [Self; 4] = [Self::North, Self::South, Self::East, Self::West];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::North => (0, 1),
            Self::South => (0, -1),
            Self::East => (1, 0),
            Self::West => (-1, 0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown direction '{0}' (expected north, south, east or west)")]
pub struct UnknownDirection(pub String);

impl FromStr for Direction {
    type Err = UnknownDirection;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "n" | "north" => Ok(Self::North),
            "s" | "south" => Ok(Self::South),
            "e" | "east" => Ok(Self::East),
            "w" | "west" => Ok(Self::West),
            _ => Err(UnknownDirection(raw.to_string())),
        }
    }
}

/// Raised whenever a token value that is not a power of two tries to enter
/// the game state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvariantError {
    #[error("token value {value} is not a power of two")]
    NotPowerOfTwo { value: u32 },
    #[error("token value {value} at cell {coord} is not a power of two")]
    CellNotPowerOfTwo { coord: CellCoord, value: u32 },
}

/// A token value. Always a power of two, never zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Token(u32);

impl Token {
    pub const ONE: Self = Self(1);

    pub fn new(value: u32) -> Option<Self> {
        value.is_power_of_two().then_some(Self(value))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// The merge result, or `None` once the value no longer fits in a `u32`.
    pub fn doubled(self) -> Option<Self> {
        self.0.checked_mul(2).map(Self)
    }
}

impl TryFrom<u32> for Token {
    type Error = InvariantError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvariantError::NotPowerOfTwo { value })
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authoritative per-cell state.
///
/// `value` stays a power of two even after the token is taken; the stale value
/// is kept so a known cell is never re-rolled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellState {
    pub has_token: bool,
    pub value: u32,
}

impl CellState {
    pub fn occupied(token: Token) -> Self {
        Self { has_token: true, value: token.value() }
    }

    /// The state after the token has left the cell.
    pub fn emptied(self) -> Self {
        Self { has_token: false, ..self }
    }

    pub fn token(self) -> Option<Token> {
        if self.has_token { Token::new(self.value) } else { None }
    }

    pub fn validate(self, coord: CellCoord) -> Result<(), InvariantError> {
        if self.value.is_power_of_two() {
            Ok(())
        } else {
            Err(InvariantError::CellNotPowerOfTwo { coord, value: self.value })
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub cell: CellCoord,
    pub held_token: Option<Token>,
}

impl PlayerState {
    pub fn at(cell: CellCoord) -> Self {
        Self { cell, held_token: None }
    }
}
