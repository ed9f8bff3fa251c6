//! Pickup / merge / drop rules for a click on one cell.
//!
//! `resolve` is the pure transition table; `interact` applies it to a
//! `GameState`. Rendering and persistence are the controller's job.

use crate::state::GameState;
use crate::types::{CellCoord, CellState, InvariantError, PlayerState, Token};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Target is farther than the interaction radius from the player.
    OutOfRange { distance: u32 },
    /// Empty cell and empty hands.
    Nothing,
    PickUp { token: Token },
    Drop { token: Token },
    Merge { consumed: Token, result: Token },
    /// Held token differs from the cell's, or the merge would overflow.
    Blocked { held: Token, cell: Token },
}

impl Transition {
    pub fn changes_state(self) -> bool {
        matches!(self, Self::PickUp { .. } | Self::Drop { .. } | Self::Merge { .. })
    }
}

/// Decide what a click on `target` does. The range gate is measured from the
/// player's current cell and applies to every kind of transition.
pub fn resolve(
    player: &PlayerState,
    target: CellCoord,
    cell: CellState,
    radius: u32,
) -> Transition {
    let distance = player.cell.chebyshev(target);
    if distance > radius {
        return Transition::OutOfRange { distance };
    }

    match (player.held_token, cell.token()) {
        (None, None) => Transition::Nothing,
        (None, Some(token)) => Transition::PickUp { token },
        (Some(token), None) => Transition::Drop { token },
        (Some(held), Some(cell)) if held == cell => match held.doubled() {
            Some(result) => Transition::Merge { consumed: held, result },
            None => Transition::Blocked { held, cell },
        },
        (Some(held), Some(cell)) => Transition::Blocked { held, cell },
    }
}

/// Held token and cell state after `transition`.
pub fn next_state(
    transition: Transition,
    held: Option<Token>,
    cell: CellState,
) -> (Option<Token>, CellState) {
    match transition {
        Transition::PickUp { token } => (Some(token), cell.emptied()),
        Transition::Drop { token } => (None, CellState::occupied(token)),
        Transition::Merge { result, .. } => (Some(result), cell.emptied()),
        Transition::OutOfRange { .. } | Transition::Nothing | Transition::Blocked { .. } => {
            (held, cell)
        }
    }
}

/// Apply a click to the state. Out-of-range targets are rejected before the
/// store is consulted, so far-away cells are never materialized by a click.
pub fn interact(
    state: &mut GameState,
    target: CellCoord,
    radius: u32,
) -> Result<Transition, InvariantError> {
    let distance = state.player.cell.chebyshev(target);
    if distance > radius {
        return Ok(Transition::OutOfRange { distance });
    }

    let cell = state.store.get_or_create(target);
    let transition = resolve(&state.player, target, cell, radius);
    if transition.changes_state() {
        let (held, next_cell) = next_state(transition, state.player.held_token, cell);
        state.store.set(target, next_cell)?;
        state.player.held_token = held;
    }
    Ok(transition)
}

pub fn is_win(held: Option<Token>, win_value: u32) -> bool {
    held.is_some_and(|token| token.value() >= win_value)
}

pub fn status_text(held: Option<Token>, win_value: u32) -> String {
    let mut text = match held {
        Some(token) => format!("Holding: {token}"),
        None => "Holding: —".to_string(),
    };
    if is_win(held, win_value) {
        text.push_str(" 🎉 YOU WIN!");
    }
    text
}
