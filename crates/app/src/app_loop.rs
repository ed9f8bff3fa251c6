use std::io::{self, BufRead, Write};
use std::str::FromStr;

use merge_core::{
    BlobStore, Game, InputJournal, InputOutcome, InputParseError, SessionInput, Transition,
};
use tracing::{error, info};

use crate::console::ConsoleRenderer;

pub const HELP: &str = "\
commands:
  click I J             interact with cell (I, J)
  n | s | e | w         step one cell (buttons movement)
  pos LAT LNG           feed a position fix (geolocation movement)
  view S W N E          report the visible map bounds
  use buttons|geolocation
  stop                  stop the active movement strategy
  reset                 start over in a fresh world
  map [RADIUS]          draw the cells around the player
  status | save | help | quit";

const DEFAULT_MAP_RADIUS: i32 = 4;
const MAX_MAP_RADIUS: i32 = 40;

/// One line typed at the console.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConsoleCommand {
    Input(SessionInput),
    Status,
    Map { radius: i32 },
    Save,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = InputParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = match words.next().map(str::to_ascii_lowercase).as_deref() {
            Some("status") => Self::Status,
            Some("save") => Self::Save,
            Some("help" | "?") => Self::Help,
            Some("quit" | "exit" | "q") => Self::Quit,
            Some("map") => {
                let radius = match words.next() {
                    Some(raw) => raw.parse::<i32>().map_err(|_| InputParseError::InvalidNumber {
                        argument: "map radius",
                        raw: raw.to_string(),
                    })?,
                    None => DEFAULT_MAP_RADIUS,
                };
                return Ok(Self::Map { radius: radius.clamp(0, MAX_MAP_RADIUS) });
            }
            _ => return line.parse::<SessionInput>().map(Self::Input),
        };
        if let Some(extra) = words.next() {
            return Err(InputParseError::TrailingArgument {
                command: line.split_whitespace().next().unwrap_or_default().to_string(),
                extra: extra.to_string(),
            });
        }
        Ok(command)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Quit,
}

/// A running game plus the journal of every input it accepted.
pub struct Session<B: BlobStore> {
    game: Game<ConsoleRenderer, B>,
    journal: InputJournal,
}

impl<B: BlobStore> Session<B> {
    /// Wrap a started game. The journal records the world the game is in now.
    pub fn new(game: Game<ConsoleRenderer, B>) -> Self {
        let journal = InputJournal::new(game.snapshot().world_seed);
        Self { game, journal }
    }

    pub fn game(&self) -> &Game<ConsoleRenderer, B> {
        &self.game
    }

    pub fn journal(&self) -> &InputJournal {
        &self.journal
    }

    pub fn into_parts(self) -> (Game<ConsoleRenderer, B>, InputJournal) {
        (self.game, self.journal)
    }

    /// Handle one console line and produce the reply to print.
    pub fn handle_line(&mut self, line: &str) -> (LoopControl, String) {
        let line = line.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            return (LoopControl::Continue, String::new());
        }

        let command = match line.parse::<ConsoleCommand>() {
            Ok(command) => command,
            Err(err) => return (LoopControl::Continue, format!("? {err} (try `help`)")),
        };

        let reply = match command {
            ConsoleCommand::Input(input) => self.apply(input),
            ConsoleCommand::Status => format!(
                "{} at {} | movement: {} | {}",
                self.game.status_text(),
                self.game.player().cell,
                self.game.active_movement().map_or("none", |name| name.as_str()),
                self.game.renderer().describe_view(),
            ),
            ConsoleCommand::Map { radius } => {
                self.game.renderer().ascii_map(self.game.player().cell, radius)
            }
            ConsoleCommand::Save => {
                if self.game.save() {
                    "saved".to_string()
                } else {
                    "save failed (see log)".to_string()
                }
            }
            ConsoleCommand::Help => HELP.to_string(),
            ConsoleCommand::Quit => return (LoopControl::Quit, "bye".to_string()),
        };
        (LoopControl::Continue, reply)
    }

    fn apply(&mut self, input: SessionInput) -> String {
        match self.game.apply(&input) {
            Ok(outcome) => {
                self.journal.push(input);
                describe(&outcome, &self.game.status_text())
            }
            Err(err) => {
                error!(%input, error = %err, "input_rejected");
                format!("! {input} was rejected: {err}")
            }
        }
    }
}

fn describe(outcome: &InputOutcome, status: &str) -> String {
    match outcome {
        InputOutcome::Interaction(transition) => {
            let what = match transition {
                Transition::OutOfRange { distance } => {
                    format!("too far away ({distance} cells)")
                }
                Transition::Nothing => "nothing here".to_string(),
                Transition::PickUp { token } => format!("picked up {token}"),
                Transition::Drop { token } => format!("dropped {token}"),
                Transition::Merge { consumed, result } => {
                    format!("merged {consumed} into {result}")
                }
                Transition::Blocked { held, cell } => {
                    format!("cannot merge: holding {held}, cell has {cell}")
                }
            };
            format!("{what} | {status}")
        }
        InputOutcome::Moved(Some(cell)) => format!("moved to {cell}"),
        InputOutcome::Moved(None) => "no move".to_string(),
        InputOutcome::View(diff) => {
            format!("view: {} drawn, {} removed", diff.created.len(), diff.evicted.len())
        }
        InputOutcome::ViewRefused(err) => format!("view refused: {err}"),
        InputOutcome::MovementActivated(name) => format!("movement: {name}"),
        InputOutcome::MovementRefused(err) => format!("movement unchanged: {err}"),
        InputOutcome::MovementStopped => "movement stopped".to_string(),
        InputOutcome::Reset => format!("new world | {status}"),
    }
}

/// Read lines until `quit` or end of input, writing one reply per line.
pub fn run<B: BlobStore>(
    session: &mut Session<B>,
    reader: impl BufRead,
    mut writer: impl Write,
) -> io::Result<()> {
    writeln!(writer, "{} at {}", session.game.status_text(), session.game.player().cell)?;
    for line in reader.lines() {
        let (control, reply) = session.handle_line(&line?);
        if !reply.is_empty() {
            writeln!(writer, "{reply}")?;
        }
        if control == LoopControl::Quit {
            break;
        }
    }
    writer.flush()?;
    info!(inputs = session.journal.inputs.len(), "console_session_ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use merge_core::replay::replay_movement;
    use merge_core::{
        CellCoord, GameConfig, LatLng, LaunchOptions, MemoryBlobStore, StrategyName,
    };
    use std::io::Cursor;

    fn small_session() -> Session<MemoryBlobStore> {
        let config = GameConfig {
            tile_degrees: 1.0,
            origin: LatLng::new(0.5, 0.5),
            fixed_view_radius: Some(3),
            token_probability: 1.0,
            value_tiers: Vec::new(),
            win_value: 4,
            ..GameConfig::default()
        };
        let mut game = Game::new(
            config.clone(),
            replay_movement(config.tiling()),
            ConsoleRenderer::new(),
            MemoryBlobStore::new(),
        )
        .expect("valid config");
        game.start(LaunchOptions { movement: Some(StrategyName::Buttons), reset: false });
        Session::new(game)
    }

    #[test]
    fn console_commands_parse() {
        assert_eq!("status".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Status));
        assert_eq!("Q".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Quit));
        assert_eq!("map".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Map { radius: 4 }));
        assert_eq!("map 500".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Map { radius: 40 }));
        assert_eq!(
            "c 1 2".parse::<ConsoleCommand>(),
            Ok(ConsoleCommand::Input(SessionInput::Click { cell: CellCoord::new(1, 2) }))
        );
        assert!(matches!(
            "save now".parse::<ConsoleCommand>(),
            Err(InputParseError::TrailingArgument { .. })
        ));
        assert!("map far".parse::<ConsoleCommand>().is_err());
    }

    #[test]
    fn accepted_inputs_are_journaled_and_queries_are_not() {
        let mut session = small_session();

        let (_, reply) = session.handle_line("click 0 0");
        assert_eq!(reply, "picked up 1 | Holding: 1");
        let (_, reply) = session.handle_line("click 0 1");
        assert_eq!(reply, "merged 1 into 2 | Holding: 2");
        session.handle_line("status");
        session.handle_line("map 2");
        let (_, reply) = session.handle_line("bogus");
        assert!(reply.starts_with("? unknown command"), "{reply}");
        let (_, reply) = session.handle_line("click 9 9");
        assert_eq!(reply, "too far away (9 cells) | Holding: 2");
        session.handle_line("   # just a comment");

        assert_eq!(
            session.journal().inputs,
            vec![
                SessionInput::Click { cell: CellCoord::new(0, 0) },
                SessionInput::Click { cell: CellCoord::new(0, 1) },
                SessionInput::Click { cell: CellCoord::new(9, 9) },
            ]
        );
    }

    #[test]
    fn map_marks_the_player_and_emptied_cells() {
        let mut session = small_session();
        session.handle_line("click 1 0");
        let (_, map) = session.handle_line("map 1");
        assert_eq!(map, "111\n1@.\n111\n");
    }

    #[test]
    fn off_globe_fixes_do_not_move_the_player() {
        let mut session = small_session();
        session.handle_line("use geolocation");
        let (_, reply) = session.handle_line("pos 1e300 1e300");
        assert_eq!(reply, "no move");
        assert_eq!(session.game().player().cell, CellCoord::ORIGIN);
        let (_, map) = session.handle_line("map 1");
        assert_eq!(map.lines().nth(1), Some("1@1"));
    }

    #[test]
    fn run_stops_at_quit_and_reports_each_line() {
        let mut session = small_session();
        let input = Cursor::new("n\nuse geolocation\npos 2.5 0.5\nquit\nclick 0 0\n");
        let mut output = Vec::new();
        run(&mut session, input, &mut output).expect("in-memory io");

        let text = String::from_utf8(output).expect("utf8 output");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Holding: — at 0,0",
                "moved to 0,1",
                "movement: geolocation",
                "moved to 0,2",
                "bye",
            ]
        );
        assert_eq!(session.journal().inputs.len(), 3);
        assert_eq!(session.game().player().cell, CellCoord::new(0, 2));
    }
}
