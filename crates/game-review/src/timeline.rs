//! The recorded game: an ordered move list plus per-move position snapshots.

use crate::oracle::{CoordinateMove, RulesError, RulesOracle, Side, StandardBoard};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors building or checking a timeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimelineError {
    /// The start position could not be decoded.
    #[error("Invalid start position: {0}")]
    InvalidStart(#[source] RulesError),
    /// A move could not be read or played at the given ply.
    #[error("Move {index} ('{text}') rejected: {source}")]
    BadMove {
        index: usize,
        text: String,
        #[source]
        source: RulesError,
    },
    /// A stored snapshot no longer matches a replay of its prefix.
    #[error("Snapshot mismatch at ply {0}")]
    SnapshotMismatch(Ply),
}

/// Position index within a game.
///
/// `Ply::START` (-1) is the position before any move; `Ply(i)` for `i >= 0`
/// is the position after move `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ply(pub i32);

impl Ply {
    pub const START: Ply = Ply(-1);

    /// Position of the move list this ply refers to, if any.
    pub fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }

    pub fn from_index(index: usize) -> Self {
        Ply(index as i32)
    }

    pub fn previous(self) -> Ply {
        Ply(self.0 - 1)
    }

    pub fn next(self) -> Ply {
        Ply(self.0 + 1)
    }

    /// Side to move in the position at this ply, for a game whose start
    /// position has `first` to move.
    pub fn side_to_move(self, first: Side) -> Side {
        if (self.0 + 1).rem_euclid(2) == 0 {
            first
        } else {
            first.opposite()
        }
    }

    /// Full-move number of the move played at this ply (1-based).
    pub fn move_number(self) -> u32 {
        (self.0.max(0) / 2 + 1) as u32
    }
}

impl fmt::Display for Ply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One played move, immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move {
    pub ply: Ply,
    pub coordinate: CoordinateMove,
    /// Color of the player who made the move.
    pub side: Side,
    /// SAN label.
    pub san: String,
    /// Encoded position after the move.
    pub fen_after: String,
}

impl Move {
    /// Coordinate form, e.g. `e2e4` or `e7e8q`.
    pub fn uci(&self) -> String {
        self.coordinate.to_string()
    }
}

/// An ordered list of played moves with a snapshot after each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameTimeline {
    start_fen: String,
    start_side: Side,
    moves: Vec<Move>,
}

impl GameTimeline {
    /// Build from coordinate moves (`e2e4 e7e5 ...`) played from the standard start.
    pub fn from_coordinate_moves<S: AsRef<str>>(moves: &[S]) -> Result<Self, TimelineError> {
        Self::build::<StandardBoard, S>(None, moves, |board, text| board.decode(text))
    }

    /// Build from SAN moves (`e4 e5 Nf3 ...`) played from the standard start.
    pub fn from_san_moves<S: AsRef<str>>(moves: &[S]) -> Result<Self, TimelineError> {
        Self::build::<StandardBoard, S>(None, moves, |board, text| board.decode_san(text))
    }

    /// Build from free-form move text.
    ///
    /// Accepts SAN or coordinate notation token by token and skips move
    /// numbers (`1.`, `12...`), comments in braces, and game results.
    pub fn from_move_text(start_fen: Option<&str>, text: &str) -> Result<Self, TimelineError> {
        let tokens = tokenize_move_text(text);
        Self::build::<StandardBoard, &str>(start_fen, &tokens, |board, token| {
            board.decode(token).or_else(|_| board.decode_san(token))
        })
    }

    fn build<O, S>(
        start_fen: Option<&str>,
        moves: &[S],
        decode: impl Fn(&O, &str) -> Result<CoordinateMove, RulesError>,
    ) -> Result<Self, TimelineError>
    where
        O: RulesOracle,
        S: AsRef<str>,
    {
        let mut builder = TimelineBuilder::<O>::new(start_fen)?;
        for (index, text) in moves.iter().enumerate() {
            let text = text.as_ref();
            let bad_move = |source| TimelineError::BadMove {
                index,
                text: text.to_string(),
                source,
            };
            let mv = decode(builder.board(), text).map_err(bad_move)?;
            builder.push(&mv).map_err(bad_move)?;
        }
        Ok(builder.finish())
    }

    /// Encoded start position (ply -1).
    pub fn start_fen(&self) -> &str {
        &self.start_fen
    }

    /// Side to move in the start position.
    pub fn start_side(&self) -> Side {
        self.start_side
    }

    /// Side to move in the position at `ply`.
    pub fn side_to_move(&self, ply: Ply) -> Side {
        ply.side_to_move(self.start_side)
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    /// The move played at `ply`, if `ply >= 0` and in range.
    pub fn get(&self, ply: Ply) -> Option<&Move> {
        ply.index().and_then(|i| self.moves.get(i))
    }

    /// Encoded position at `ply` (`Ply::START` gives the start snapshot).
    pub fn snapshot(&self, ply: Ply) -> Option<&str> {
        if ply == Ply::START {
            Some(&self.start_fen)
        } else {
            self.get(ply).map(|m| m.fen_after.as_str())
        }
    }

    /// Replay every move from the start and check each stored snapshot.
    pub fn verify<O: RulesOracle>(&self) -> Result<(), TimelineError> {
        let mut board = O::from_encoded(&self.start_fen).map_err(TimelineError::InvalidStart)?;
        for (index, mv) in self.moves.iter().enumerate() {
            board
                .apply(&mv.coordinate)
                .map_err(|source| TimelineError::BadMove {
                    index,
                    text: mv.uci(),
                    source,
                })?;
            if board.encode() != mv.fen_after {
                return Err(TimelineError::SnapshotMismatch(mv.ply));
            }
        }
        Ok(())
    }
}

/// Appends moves one at a time through a rules oracle.
pub struct TimelineBuilder<O: RulesOracle = StandardBoard> {
    board: O,
    start_fen: String,
    start_side: Side,
    moves: Vec<Move>,
}

impl<O: RulesOracle> TimelineBuilder<O> {
    /// Start from `start_fen`, or the standard position when `None`.
    pub fn new(start_fen: Option<&str>) -> Result<Self, TimelineError> {
        let board = match start_fen {
            Some(fen) => O::from_encoded(fen).map_err(TimelineError::InvalidStart)?,
            None => O::start(),
        };
        Ok(Self {
            start_fen: board.encode(),
            start_side: board.side_to_move(),
            board,
            moves: Vec::new(),
        })
    }

    /// Current position after all pushed moves.
    pub fn board(&self) -> &O {
        &self.board
    }

    /// Play and record one move.
    pub fn push(&mut self, mv: &CoordinateMove) -> Result<&Move, RulesError> {
        let applied = self.board.apply(mv)?;
        self.moves.push(Move {
            ply: Ply::from_index(self.moves.len()),
            coordinate: applied.coordinate,
            side: applied.side,
            san: applied.san,
            fen_after: self.board.encode(),
        });
        Ok(&self.moves[self.moves.len() - 1])
    }

    pub fn finish(self) -> GameTimeline {
        GameTimeline {
            start_fen: self.start_fen,
            start_side: self.start_side,
            moves: self.moves,
        }
    }
}

fn tokenize_move_text(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut in_comment = false;

    for raw in text.split_whitespace() {
        if in_comment {
            if raw.contains('}') {
                in_comment = false;
            }
            continue;
        }
        if raw.starts_with('{') {
            in_comment = !raw.contains('}');
            continue;
        }
        if matches!(raw, "1-0" | "0-1" | "1/2-1/2" | "*") {
            continue;
        }

        // "12." or "12..." alone, or glued to the move as "1.e4"
        let token = raw.trim_start_matches(|c: char| c.is_ascii_digit());
        let token = if token.len() < raw.len() && token.starts_with('.') {
            token.trim_start_matches('.')
        } else {
            raw
        };
        if !token.is_empty() {
            tokens.push(token);
        }
    }
    tokens
}
