//! Chess rules behind a narrow trait.
//!
//! The review core never implements chess rules itself. Everything it needs
//! (move legality, SAN labels, FEN encoding) goes through [`RulesOracle`].
//! [`StandardBoard`] is the shakmaty-backed implementation.

use serde::{Deserialize, Serialize};
use shakmaty::fen::Fen;
use shakmaty::san::{San, SanPlus};
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Position, Role, Square};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors reported by a rules oracle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RulesError {
    /// Text could not be read as a move.
    #[error("Invalid move notation: {0}")]
    InvalidNotation(String),
    /// Well-formed move that is not legal in the current position.
    #[error("Illegal move: {0}")]
    IllegalMove(String),
    /// Position encoding could not be decoded.
    #[error("Invalid position: {0}")]
    InvalidPosition(String),
    /// `revert` called with no applied move outstanding.
    #[error("No applied move to revert")]
    NothingToRevert,
}

/// Player color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }
}

impl From<shakmaty::Color> for Side {
    fn from(color: shakmaty::Color) -> Self {
        match color {
            shakmaty::Color::White => Side::White,
            shakmaty::Color::Black => Side::Black,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::White => f.write_str("white"),
            Side::Black => f.write_str("black"),
        }
    }
}

/// A move in coordinate notation: origin, destination, optional promotion.
///
/// Castling is written as the king's two-square step (`e1g1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoordinateMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Role>,
}

impl FromStr for CoordinateMove {
    type Err = RulesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RulesError::InvalidNotation(s.to_string());
        let bytes = s.as_bytes();
        if bytes.len() != 4 && bytes.len() != 5 {
            return Err(invalid());
        }

        let from = Square::from_ascii(&bytes[0..2]).map_err(|_| invalid())?;
        let to = Square::from_ascii(&bytes[2..4]).map_err(|_| invalid())?;
        let promotion = match bytes.get(4) {
            Some(&b) => Some(Role::from_char(char::from(b).to_ascii_lowercase()).ok_or_else(invalid)?),
            None => None,
        };

        Ok(CoordinateMove {
            from,
            to,
            promotion,
        })
    }
}

impl fmt::Display for CoordinateMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(role) = self.promotion {
            write!(f, "{}", role.char())?;
        }
        Ok(())
    }
}

/// What applying a move produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    /// Normalized coordinate form of the played move.
    pub coordinate: CoordinateMove,
    /// SAN label in the position before the move, with `+`/`#` suffix.
    pub san: String,
    /// Color of the player who made the move.
    pub side: Side,
}

/// Rules capabilities the review core relies on.
pub trait RulesOracle: Clone + Send + Sync + 'static {
    /// Standard starting position.
    fn start() -> Self;

    /// Position from its text encoding (FEN).
    fn from_encoded(encoded: &str) -> Result<Self, RulesError>;

    /// Text encoding (FEN) of the current position.
    fn encode(&self) -> String;

    fn side_to_move(&self) -> Side;

    /// Read and validate a coordinate move against the current position.
    fn decode(&self, text: &str) -> Result<CoordinateMove, RulesError>;

    /// Read and validate a SAN move against the current position.
    fn decode_san(&self, san: &str) -> Result<CoordinateMove, RulesError>;

    /// SAN label of a legal move in the current position.
    fn label(&self, mv: &CoordinateMove) -> Result<String, RulesError>;

    /// Play a legal move, remembering the prior position for [`Self::revert`].
    fn apply(&mut self, mv: &CoordinateMove) -> Result<AppliedMove, RulesError>;

    /// Undo the most recent [`Self::apply`].
    fn revert(&mut self) -> Result<(), RulesError>;
}

/// Apply `mv`, inspect the resulting position, then revert.
///
/// The board is left exactly as it was whenever this returns `Ok`.
pub fn speculate<O, T, F>(board: &mut O, mv: &CoordinateMove, inspect: F) -> Result<T, RulesError>
where
    O: RulesOracle,
    F: FnOnce(&O, &AppliedMove) -> T,
{
    let applied = board.apply(mv)?;
    let out = inspect(board, &applied);
    board.revert()?;
    Ok(out)
}

/// Standard chess via shakmaty, with a checkpoint stack for revert.
#[derive(Debug, Clone, Default)]
pub struct StandardBoard {
    position: Chess,
    checkpoints: Vec<Chess>,
}

impl StandardBoard {
    pub fn position(&self) -> &Chess {
        &self.position
    }

    fn resolve(&self, mv: &CoordinateMove) -> Result<shakmaty::Move, RulesError> {
        let uci = UciMove::Normal {
            from: mv.from,
            to: mv.to,
            promotion: mv.promotion,
        };
        uci.to_move(&self.position)
            .map_err(|_| RulesError::IllegalMove(mv.to_string()))
    }

    fn coordinate_of(m: &shakmaty::Move) -> Result<CoordinateMove, RulesError> {
        match m.to_uci(CastlingMode::Standard) {
            UciMove::Normal {
                from,
                to,
                promotion,
            } => Ok(CoordinateMove {
                from,
                to,
                promotion,
            }),
            other => Err(RulesError::IllegalMove(other.to_string())),
        }
    }

    fn san_of(&self, m: &shakmaty::Move) -> String {
        let mut san = San::from_move(&self.position, m.clone()).to_string();
        let mut after = self.position.clone();
        after.play_unchecked(m.clone());
        if after.is_checkmate() {
            san.push('#');
        } else if after.is_check() {
            san.push('+');
        }
        san
    }
}

impl RulesOracle for StandardBoard {
    fn start() -> Self {
        Self::default()
    }

    fn from_encoded(encoded: &str) -> Result<Self, RulesError> {
        let invalid = || RulesError::InvalidPosition(encoded.to_string());
        let fen: Fen = encoded.trim().parse().map_err(|_| invalid())?;
        let position: Chess = fen
            .into_position(CastlingMode::Standard)
            .map_err(|_| invalid())?;
        Ok(Self {
            position,
            checkpoints: Vec::new(),
        })
    }

    fn encode(&self) -> String {
        Fen::from_position(&self.position, EnPassantMode::Legal).to_string()
    }

    fn side_to_move(&self) -> Side {
        self.position.turn().into()
    }

    fn decode(&self, text: &str) -> Result<CoordinateMove, RulesError> {
        let mv: CoordinateMove = text.trim().parse()?;
        let legal = self.resolve(&mv)?;
        Self::coordinate_of(&legal)
    }

    fn decode_san(&self, san: &str) -> Result<CoordinateMove, RulesError> {
        let parsed: SanPlus = san
            .trim()
            .parse()
            .map_err(|_| RulesError::InvalidNotation(san.to_string()))?;
        let legal = parsed
            .san
            .to_move(&self.position)
            .map_err(|_| RulesError::IllegalMove(san.to_string()))?;
        Self::coordinate_of(&legal)
    }

    fn label(&self, mv: &CoordinateMove) -> Result<String, RulesError> {
        let legal = self.resolve(mv)?;
        Ok(self.san_of(&legal))
    }

    fn apply(&mut self, mv: &CoordinateMove) -> Result<AppliedMove, RulesError> {
        let legal = self.resolve(mv)?;
        let applied = AppliedMove {
            coordinate: Self::coordinate_of(&legal)?,
            san: self.san_of(&legal),
            side: self.side_to_move(),
        };
        self.checkpoints.push(self.position.clone());
        self.position.play_unchecked(legal);
        Ok(applied)
    }

    fn revert(&mut self) -> Result<(), RulesError> {
        self.position = self.checkpoints.pop().ok_or(RulesError::NothingToRevert)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    fn mv(text: &str) -> CoordinateMove {
        text.parse().unwrap()
    }

    #[test]
    fn test_coordinate_parse_and_display() {
        let m = mv("e7e8q");
        assert_eq!(m.from, Square::E7);
        assert_eq!(m.to, Square::E8);
        assert_eq!(m.promotion, Some(Role::Queen));
        assert_eq!(m.to_string(), "e7e8q");
        assert_eq!(mv("g1f3").to_string(), "g1f3");
    }

    #[test]
    fn test_coordinate_parse_rejects_garbage() {
        for bad in ["", "e2", "e2e9", "z2e4", "e2e4x", "e2e4qq"] {
            assert!(bad.parse::<CoordinateMove>().is_err(), "{bad}");
        }
    }

    #[test]
    fn test_start_encoding() {
        let board = StandardBoard::start();
        assert_eq!(board.encode(), START_FEN);
        assert_eq!(board.side_to_move(), Side::White);
    }

    #[test]
    fn test_from_encoded_rejects_garbage() {
        assert!(matches!(
            StandardBoard::from_encoded("not a fen"),
            Err(RulesError::InvalidPosition(_))
        ));
    }

    #[test]
    fn test_apply_and_revert() {
        let mut board = StandardBoard::start();
        let applied = board.apply(&mv("e2e4")).unwrap();
        assert_eq!(applied.san, "e4");
        assert_eq!(applied.side, Side::White);
        assert_eq!(board.side_to_move(), Side::Black);
        assert_ne!(board.encode(), START_FEN);

        board.revert().unwrap();
        assert_eq!(board.encode(), START_FEN);
        assert_eq!(board.revert(), Err(RulesError::NothingToRevert));
    }

    #[test]
    fn test_illegal_move_is_rejected_without_mutation() {
        let mut board = StandardBoard::start();
        assert!(matches!(
            board.apply(&mv("e2e5")),
            Err(RulesError::IllegalMove(_))
        ));
        assert_eq!(board.encode(), START_FEN);
    }

    #[test]
    fn test_decode_san_and_label() {
        let board = StandardBoard::start();
        let knight = board.decode_san("Nf3").unwrap();
        assert_eq!(knight.to_string(), "g1f3");
        assert_eq!(board.label(&knight).unwrap(), "Nf3");
        assert!(board.decode_san("Ke2").is_err());
        assert!(board.decode_san("??").is_err());
    }

    #[test]
    fn test_castling_uses_king_step() {
        let board = StandardBoard::from_encoded(
            "r3k2r/pppqbppp/2np1n2/4p3/2B1P1b1/2NP1N2/PPPQ1PPP/R3K2R w KQkq - 0 1",
        )
        .unwrap();
        let castle = board.decode_san("O-O").unwrap();
        assert_eq!(castle.to_string(), "e1g1");
        assert_eq!(board.label(&castle).unwrap(), "O-O");
        assert_eq!(board.decode("e1c1").unwrap().to_string(), "e1c1");
    }

    #[test]
    fn test_check_and_mate_suffixes() {
        let mut board = StandardBoard::start();
        for m in ["f2f3", "e7e5", "g2g4"] {
            board.apply(&mv(m)).unwrap();
        }
        assert_eq!(board.label(&mv("d8h4")).unwrap(), "Qh4#");

        let board = StandardBoard::from_encoded("4k3/8/8/8/8/8/8/R3K3 w - - 0 1").unwrap();
        assert_eq!(board.label(&mv("a1a8")).unwrap(), "Ra8+");
    }

    #[test]
    fn test_speculate_restores_position() {
        let mut board = StandardBoard::start();
        board.apply(&mv("d2d4")).unwrap();
        let before = board.encode();

        let label = speculate(&mut board, &mv("g8f6"), |after, applied| {
            assert_eq!(after.side_to_move(), Side::White);
            applied.san.clone()
        })
        .unwrap();

        assert_eq!(label, "Nf6");
        assert_eq!(board.encode(), before);
    }

    #[test]
    fn test_speculate_illegal_leaves_board() {
        let mut board = StandardBoard::start();
        let before = board.encode();
        assert!(speculate(&mut board, &mv("a1a5"), |_, _| ()).is_err());
        assert_eq!(board.encode(), before);
    }

    #[test]
    fn test_promotion_decodes_lowercase_and_uppercase() {
        let board = StandardBoard::from_encoded("8/4P3/8/8/8/8/k7/4K3 w - - 0 1").unwrap();
        assert_eq!(board.decode("e7e8Q").unwrap().to_string(), "e7e8q");
        assert_eq!(board.label(&mv("e7e8n")).unwrap(), "e8=N");
    }
}
