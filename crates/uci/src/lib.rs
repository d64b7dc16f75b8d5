//! UCI (Universal Chess Interface) protocol vocabulary for driving analysis engines.
//!
//! This crate covers the GUI side of the protocol: formatting the commands an
//! analysis front end sends, and parsing the lines an engine writes back.
//!
//! # Commands (GUI → engine)
//!
//! - `uci` - Handshake and identification
//! - `isready` / `readyok` - Synchronization
//! - `position fen <fen> [moves <move>...]` - Set position
//! - `go [movetime <ms>] [depth <d>]` - Start search
//! - `stop` - Stop search
//! - `quit` - Exit engine
//!
//! # Messages (engine → GUI)
//!
//! - `id name <name>` / `id author <author>`
//! - `info ... score {cp|mate} <v> [lowerbound|upperbound] ... depth <d> ... pv <moves>`
//! - `bestmove <move|(none)> [ponder <move>]`

mod command;
mod info;

pub use command::{GoOptions, GuiCommand};
pub use info::{Bound, EngineInfo, InfoBuilder, Score};

use std::fmt;
use thiserror::Error;

/// Token an engine sends in place of a move when the side to move has none.
pub const NO_MOVE: &str = "(none)";

#[derive(Error, Debug)]
pub enum UciError {
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// The move reported on a `bestmove` line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BestMove {
    /// A move in coordinate notation (e.g. `e2e4`, `e7e8q`).
    Move(String),
    /// The `(none)` sentinel: no legal move in the analyzed position.
    NoMove,
}

impl BestMove {
    /// Interpret a `bestmove` token.
    pub fn from_token(token: &str) -> Self {
        if token == NO_MOVE {
            BestMove::NoMove
        } else {
            BestMove::Move(token.to_string())
        }
    }

    /// The coordinate move, unless this is the sentinel.
    pub fn as_move(&self) -> Option<&str> {
        match self {
            BestMove::Move(mv) => Some(mv),
            BestMove::NoMove => None,
        }
    }
}

impl fmt::Display for BestMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BestMove::Move(mv) => f.write_str(mv),
            BestMove::NoMove => f.write_str(NO_MOVE),
        }
    }
}

/// Messages sent from engine to GUI.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    /// Engine identification.
    Id { name: Option<String>, author: Option<String> },
    /// UCI initialization complete.
    UciOk,
    /// Engine is ready.
    ReadyOk,
    /// Score-bearing search information.
    Info(EngineInfo),
    /// Best move found; terminates the running search.
    BestMove {
        best: Option<BestMove>,
        ponder: Option<String>,
    },
    /// Anything else (option declarations, info chatter without a score, ...).
    Other(String),
}

impl EngineMessage {
    /// Parse one line of engine output.
    ///
    /// Never fails: unrecognised or malformed lines become [`EngineMessage::Other`].
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let mut parts = line.split_whitespace();

        match parts.next() {
            Some("info") => match EngineInfo::parse(line) {
                Some(info) => EngineMessage::Info(info),
                None => EngineMessage::Other(line.to_string()),
            },
            Some("bestmove") => {
                let best = parts.next().map(BestMove::from_token);
                let ponder = match (parts.next(), parts.next()) {
                    (Some("ponder"), Some(mv)) => Some(mv.to_string()),
                    _ => None,
                };
                EngineMessage::BestMove { best, ponder }
            }
            Some("id") => {
                let rest: Vec<&str> = parts.collect();
                match rest.split_first() {
                    Some((&"name", value)) => EngineMessage::Id {
                        name: Some(value.join(" ")),
                        author: None,
                    },
                    Some((&"author", value)) => EngineMessage::Id {
                        name: None,
                        author: Some(value.join(" ")),
                    },
                    _ => EngineMessage::Other(line.to_string()),
                }
            }
            Some("uciok") => EngineMessage::UciOk,
            Some("readyok") => EngineMessage::ReadyOk,
            _ => EngineMessage::Other(line.to_string()),
        }
    }

    /// Format message for output.
    pub fn to_uci(&self) -> String {
        match self {
            EngineMessage::Id { name, author } => {
                let mut parts = Vec::new();
                if let Some(n) = name {
                    parts.push(format!("id name {}", n));
                }
                if let Some(a) = author {
                    parts.push(format!("id author {}", a));
                }
                parts.join("\n")
            }
            EngineMessage::UciOk => "uciok".to_string(),
            EngineMessage::ReadyOk => "readyok".to_string(),
            EngineMessage::Info(info) => info.to_uci(),
            EngineMessage::BestMove { best, ponder } => {
                let best = best
                    .as_ref()
                    .map(|b| b.to_string())
                    .unwrap_or_else(|| NO_MOVE.to_string());
                match ponder {
                    Some(p) => format!("bestmove {} ponder {}", best, p),
                    None => format!("bestmove {}", best),
                }
            }
            EngineMessage::Other(line) => line.clone(),
        }
    }
}
