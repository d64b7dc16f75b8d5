//! Presentation model for a reviewed game.
//!
//! Combines the timeline with a result table into per-move rows ready for
//! display or JSON output. Classification and normalization happen here,
//! on demand, never while the session runs.

use crate::evaluation::{bound_prefix, EvalBar};
use crate::oracle::Side;
use crate::quality::{assess, Assessment, Classification, TierCounts};
use crate::results::ResultTable;
use crate::timeline::{GameTimeline, Ply};
use serde::Serialize;
use uci::Score;

/// Everything shown for one position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveReview {
    pub ply: Ply,
    /// Full-move number of the move that led here; 0 for the start position.
    pub number: u32,
    /// Who played the move; `None` for the start position.
    pub side: Option<Side>,
    pub san: Option<String>,
    pub uci: Option<String>,
    pub classification: Option<Classification>,
    pub glyph: &'static str,
    /// White-frame loss behind the classification.
    pub loss: Option<i32>,
    pub eval: EvalBar,
    /// `≥`/`≤` when the score is only a bound.
    pub bound_prefix: Option<&'static str>,
    /// True when the score is a mate distance.
    pub mate: bool,
    pub depth: Option<u32>,
    pub pv: Vec<String>,
    /// The engine's best move in this position.
    pub best_move: Option<String>,
    /// For mistakes and blunders: what the engine preferred instead.
    pub suggestion: Option<String>,
}

/// One line of the move table: a White move and the Black reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveRow {
    pub number: u32,
    /// Index into [`GameReview::moves`].
    pub white: Option<usize>,
    pub black: Option<usize>,
}

/// A whole game, reviewed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameReview {
    pub start: MoveReview,
    pub moves: Vec<MoveReview>,
    pub white: TierCounts,
    pub black: TierCounts,
}

impl GameReview {
    pub fn build(timeline: &GameTimeline, table: &ResultTable) -> Self {
        let start = Self::position_review(timeline, table, Ply::START);
        let mut white = TierCounts::default();
        let mut black = TierCounts::default();
        let first_number = move_number_offset(timeline);

        let moves = timeline
            .moves()
            .iter()
            .enumerate()
            .map(|(index, mv)| {
                let ply = mv.ply;
                let before = table.get(ply.previous());
                let assessment = assess(ply, mv, before, table.get(ply));
                if let Some(a) = assessment {
                    match mv.side {
                        Side::White => white.add(a),
                        Side::Black => black.add(a),
                    }
                }

                let suggestion = assessment
                    .filter(|a| a.classification.wants_suggestion())
                    .and_then(|_| before)
                    .and_then(|r| {
                        r.best_move_label
                            .clone()
                            .or_else(|| r.best_move_uci().map(str::to_string))
                    });

                MoveReview {
                    number: ((index + first_number) / 2 + 1) as u32,
                    side: Some(mv.side),
                    san: Some(mv.san.clone()),
                    uci: Some(mv.uci()),
                    classification: assessment.map(|a| a.classification),
                    glyph: assessment.map_or("", |a| a.classification.glyph()),
                    loss: assessment.map(|Assessment { loss, .. }| loss),
                    suggestion,
                    ..Self::position_review(timeline, table, ply)
                }
            })
            .collect();

        Self {
            start,
            moves,
            white,
            black,
        }
    }

    fn position_review(timeline: &GameTimeline, table: &ResultTable, ply: Ply) -> MoveReview {
        let result = table.get(ply);
        let to_move = timeline.side_to_move(ply);
        MoveReview {
            ply,
            number: 0,
            side: None,
            san: None,
            uci: None,
            classification: None,
            glyph: "",
            loss: None,
            eval: EvalBar::from_result(result, to_move),
            bound_prefix: result.and_then(|r| bound_prefix(r, to_move)),
            mate: matches!(result.and_then(|r| r.score), Some(Score::Mate(_))),
            depth: result.and_then(|r| r.depth),
            pv: result.map(|r| r.pv.clone()).unwrap_or_default(),
            best_move: result.and_then(|r| {
                r.best_move_label
                    .clone()
                    .or_else(|| r.best_move_uci().map(str::to_string))
            }),
            suggestion: None,
        }
    }

    /// Review of the position at `ply` (`Ply::START` included).
    pub fn at(&self, ply: Ply) -> Option<&MoveReview> {
        match ply.index() {
            Some(i) => self.moves.get(i),
            None if ply == Ply::START => Some(&self.start),
            None => None,
        }
    }

    /// Moves paired into numbered White/Black rows.
    pub fn rows(&self) -> Vec<MoveRow> {
        let mut rows: Vec<MoveRow> = Vec::new();
        for (index, review) in self.moves.iter().enumerate() {
            let side = review.side.unwrap_or(Side::White);
            match rows.last_mut() {
                Some(row) if side == Side::Black && row.black.is_none() && row.number == review.number => {
                    row.black = Some(index);
                }
                _ => rows.push(MoveRow {
                    number: review.number,
                    white: (side == Side::White).then_some(index),
                    black: (side == Side::Black).then_some(index),
                }),
            }
        }
        rows
    }

    pub fn counts(&self, side: Side) -> &TierCounts {
        match side {
            Side::White => &self.white,
            Side::Black => &self.black,
        }
    }
}

/// 1 when the game starts with Black to move, so move numbers line up.
fn move_number_offset(timeline: &GameTimeline) -> usize {
    match timeline.start_side() {
        Side::Black => 1,
        Side::White => 0,
    }
}
