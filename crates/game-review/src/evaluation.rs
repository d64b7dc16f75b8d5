//! Score normalization into White's frame of reference.
//!
//! Engines report scores relative to the side to move. Comparing two
//! consecutive positions needs one fixed frame, so every score is
//! converted to "positive is good for White". Mate scores are folded onto
//! the same linear scale, far beyond any centipawn value.

use crate::oracle::Side;
use crate::results::AnalysisResult;
use serde::Serialize;
use uci::{Bound, Score};

/// Magnitude a mate score is anchored at before distance is subtracted.
pub const MATE_BASE: i32 = 10_000;
/// Linear value of one move of mate distance.
pub const MATE_STEP: i32 = 100;
/// Longest mate distance kept apart on the linear scale.
pub const MAX_MATE_DISTANCE: i32 = MATE_BASE / MATE_STEP - 1;

/// Fold a side-relative mate distance onto the centipawn scale.
///
/// Positive mates map to `10000 - 100 * n` and negative mates to
/// `-10000 - 100 * n`, so a nearer mate is always worth more to the
/// mating side. Distances beyond [`MAX_MATE_DISTANCE`] are clamped so the
/// value stays on the mating side of zero.
pub fn mate_to_linear(moves: i32) -> i32 {
    let base = if moves > 0 { MATE_BASE } else { -MATE_BASE };
    base - moves.clamp(-MAX_MATE_DISTANCE, MAX_MATE_DISTANCE) * MATE_STEP
}

/// +1 when White is to move, -1 otherwise.
pub fn side_modifier(to_move: Side) -> i32 {
    match to_move {
        Side::White => 1,
        Side::Black => -1,
    }
}

/// White-relative linear score of `result`, which was computed for a
/// position with `to_move` to move. A result without a score counts as 0.
pub fn normalize(result: &AnalysisResult, to_move: Side) -> i32 {
    let modifier = side_modifier(to_move);
    match result.score {
        Some(Score::Cp(cp)) => cp.saturating_mul(modifier),
        Some(Score::Mate(moves)) => mate_to_linear(moves).saturating_mul(modifier),
        None => 0,
    }
}

/// Which end of the bar White's share grows from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BarSide {
    Top,
    Bottom,
}

/// Evaluation bar state for one position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalBar {
    /// White's share of the bar, 0..=100.
    pub percentage: f64,
    /// Display text, `"1.3"` or `"M4"`.
    pub text: String,
    /// `Bottom` when White is better or level.
    pub side: BarSide,
}

impl Default for EvalBar {
    fn default() -> Self {
        Self {
            percentage: 50.0,
            text: "0.0".to_string(),
            side: BarSide::Top,
        }
    }
}

impl EvalBar {
    /// Bar for `result`, computed for a position with `to_move` to move.
    pub fn from_result(result: Option<&AnalysisResult>, to_move: Side) -> Self {
        let Some(result) = result else {
            return Self::default();
        };

        match result.score {
            Some(Score::Mate(moves)) => {
                let white_mates = normalize(result, to_move) > 0;
                Self {
                    percentage: if white_mates { 100.0 } else { 0.0 },
                    text: format!("M{}", moves.unsigned_abs()),
                    side: if white_mates {
                        BarSide::Bottom
                    } else {
                        BarSide::Top
                    },
                }
            }
            _ => {
                let white_cp = normalize(result, to_move);
                // Pawns to one decimal, halves rounded up.
                let tenths = (white_cp.unsigned_abs() + 5) / 10;
                Self {
                    percentage: (50.0 + white_cp as f64 / 10.0).clamp(5.0, 95.0),
                    text: format!("{}.{}", tenths / 10, tenths % 10),
                    side: if white_cp >= 0 {
                        BarSide::Bottom
                    } else {
                        BarSide::Top
                    },
                }
            }
        }
    }
}

/// `≥`/`≤` marker for a bounded score, read from White's side.
///
/// A lower bound for the side to move is a lower bound for White only when
/// White is to move.
pub fn bound_prefix(result: &AnalysisResult, to_move: Side) -> Option<&'static str> {
    let bound = result.bound?;
    Some(match (bound, to_move) {
        (Bound::Lower, Side::White) | (Bound::Upper, Side::Black) => "≥",
        (Bound::Upper, Side::White) | (Bound::Lower, Side::Black) => "≤",
    })
}
