//! Move quality classification.

use crate::evaluation::normalize;
use crate::oracle::Side;
use crate::results::AnalysisResult;
use crate::timeline::{Move, Ply};
use serde::Serialize;

/// Classification of move quality based on evaluation loss.
///
/// Tiers are ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Classification {
    /// The engine's preferred move, or no measurable loss.
    Top,
    /// Loss up to 20.
    Excellent,
    /// Loss up to 50.
    Good,
    /// Loss up to 100.
    Inaccuracy,
    /// Loss up to 300.
    Mistake,
    /// Anything worse.
    Worst,
}

impl Classification {
    /// Inclusive upper loss bound per tier, `Worst` excluded.
    pub const THRESHOLDS: [(i32, Classification); 5] = [
        (0, Classification::Top),
        (20, Classification::Excellent),
        (50, Classification::Good),
        (100, Classification::Inaccuracy),
        (300, Classification::Mistake),
    ];

    pub const ALL: [Classification; 6] = [
        Classification::Top,
        Classification::Excellent,
        Classification::Good,
        Classification::Inaccuracy,
        Classification::Mistake,
        Classification::Worst,
    ];

    /// Bucket a White-frame loss.
    pub fn from_loss(loss: i32) -> Self {
        Self::THRESHOLDS
            .iter()
            .find(|(limit, _)| loss <= *limit)
            .map(|(_, tier)| *tier)
            .unwrap_or(Classification::Worst)
    }

    pub fn label(self) -> &'static str {
        match self {
            Classification::Top => "Best",
            Classification::Excellent => "Excellent",
            Classification::Good => "Good",
            Classification::Inaccuracy => "Inaccuracy",
            Classification::Mistake => "Mistake",
            Classification::Worst => "Blunder",
        }
    }

    /// Annotation glyph shown next to the move.
    pub fn glyph(self) -> &'static str {
        match self {
            Classification::Top => "★",
            Classification::Inaccuracy => "?!",
            Classification::Mistake => "?",
            Classification::Worst => "??",
            Classification::Excellent | Classification::Good => "",
        }
    }

    /// Whether the engine's preferred move is worth showing alongside.
    pub fn wants_suggestion(self) -> bool {
        matches!(self, Classification::Mistake | Classification::Worst)
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A classification with the loss that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Assessment {
    pub classification: Classification,
    /// Evaluation lost by the mover, never negative. Zero on a best-move match.
    pub loss: i32,
}

/// Judge the move played at `ply`.
///
/// `before` is the result for the position the move was played from
/// (`ply - 1`, the mover to move) and `after` the result for the position
/// it produced (the opponent to move).
pub fn assess(
    ply: Ply,
    mv: &Move,
    before: Option<&AnalysisResult>,
    after: Option<&AnalysisResult>,
) -> Option<Assessment> {
    if ply == Ply::START {
        return None;
    }
    let (before, after) = (before?, after?);

    if before.best_move_uci() == Some(mv.uci().as_str()) {
        return Some(Assessment {
            classification: Classification::Top,
            loss: 0,
        });
    }

    let prev = normalize(before, mv.side);
    let curr = normalize(after, mv.side.opposite());
    let loss = match mv.side {
        Side::White => prev.saturating_sub(curr),
        Side::Black => curr.saturating_sub(prev),
    };

    Some(Assessment {
        classification: Classification::from_loss(loss),
        loss: loss.max(0),
    })
}

/// Classification of the move played at `ply`; see [`assess`].
pub fn classify(
    ply: Ply,
    mv: &Move,
    before: Option<&AnalysisResult>,
    after: Option<&AnalysisResult>,
) -> Option<Classification> {
    assess(ply, mv, before, after).map(|a| a.classification)
}

/// Per-side tally of classified moves.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TierCounts {
    /// Total moves classified
    pub total_moves: u32,
    pub top: u32,
    pub excellent: u32,
    pub good: u32,
    pub inaccuracies: u32,
    pub mistakes: u32,
    pub blunders: u32,
    /// Sum of losses, for the average.
    pub total_loss: i64,
}

impl TierCounts {
    pub fn add(&mut self, assessment: Assessment) {
        self.total_moves += 1;
        self.total_loss += assessment.loss as i64;
        match assessment.classification {
            Classification::Top => self.top += 1,
            Classification::Excellent => self.excellent += 1,
            Classification::Good => self.good += 1,
            Classification::Inaccuracy => self.inaccuracies += 1,
            Classification::Mistake => self.mistakes += 1,
            Classification::Worst => self.blunders += 1,
        }
    }

    pub fn count(&self, tier: Classification) -> u32 {
        match tier {
            Classification::Top => self.top,
            Classification::Excellent => self.excellent,
            Classification::Good => self.good,
            Classification::Inaccuracy => self.inaccuracies,
            Classification::Mistake => self.mistakes,
            Classification::Worst => self.blunders,
        }
    }

    /// Mean loss per classified move, 0 when nothing was classified.
    pub fn average_loss(&self) -> f64 {
        if self.total_moves == 0 {
            0.0
        } else {
            self.total_loss as f64 / self.total_moves as f64
        }
    }
}
