//! Text and JSON rendering of reviews.

use game_review::evaluation::BarSide;
use game_review::{AnalysisResult, Classification, GameReview, MoveReview, Side, TierCounts};
use std::fmt::Write;
use uci::Score;

const MOVE_COLUMN: usize = 22;

/// Signed White-relative evaluation, e.g. `+0.3`, `-M2`, `≥+1.5`.
fn signed_eval(review: &MoveReview) -> String {
    if review.depth.is_none() && review.best_move.is_none() {
        return "…".to_string();
    }
    let sign = match review.eval.side {
        BarSide::Bottom => "+",
        BarSide::Top => "-",
    };
    format!(
        "{}{}{}",
        review.bound_prefix.unwrap_or(""),
        sign,
        review.eval.text
    )
}

fn move_cell(review: &MoveReview) -> String {
    format!(
        "{}{} {}",
        review.san.as_deref().unwrap_or("?"),
        review.glyph,
        signed_eval(review)
    )
}

fn counts_line(name: &str, counts: &TierCounts) -> String {
    let tiers = Classification::ALL
        .iter()
        .map(|&tier| format!("{} {}", tier.label(), counts.count(tier)))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{}: {} moves, {}, average loss {:.1}",
        name,
        counts.total_moves,
        tiers,
        counts.average_loss()
    )
}

/// Move table, notable moves, and per-side summary.
pub fn render_table(review: &GameReview) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Start position: {}", signed_eval(&review.start));

    for row in review.rows() {
        let white = row
            .white
            .map_or("...".to_string(), |i| move_cell(&review.moves[i]));
        let black = row
            .black
            .map_or(String::new(), |i| move_cell(&review.moves[i]));
        let _ = writeln!(
            out,
            "{:>3}. {:<width$} {}",
            row.number,
            white,
            black,
            width = MOVE_COLUMN
        );
    }

    let notable: Vec<&MoveReview> = review
        .moves
        .iter()
        .filter(|m| m.suggestion.is_some())
        .collect();
    if !notable.is_empty() {
        let _ = writeln!(out);
        for m in notable {
            let dots = if m.side == Some(Side::Black) { "..." } else { "." };
            let _ = writeln!(
                out,
                "{}{} {}{} is {} (loss {}), best was {}",
                m.number,
                dots,
                m.san.as_deref().unwrap_or("?"),
                m.glyph,
                m.classification.map_or("unclassified", |c| c.label()),
                m.loss.unwrap_or(0),
                m.suggestion.as_deref().unwrap_or("?")
            );
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", counts_line("White", &review.white));
    let _ = writeln!(out, "{}", counts_line("Black", &review.black));
    out
}

pub fn render_json(review: &GameReview) -> serde_json::Result<String> {
    serde_json::to_string_pretty(review)
}

/// Summary of a single-position search. Scores are shown for the side to move.
pub fn render_position(fen: &str, to_move: Side, result: &AnalysisResult) -> String {
    let score = match result.score {
        Some(Score::Cp(cp)) => format!("{:+.2}", cp as f64 / 100.0),
        Some(Score::Mate(n)) => format!("mate {}", n),
        None => "none".to_string(),
    };
    let mut out = String::new();
    let _ = writeln!(out, "Position: {}", fen);
    let _ = writeln!(out, "Score:    {} ({} to move)", score, to_move);
    if let Some(depth) = result.depth {
        let _ = writeln!(out, "Depth:    {}", depth);
    }
    let _ = writeln!(
        out,
        "Best:     {}",
        result.best_move_label.as_deref().unwrap_or("none")
    );
    if !result.pv.is_empty() {
        let _ = writeln!(out, "Line:     {}", result.pv.join(" "));
    }
    out
}
