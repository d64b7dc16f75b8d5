//! Engine results and the per-ply result table.

use crate::timeline::Ply;
use serde::Serialize;
use std::collections::BTreeMap;
use uci::{BestMove, Bound, EngineInfo, Score};

/// The engine's verdict on one position, scored from the side to move.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AnalysisResult {
    pub score: Option<Score>,
    pub bound: Option<Bound>,
    pub depth: Option<u32>,
    pub pv: Vec<String>,
    #[serde(serialize_with = "serialize_best_move")]
    pub best_move: Option<BestMove>,
    /// SAN label of `best_move` in the analyzed position, or the raw
    /// coordinate string when it could not be resolved.
    pub best_move_label: Option<String>,
}

fn serialize_best_move<S: serde::Serializer>(
    best: &Option<BestMove>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match best {
        Some(best) => serializer.serialize_some(&best.to_string()),
        None => serializer.serialize_none(),
    }
}

impl AnalysisResult {
    /// Combine the last known search info with the terminating `bestmove`.
    pub fn from_search(info: EngineInfo, best_move: Option<BestMove>) -> Self {
        Self {
            score: info.score,
            bound: info.bound,
            depth: info.depth,
            pv: info.pv,
            best_move,
            best_move_label: None,
        }
    }

    /// Coordinate string of the best move, unless absent or `(none)`.
    pub fn best_move_uci(&self) -> Option<&str> {
        self.best_move.as_ref().and_then(BestMove::as_move)
    }
}

/// Results keyed by ply, written once per ply.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ResultTable(BTreeMap<Ply, AnalysisResult>);

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the result for `ply`. Returns `false` and leaves the table
    /// unchanged if that ply already has a result.
    pub fn record(&mut self, ply: Ply, result: AnalysisResult) -> bool {
        match self.0.entry(ply) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(result);
                true
            }
        }
    }

    pub fn get(&self, ply: Ply) -> Option<&AnalysisResult> {
        self.0.get(&ply)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in ascending ply order.
    pub fn iter(&self) -> impl Iterator<Item = (Ply, &AnalysisResult)> {
        self.0.iter().map(|(ply, result)| (*ply, result))
    }

    /// Highest ply with a result.
    pub fn last_ply(&self) -> Option<Ply> {
        self.0.keys().next_back().copied()
    }

    /// True when the recorded plies form one gap-free run starting at `first`.
    pub fn is_contiguous_from(&self, first: Ply) -> bool {
        self.0
            .keys()
            .enumerate()
            .all(|(offset, ply)| ply.0 == first.0 + offset as i32)
    }
}
