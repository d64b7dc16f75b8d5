//! UCI info line types.

use serde::{Deserialize, Serialize};

/// Score in centipawns or mate distance, from the side to move's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Score {
    /// Centipawn score (100 = 1 pawn advantage).
    Cp(i32),
    /// Mate in N moves (positive = side to move mates, negative = side to move is mated).
    Mate(i32),
}

/// Marks a score as a search-window bound rather than an exact value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bound {
    /// `lowerbound`: the true score is at least this value.
    Lower,
    /// `upperbound`: the true score is at most this value.
    Upper,
}

impl Bound {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "lowerbound" => Some(Bound::Lower),
            "upperbound" => Some(Bound::Upper),
            _ => None,
        }
    }

    fn token(self) -> &'static str {
        match self {
            Bound::Lower => "lowerbound",
            Bound::Upper => "upperbound",
        }
    }
}

/// Search information from a score-bearing `info` line.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineInfo {
    /// Search depth in plies.
    pub depth: Option<u32>,
    /// Score evaluation.
    pub score: Option<Score>,
    /// Bound attached to the score; `None` means exact.
    pub bound: Option<Bound>,
    /// Principal variation (best line found).
    pub pv: Vec<String>,
}

impl EngineInfo {
    /// Create a new empty info.
    pub fn new() -> Self {
        Self::default()
    }

    /// Format as UCI info string.
    pub fn to_uci(&self) -> String {
        let mut parts = vec!["info".to_string()];

        if let Some(d) = self.depth {
            parts.push(format!("depth {}", d));
        }
        if let Some(s) = self.score {
            match s {
                Score::Cp(cp) => parts.push(format!("score cp {}", cp)),
                Score::Mate(m) => parts.push(format!("score mate {}", m)),
            }
            if let Some(b) = self.bound {
                parts.push(b.token().to_string());
            }
        }
        if !self.pv.is_empty() {
            parts.push(format!("pv {}", self.pv.join(" ")));
        }

        parts.join(" ")
    }

    /// Parse a UCI info line.
    ///
    /// Only lines whose first token is `info` and which contain a `score`
    /// token are parsed; other lines return `None`. Each field is located
    /// independently by its marker token, so a malformed field leaves just
    /// that field absent:
    ///
    /// - `score <cp|mate> <value> [lowerbound|upperbound]`
    /// - `depth <d>`
    /// - `pv <move>...` takes every remaining token
    pub fn parse(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.first() != Some(&"info") {
            return None;
        }
        let score_idx = parts.iter().position(|&p| p == "score")?;

        let mut info = EngineInfo::new();

        let value = parts
            .get(score_idx + 2)
            .and_then(|v| v.parse::<i32>().ok());
        info.score = match (parts.get(score_idx + 1).copied(), value) {
            (Some("cp"), Some(v)) => Some(Score::Cp(v)),
            (Some("mate"), Some(v)) => Some(Score::Mate(v)),
            _ => None,
        };
        if info.score.is_some() {
            info.bound = parts
                .get(score_idx + 3)
                .and_then(|token| Bound::from_token(token));
        }

        info.depth = parts
            .iter()
            .position(|&p| p == "depth")
            .and_then(|i| parts.get(i + 1))
            .and_then(|d| d.parse().ok());

        if let Some(pv_idx) = parts.iter().position(|&p| p == "pv") {
            info.pv = parts[pv_idx + 1..].iter().map(|s| s.to_string()).collect();
        }

        Some(info)
    }

    /// Fold a newer info line into this one.
    ///
    /// Fields present in `newer` replace the current values; absent fields
    /// keep their last known value. Score and bound travel together.
    pub fn merge(&mut self, newer: EngineInfo) {
        if newer.score.is_some() {
            self.score = newer.score;
            self.bound = newer.bound;
        }
        if newer.depth.is_some() {
            self.depth = newer.depth;
        }
        if !newer.pv.is_empty() {
            self.pv = newer.pv;
        }
    }
}

/// Builder for constructing EngineInfo.
#[derive(Default)]
pub struct InfoBuilder {
    info: EngineInfo,
}

impl InfoBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(mut self, d: u32) -> Self {
        self.info.depth = Some(d);
        self
    }

    pub fn score_cp(mut self, cp: i32) -> Self {
        self.info.score = Some(Score::Cp(cp));
        self
    }

    pub fn score_mate(mut self, moves: i32) -> Self {
        self.info.score = Some(Score::Mate(moves));
        self
    }

    pub fn bound(mut self, bound: Bound) -> Self {
        self.info.bound = Some(bound);
        self
    }

    pub fn pv(mut self, moves: Vec<String>) -> Self {
        self.info.pv = moves;
        self
    }

    pub fn build(self) -> EngineInfo {
        self.info
    }
}
