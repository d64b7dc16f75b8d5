//! Engine-backed review of a recorded chess game.
//!
//! A game is walked position by position against an external UCI engine,
//! one request at a time, and each played move is then judged by how much
//! evaluation it gave away.
//!
//! # Overview
//!
//! - [`EngineAdapter`] - Async connection to a UCI engine process
//! - [`AnalysisScheduler`] - Runs one sequential analysis session at a time
//! - [`normalize`] - Side-to-move scores to a White-relative linear scale
//! - [`classify`] - Bucket a played move into a [`Classification`]
//! - [`GameReview`] - Per-move presentation model built from the results
//!
//! # Example
//!
//! ```ignore
//! use game_review::{AnalysisScheduler, EngineAdapter, GameReview, GameTimeline, SearchDepth};
//! use std::sync::Arc;
//!
//! let engine = Arc::new(EngineAdapter::spawn("stockfish")?);
//! engine.initialize().await?;
//!
//! let timeline = Arc::new(GameTimeline::from_san_moves(&["e4", "e5", "Nf3"])?);
//! let mut scheduler = AnalysisScheduler::with_engine(engine);
//! let session = scheduler.start_session(timeline.clone(), SearchDepth::clamped(15))?;
//! let outcome = session.finish().await;
//!
//! let review = GameReview::build(&timeline, &outcome.table);
//! ```

pub mod config;
pub mod engine;
pub mod evaluation;
pub mod oracle;
pub mod quality;
pub mod report;
pub mod results;
pub mod scheduler;
pub mod timeline;

pub use config::{AnalysisMode, ConfigError, ReviewConfig, SearchDepth};
pub use engine::{EngineAdapter, EngineError, PendingAnalysis};
pub use evaluation::{bound_prefix, normalize, EvalBar};
pub use oracle::{CoordinateMove, RulesError, RulesOracle, Side, StandardBoard};
pub use quality::{assess, classify, Assessment, Classification, TierCounts};
pub use report::{GameReview, MoveReview, MoveRow};
pub use results::{AnalysisResult, ResultTable};
pub use scheduler::{
    AnalysisScheduler, NotStarted, SessionEvent, SessionHandle, SessionOptions, SessionOutcome,
    SessionStatus,
};
pub use timeline::{GameTimeline, Move, Ply, TimelineBuilder, TimelineError};
