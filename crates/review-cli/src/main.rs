mod output;

use anyhow::{bail, Context};
use clap::Parser;
use game_review::{
    AnalysisMode, AnalysisScheduler, EngineAdapter, GameReview, GameTimeline, ReviewConfig,
    RulesOracle, SessionEvent, SessionOptions, SessionStatus, StandardBoard,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "game-review")]
#[command(about = "Review a chess game with a UCI analysis engine")]
struct Cli {
    /// Moves in SAN or coordinate notation (move numbers and results are skipped)
    moves: Vec<String>,
    /// Read the moves from a file instead
    #[arg(long, conflicts_with = "moves")]
    moves_file: Option<PathBuf>,
    /// Start position as FEN
    #[arg(long)]
    fen: Option<String>,
    /// Path to the engine executable
    #[arg(short, long)]
    engine: Option<String>,
    /// Depth preset: low, high or custom
    #[arg(short, long)]
    mode: Option<AnalysisMode>,
    /// Search depth (implies custom mode)
    #[arg(short, long)]
    depth: Option<i64>,
    /// Analyze only the final position for this many milliseconds
    #[arg(long)]
    movetime: Option<u64>,
    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
    /// Do not analyze the start position
    #[arg(long)]
    skip_start: bool,
}

impl Cli {
    /// File configuration with command-line overrides applied.
    fn config(&self) -> anyhow::Result<ReviewConfig> {
        let path = self.config.clone().unwrap_or_else(ReviewConfig::config_path);
        let mut config = ReviewConfig::load_from(&path)
            .with_context(|| format!("Failed to load {}", path.display()))?;

        if let Some(engine) = &self.engine {
            config.engine_path = engine.clone();
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(depth) = self.depth {
            config.mode = AnalysisMode::Custom;
            config.custom_depth = depth;
        }
        Ok(config)
    }

    fn move_text(&self) -> anyhow::Result<String> {
        match &self.moves_file {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display())),
            None => Ok(self.moves.join(" ")),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config()?;
    let timeline = Arc::new(GameTimeline::from_move_text(
        cli.fen.as_deref(),
        &cli.move_text()?,
    )?);

    let engine = EngineAdapter::spawn(&config.engine_path)
        .with_context(|| format!("Failed to start engine '{}'", config.engine_path))?;
    engine.initialize().await?;

    match cli.movetime {
        Some(millis) => {
            let result = analyze_position(&engine, &timeline, millis, cli.json).await;
            engine.terminate().await;
            result
        }
        None => review_game(engine, timeline, &config, &cli).await,
    }
}

/// Timed analysis of the last position of the game.
async fn analyze_position(
    engine: &EngineAdapter,
    timeline: &GameTimeline,
    millis: u64,
    json: bool,
) -> anyhow::Result<()> {
    let fen = timeline
        .moves()
        .last()
        .map_or(timeline.start_fen(), |m| m.fen_after.as_str());
    tracing::info!("Analyzing {} for {}ms", fen, millis);

    let mut result = engine.request_analysis_by_time(fen, millis).await?.wait().await?;
    let board = StandardBoard::from_encoded(fen)?;
    result.best_move_label = result.best_move_uci().map(|raw| {
        board
            .decode(raw)
            .and_then(|mv| board.label(&mv))
            .unwrap_or_else(|_| raw.to_string())
    });

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", output::render_position(fen, board.side_to_move(), &result));
    }
    Ok(())
}

async fn review_game(
    engine: EngineAdapter,
    timeline: Arc<GameTimeline>,
    config: &ReviewConfig,
    cli: &Cli,
) -> anyhow::Result<()> {
    let engine = Arc::new(engine);
    let mut scheduler = AnalysisScheduler::<StandardBoard>::with_engine(Arc::clone(&engine));
    let options = SessionOptions::new(config.depth())
        .include_start(!cli.skip_start)
        .stall_warning(config.stall_warning());
    let mut session = scheduler.start_session_with(Arc::clone(&timeline), options)?;

    let mut interrupted = false;
    loop {
        tokio::select! {
            event = session.next_event() => match event {
                Some(SessionEvent::Progress { ply, percent }) => {
                    tracing::debug!("Ply {} done", ply);
                    if !cli.json {
                        eprint!("\rAnalyzing at depth {}... {:>3}%", config.depth(), percent);
                    }
                }
                Some(SessionEvent::Stalled { ply, waited }) => {
                    eprintln!("\nEngine has spent {:.1}s on ply {}", waited.as_secs_f64(), ply);
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                session.cancel();
            }
        }
    }
    if !cli.json {
        eprintln!();
    }

    let outcome = session.finish().await;
    drop(scheduler);
    if let Ok(engine) = Arc::try_unwrap(engine) {
        engine.terminate().await;
    }

    let review = GameReview::build(&timeline, &outcome.table);
    if cli.json {
        println!("{}", output::render_json(&review)?);
    } else {
        print!("{}", output::render_table(&review));
    }

    match outcome.status {
        SessionStatus::Finished => Ok(()),
        SessionStatus::Cancelled => {
            eprintln!("Analysis cancelled; showing partial results");
            Ok(())
        }
        SessionStatus::Failed(reason) => bail!("Analysis failed: {}", reason),
        other => bail!("Session ended in unexpected state {:?}", other),
    }
}
