//! Session tests against a scripted in-process engine.

mod common;

use common::{analyst, first_legal_move, scripted, Reply};
use game_review::{
    AnalysisScheduler, GameReview, GameTimeline, NotStarted, Ply, RulesOracle, SearchDepth,
    SessionEvent, SessionOptions, SessionStatus, StandardBoard,
};
use std::sync::Arc;
use std::time::Duration;
use uci::Score;

const WAIT: Duration = Duration::from_secs(5);

fn timeline(moves: &[&str]) -> Arc<GameTimeline> {
    Arc::new(GameTimeline::from_coordinate_moves(moves).unwrap())
}

async fn drain_progress(session: &mut game_review::SessionHandle) -> Vec<(Ply, u8)> {
    let mut seen = Vec::new();
    while let Ok(Some(event)) = tokio::time::timeout(WAIT, session.next_event()).await {
        if let SessionEvent::Progress { ply, percent } = event {
            seen.push((ply, percent));
        }
    }
    seen
}

async fn wait_until_awaiting(session: &game_review::SessionHandle) {
    let mut status = session.status_watch();
    tokio::time::timeout(
        WAIT,
        status.wait_for(|s| matches!(s, SessionStatus::Running { awaiting_engine: true, .. })),
    )
    .await
    .unwrap()
    .unwrap();
}

#[tokio::test]
async fn test_two_plies_without_start_position() {
    let (engine, log) = analyst();
    let engine = Arc::new(engine);
    engine.initialize().await.unwrap();

    let game = timeline(&["e2e4", "e7e5"]);
    let mut scheduler = AnalysisScheduler::<StandardBoard>::with_engine(Arc::clone(&engine));
    let options = SessionOptions::new(SearchDepth::clamped(1)).include_start(false);
    let mut session = scheduler.start_session_with(Arc::clone(&game), options).unwrap();

    let progress = drain_progress(&mut session).await;
    assert_eq!(progress, vec![(Ply(0), 50), (Ply(1), 100)]);

    let outcome = session.finish().await;
    assert_eq!(outcome.status, SessionStatus::Finished);
    assert_eq!(outcome.table.len(), 2);
    assert!(outcome.table.get(Ply::START).is_none());
    assert!(outcome.table.is_contiguous_from(Ply(0)));

    assert_eq!(log.count("go depth 1"), 2);
    let positions: Vec<String> = log
        .commands()
        .into_iter()
        .filter(|c| c.starts_with("position"))
        .collect();
    assert_eq!(
        positions,
        vec![
            format!("position fen {}", game.snapshot(Ply(0)).unwrap()),
            format!("position fen {}", game.snapshot(Ply(1)).unwrap()),
        ]
    );
    assert_eq!(engine.name().as_deref(), Some("MockFish"));
}

#[tokio::test]
async fn test_default_walk_starts_at_initial_position() {
    let (engine, log) = analyst();
    let mut scheduler = AnalysisScheduler::<StandardBoard>::with_engine(Arc::new(engine));
    let mut session = scheduler
        .start_session(timeline(&["e2e4", "e7e5"]), SearchDepth::clamped(3))
        .unwrap();

    let progress = drain_progress(&mut session).await;
    assert_eq!(progress, vec![(Ply::START, 33), (Ply(0), 67), (Ply(1), 100)]);

    let outcome = session.finish().await;
    assert_eq!(outcome.table.len(), 3);
    assert_eq!(outcome.table.last_ply(), Some(Ply(1)));
    assert_eq!(log.count("go depth 3"), 3);
    assert!(!scheduler.is_running());
    assert_eq!(scheduler.status(), SessionStatus::Finished);
}

#[tokio::test]
async fn test_results_arrive_in_order_one_request_at_a_time() {
    let (engine, log) = analyst();
    let mut scheduler = AnalysisScheduler::<StandardBoard>::with_engine(Arc::new(engine));
    let game = timeline(&["d2d4", "g8f6", "c2c4", "e7e6", "b1c3", "f8b4"]);
    let session = scheduler
        .start_session(Arc::clone(&game), SearchDepth::clamped(2))
        .unwrap();

    let mut tables = session.table_watch();
    let watcher = tokio::spawn(async move {
        let mut sizes = Vec::new();
        while tables.changed().await.is_ok() {
            let table = tables.borrow_and_update().clone();
            assert!(table.is_contiguous_from(Ply::START));
            sizes.push(table.len());
        }
        sizes
    });

    let outcome = session.finish().await;
    assert_eq!(outcome.status, SessionStatus::Finished);
    assert_eq!(outcome.table.len(), game.len() + 1);
    assert!(!log.saw_overlap());

    let sizes = watcher.await.unwrap();
    assert!(sizes.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_best_move_labels_use_position_before_move() {
    let (engine, _log) = analyst();
    let mut scheduler = AnalysisScheduler::<StandardBoard>::with_engine(Arc::new(engine));
    let game = timeline(&["e2e4", "c7c5"]);
    let outcome = scheduler
        .start_session(Arc::clone(&game), SearchDepth::clamped(1))
        .unwrap()
        .finish()
        .await;

    for ply in [Ply::START, Ply(0), Ply(1)] {
        let fen = game.snapshot(ply).unwrap();
        let best = first_legal_move(fen);
        let board = StandardBoard::from_encoded(fen).unwrap();
        let expected = board.label(&board.decode(&best).unwrap()).unwrap();

        let result = outcome.table.get(ply).unwrap();
        assert_eq!(result.best_move_uci(), Some(best.as_str()));
        assert_eq!(result.best_move_label.as_deref(), Some(expected.as_str()));
        assert_eq!(result.depth, Some(1));
    }
}

#[tokio::test]
async fn test_latest_info_line_wins() {
    let (engine, _log) = analyst();
    let mut scheduler = AnalysisScheduler::<StandardBoard>::with_engine(Arc::new(engine));
    let outcome = scheduler
        .start_session(timeline(&["g1f3", "d7d5"]), SearchDepth::clamped(1))
        .unwrap()
        .finish()
        .await;

    // The mock's second info line scores 10 + search index.
    assert_eq!(outcome.table.get(Ply::START).unwrap().score, Some(Score::Cp(10)));
    assert_eq!(outcome.table.get(Ply(1)).unwrap().score, Some(Score::Cp(12)));
}

#[tokio::test]
async fn test_illegal_best_move_falls_back_to_raw_text() {
    let (engine, _log) = scripted(|_, _| Reply::Answer {
        delay: Duration::ZERO,
        lines: vec![
            "info depth 4 score mate -2 pv a1a8".to_string(),
            "bestmove a1a8".to_string(),
        ],
    });
    let mut scheduler = AnalysisScheduler::<StandardBoard>::with_engine(Arc::new(engine));
    let outcome = scheduler
        .start_session(timeline(&["e2e4"]), SearchDepth::clamped(4))
        .unwrap()
        .finish()
        .await;

    assert_eq!(outcome.status, SessionStatus::Finished);
    let result = outcome.table.get(Ply(0)).unwrap();
    assert_eq!(result.best_move_label.as_deref(), Some("a1a8"));
    assert_eq!(result.score, Some(Score::Mate(-2)));
}

#[tokio::test]
async fn test_cancel_stops_the_engine() {
    let (engine, log) = scripted(|_, _| Reply::Silent);
    let mut scheduler = AnalysisScheduler::<StandardBoard>::with_engine(Arc::new(engine));
    let session = scheduler
        .start_session(timeline(&["e2e4", "e7e5"]), SearchDepth::clamped(10))
        .unwrap();

    wait_until_awaiting(&session).await;
    assert!(scheduler.is_running());
    session.cancel();

    let outcome = tokio::time::timeout(WAIT, session.finish()).await.unwrap();
    assert_eq!(outcome.status, SessionStatus::Cancelled);
    assert!(outcome.table.is_empty());
    assert!(!scheduler.is_running());

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(log.count("stop"), 1);
}

#[tokio::test]
async fn test_new_session_after_cancel() {
    let (engine, _log) = scripted(|fen, index| {
        if index == 0 {
            return Reply::Silent;
        }
        let best = first_legal_move(fen);
        Reply::Answer {
            delay: Duration::ZERO,
            lines: vec![
                format!("info depth 1 score cp 5 pv {}", best),
                format!("bestmove {}", best),
            ],
        }
    });
    let mut scheduler = AnalysisScheduler::<StandardBoard>::with_engine(Arc::new(engine));

    let first = scheduler
        .start_session(timeline(&["e2e4"]), SearchDepth::clamped(1))
        .unwrap();
    wait_until_awaiting(&first).await;
    first.cancel();
    assert_eq!(first.finish().await.status, SessionStatus::Cancelled);

    let second = scheduler
        .start_session(timeline(&["d2d4"]), SearchDepth::clamped(1))
        .unwrap();
    assert_eq!(second.id(), 2);
    let outcome = tokio::time::timeout(WAIT, second.finish()).await.unwrap();
    assert_eq!(outcome.status, SessionStatus::Finished);
    assert_eq!(outcome.table.len(), 2);
}

#[tokio::test]
async fn test_overlapping_session_is_rejected() {
    let (engine, _log) = scripted(|_, _| Reply::Silent);
    let mut scheduler = AnalysisScheduler::<StandardBoard>::with_engine(Arc::new(engine));
    let running = scheduler
        .start_session(timeline(&["e2e4"]), SearchDepth::clamped(5))
        .unwrap();

    let second = scheduler.start_session(timeline(&["d2d4"]), SearchDepth::clamped(5));
    assert_eq!(second.err(), Some(NotStarted::AlreadyRunning));

    running.cancel();
    running.finish().await;
}

#[tokio::test]
async fn test_engine_exit_fails_the_session() {
    let (engine, _log) = scripted(|fen, index| {
        if index == 1 {
            return Reply::Hangup;
        }
        let best = first_legal_move(fen);
        Reply::Answer {
            delay: Duration::ZERO,
            lines: vec![format!("bestmove {}", best)],
        }
    });
    let engine = Arc::new(engine);
    let mut scheduler = AnalysisScheduler::<StandardBoard>::with_engine(Arc::clone(&engine));
    let outcome = tokio::time::timeout(
        WAIT,
        scheduler
            .start_session(timeline(&["e2e4", "e7e5"]), SearchDepth::clamped(1))
            .unwrap()
            .finish(),
    )
    .await
    .unwrap();

    assert!(matches!(outcome.status, SessionStatus::Failed(_)));
    assert_eq!(outcome.table.len(), 1);
    assert!(outcome.table.get(Ply::START).is_some());
    assert!(engine.is_closed());
}

#[tokio::test]
async fn test_silent_engine_raises_one_stall_event() {
    let (engine, _log) = scripted(|_, _| Reply::Silent);
    let mut scheduler = AnalysisScheduler::<StandardBoard>::with_engine(Arc::new(engine));
    let options = SessionOptions::new(SearchDepth::clamped(20))
        .include_start(false)
        .stall_warning(Some(Duration::from_millis(30)));
    let mut session = scheduler
        .start_session_with(timeline(&["e2e4"]), options)
        .unwrap();

    let event = tokio::time::timeout(WAIT, session.next_event())
        .await
        .unwrap()
        .unwrap();
    match event {
        SessionEvent::Stalled { ply, waited } => {
            assert_eq!(ply, Ply(0));
            assert!(waited >= Duration::from_millis(30));
        }
        other => panic!("expected a stall, got {:?}", other),
    }

    // Still waiting; no second warning for the same ply.
    assert!(
        tokio::time::timeout(Duration::from_millis(100), session.next_event())
            .await
            .is_err()
    );
    assert!(matches!(
        session.status(),
        SessionStatus::Running {
            ply: Ply(0),
            awaiting_engine: true,
            ..
        }
    ));

    session.cancel();
    assert_eq!(session.finish().await.status, SessionStatus::Cancelled);
}

#[tokio::test]
async fn test_reviewed_game_from_session() {
    let (engine, _log) = analyst();
    let mut scheduler = AnalysisScheduler::<StandardBoard>::with_engine(Arc::new(engine));
    let game = timeline(&["e2e4", "e7e5", "g1f3"]);
    let outcome = scheduler
        .start_session(Arc::clone(&game), SearchDepth::clamped(1))
        .unwrap()
        .finish()
        .await;

    let review = GameReview::build(&game, &outcome.table);
    assert_eq!(review.moves.len(), 3);
    assert!(review.moves.iter().all(|m| m.classification.is_some()));
    assert_eq!(review.white.total_moves, 2);
    assert_eq!(review.black.total_moves, 1);
    assert_eq!(review.rows().len(), 2);
}
