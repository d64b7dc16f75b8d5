//! Scripted in-process UCI engine for session tests.

#![allow(dead_code)]

use game_review::EngineAdapter;
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, Position};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{duplex, split, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, WriteHalf};
use uci::GuiCommand;

/// What the mock does when it receives `go`.
pub enum Reply {
    /// Write `lines` after `delay`.
    Answer { delay: Duration, lines: Vec<String> },
    /// Say nothing until told to `stop`.
    Silent,
    /// Close the connection, as if the process exited.
    Hangup,
}

/// Observations made by the mock engine.
#[derive(Clone, Default)]
pub struct EngineLog {
    commands: Arc<Mutex<Vec<String>>>,
    overlapping: Arc<AtomicBool>,
}

impl EngineLog {
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.commands().iter().filter(|c| c.starts_with(prefix)).count()
    }

    /// True if a `go` ever arrived while an earlier one was unanswered.
    pub fn saw_overlap(&self) -> bool {
        self.overlapping.load(Ordering::SeqCst)
    }
}

type Writer = Arc<tokio::sync::Mutex<WriteHalf<DuplexStream>>>;

async fn write_lines(writer: &Writer, lines: &[String]) {
    let mut writer = writer.lock().await;
    for line in lines {
        let _ = writer.write_all(format!("{line}\n").as_bytes()).await;
    }
    let _ = writer.flush().await;
}

/// Start a mock engine driven by `script(fen, search_index)`.
pub fn scripted<F>(script: F) -> (EngineAdapter, EngineLog)
where
    F: Fn(&str, usize) -> Reply + Send + Sync + 'static,
{
    let (client, server) = duplex(64 * 1024);
    let (client_r, client_w) = split(client);
    let (server_r, server_w) = split(server);
    let adapter = EngineAdapter::from_io(client_r, client_w);

    let log = EngineLog::default();
    let engine_log = log.clone();
    let writer: Writer = Arc::new(tokio::sync::Mutex::new(server_w));
    let in_flight = Arc::new(AtomicBool::new(false));

    tokio::spawn(async move {
        let mut lines = BufReader::new(server_r).lines();
        let mut fen = String::new();
        let mut searches = 0;
        let mut silent: Option<String> = None;

        while let Ok(Some(line)) = lines.next_line().await {
            engine_log.commands.lock().unwrap().push(line.clone());
            match GuiCommand::parse(&line) {
                Ok(GuiCommand::Uci) => {
                    write_lines(&writer, &["id name MockFish".to_string(), "uciok".to_string()]).await
                }
                Ok(GuiCommand::Position { fen: Some(f), .. }) => fen = f,
                Ok(GuiCommand::Go(_)) => {
                    if in_flight.swap(true, Ordering::SeqCst) {
                        engine_log.overlapping.store(true, Ordering::SeqCst);
                    }
                    let index = searches;
                    searches += 1;
                    match script(&fen, index) {
                        Reply::Answer { delay, lines } => {
                            let writer = Arc::clone(&writer);
                            let in_flight = Arc::clone(&in_flight);
                            tokio::spawn(async move {
                                tokio::time::sleep(delay).await;
                                in_flight.store(false, Ordering::SeqCst);
                                write_lines(&writer, &lines).await;
                            });
                        }
                        Reply::Silent => silent = Some(fen.clone()),
                        Reply::Hangup => break,
                    }
                }
                Ok(GuiCommand::Stop) => {
                    // A stopped search still reports a best move.
                    if let Some(stopped) = silent.take() {
                        in_flight.store(false, Ordering::SeqCst);
                        write_lines(&writer, &[format!("bestmove {}", first_legal_move(&stopped))]).await;
                    }
                }
                Ok(GuiCommand::Quit) => break,
                _ => {}
            }
        }
    });

    (adapter, log)
}

/// First legal move of `fen` in coordinate notation, `(none)` if there is none.
pub fn first_legal_move(fen: &str) -> String {
    let pos: Chess = fen
        .parse::<Fen>()
        .unwrap()
        .into_position(CastlingMode::Standard)
        .unwrap();
    pos.legal_moves()
        .first()
        .map(|m| m.to_uci(CastlingMode::Standard).to_string())
        .unwrap_or_else(|| uci::NO_MOVE.to_string())
}

/// Answers every search with the first legal move, after a delay that
/// varies from search to search.
pub fn analyst() -> (EngineAdapter, EngineLog) {
    scripted(|fen, index| {
        let best = first_legal_move(fen);
        Reply::Answer {
            delay: Duration::from_millis(((index * 7) % 5) as u64 * 4),
            lines: vec![
                "info depth 1 seldepth 1 score cp 10 nodes 20".to_string(),
                format!("info depth 1 score cp {} pv {}", 10 + index, best),
                format!("bestmove {}", best),
            ],
        }
    })
}
