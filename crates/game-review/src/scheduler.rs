//! Sequential per-ply analysis sessions.
//!
//! A session walks a [`GameTimeline`] one ply at a time: play the move on
//! its own running board, send the position to the engine, wait for the
//! answer, record it, publish. Exactly one request is in flight at any
//! moment, so results land in strictly increasing ply order.

use crate::config::SearchDepth;
use crate::engine::{EngineAdapter, EngineError, PendingAnalysis};
use crate::oracle::{speculate, RulesOracle, StandardBoard};
use crate::results::{AnalysisResult, ResultTable};
use crate::timeline::{GameTimeline, Ply};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Why a session could not be started.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotStarted {
    #[error("No engine available")]
    EngineUnavailable,
    #[error("Timeline has no moves")]
    EmptyTimeline,
    #[error("A session is already running")]
    AlreadyRunning,
}

/// Where a session is in its walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// No session has been started.
    Idle,
    /// Working on `ply`. `since` is when the current request was armed.
    Running {
        ply: Ply,
        awaiting_engine: bool,
        since: Option<Instant>,
    },
    /// Every planned ply has a result.
    Finished,
    Cancelled,
    /// The engine or the rules oracle failed mid-walk.
    Failed(String),
}

impl SessionStatus {
    /// True for every state in which no work is outstanding.
    pub fn is_idle(&self) -> bool {
        !matches!(self, SessionStatus::Running { .. })
    }
}

/// Notifications emitted while a session runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// `ply` was recorded; `percent` of the planned plies are done.
    Progress { ply: Ply, percent: u8 },
    /// The engine has spent `waited` on `ply` without answering. Emitted at
    /// most once per ply; the session keeps waiting.
    Stalled { ply: Ply, waited: Duration },
}

/// Per-session settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub depth: SearchDepth,
    /// Analyze the start position (ply -1) before the first move.
    pub include_start: bool,
    /// Emit [`SessionEvent::Stalled`] after this long on one ply.
    pub stall_warning: Option<Duration>,
}

impl SessionOptions {
    pub fn new(depth: SearchDepth) -> Self {
        Self {
            depth,
            include_start: true,
            stall_warning: None,
        }
    }

    pub fn include_start(mut self, include: bool) -> Self {
        self.include_start = include;
        self
    }

    pub fn stall_warning(mut self, after: Option<Duration>) -> Self {
        self.stall_warning = after;
        self
    }
}

/// How a session ended, with everything it recorded.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub status: SessionStatus,
    pub table: ResultTable,
}

/// Latest status on `status_rx`. A session task that ended without reporting
/// a final state (it panicked or was aborted) reads as failed.
fn observed(status_rx: &watch::Receiver<SessionStatus>) -> SessionStatus {
    let status = status_rx.borrow().clone();
    match status {
        SessionStatus::Running { .. } if status_rx.has_changed().is_err() => {
            SessionStatus::Failed("session task ended unexpectedly".to_string())
        }
        status => status,
    }
}

/// Percentage of `planned` steps covered by `completed`, rounded half up.
pub fn progress_percent(completed: usize, planned: usize) -> u8 {
    if planned == 0 {
        return 100;
    }
    let completed = completed.min(planned);
    ((completed * 200 + planned) / (planned * 2)) as u8
}

/// Starts analysis sessions against one engine.
pub struct AnalysisScheduler<O: RulesOracle = StandardBoard> {
    engine: Option<Arc<EngineAdapter>>,
    next_session: u64,
    current: Option<watch::Receiver<SessionStatus>>,
    _oracle: PhantomData<fn() -> O>,
}

impl<O: RulesOracle> Default for AnalysisScheduler<O> {
    fn default() -> Self {
        Self {
            engine: None,
            next_session: 1,
            current: None,
            _oracle: PhantomData,
        }
    }
}

impl<O: RulesOracle> AnalysisScheduler<O> {
    /// A scheduler with no engine; sessions will not start until one is set.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(engine: Arc<EngineAdapter>) -> Self {
        Self {
            engine: Some(engine),
            ..Self::default()
        }
    }

    pub fn set_engine(&mut self, engine: Option<Arc<EngineAdapter>>) {
        self.engine = engine;
    }

    pub fn engine(&self) -> Option<&Arc<EngineAdapter>> {
        self.engine.as_ref()
    }

    /// Status of the most recent session, `Idle` if none was started.
    pub fn status(&self) -> SessionStatus {
        self.current
            .as_ref()
            .map(observed)
            .unwrap_or(SessionStatus::Idle)
    }

    pub fn is_running(&self) -> bool {
        !self.status().is_idle()
    }

    /// Analyze every position of `timeline`, start position included.
    pub fn start_session(
        &mut self,
        timeline: Arc<GameTimeline>,
        depth: SearchDepth,
    ) -> Result<SessionHandle, NotStarted> {
        self.start_session_with(timeline, SessionOptions::new(depth))
    }

    /// Start a session with explicit options.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_session_with(
        &mut self,
        timeline: Arc<GameTimeline>,
        options: SessionOptions,
    ) -> Result<SessionHandle, NotStarted> {
        let engine = self.engine.clone().ok_or(NotStarted::EngineUnavailable)?;
        if timeline.is_empty() {
            return Err(NotStarted::EmptyTimeline);
        }
        if self.is_running() {
            return Err(NotStarted::AlreadyRunning);
        }

        let id = self.next_session;
        self.next_session += 1;

        let first = if options.include_start {
            Ply::START
        } else {
            Ply(0)
        };
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (table_tx, table_rx) = watch::channel(ResultTable::new());
        let (status_tx, status_rx) = watch::channel(SessionStatus::Running {
            ply: first,
            awaiting_engine: false,
            since: None,
        });
        let (cancel_tx, cancel_rx) = watch::channel(false);

        tracing::info!(
            "Session {} started: {} moves at depth {}",
            id,
            timeline.len(),
            options.depth
        );

        let session = Session::<O> {
            id,
            engine,
            timeline,
            options,
            table: ResultTable::new(),
            events: events_tx,
            table_tx,
            status: status_tx,
            cancel: cancel_rx,
            _oracle: PhantomData,
        };
        let task = tokio::spawn(session.run());
        self.current = Some(status_rx.clone());

        Ok(SessionHandle {
            id,
            events: events_rx,
            table: table_rx,
            status: status_rx,
            cancel: cancel_tx,
            task,
        })
    }
}

/// Caller's side of a running session.
///
/// Dropping the handle does not stop the session; use [`Self::cancel`].
pub struct SessionHandle {
    id: u64,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    table: watch::Receiver<ResultTable>,
    status: watch::Receiver<SessionStatus>,
    cancel: watch::Sender<bool>,
    task: JoinHandle<SessionStatus>,
}

impl SessionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next progress or stall event; `None` once the session is over and
    /// every event has been received.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Snapshot of the results recorded so far.
    pub fn table(&self) -> ResultTable {
        self.table.borrow().clone()
    }

    pub fn table_watch(&self) -> watch::Receiver<ResultTable> {
        self.table.clone()
    }

    pub fn status(&self) -> SessionStatus {
        observed(&self.status)
    }

    pub fn status_watch(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Stop the session. The engine is told to `stop` and any result
    /// still on its way is dropped.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Wait for the session to end.
    pub async fn finish(self) -> SessionOutcome {
        let status = match self.task.await {
            Ok(status) => status,
            Err(e) => SessionStatus::Failed(format!("session task failed: {}", e)),
        };
        let table = self.table.borrow().clone();
        SessionOutcome { status, table }
    }
}

enum Halt {
    Cancelled,
    Failed(String),
}

impl From<EngineError> for Halt {
    fn from(e: EngineError) -> Self {
        Halt::Failed(e.to_string())
    }
}

struct Session<O> {
    id: u64,
    engine: Arc<EngineAdapter>,
    timeline: Arc<GameTimeline>,
    options: SessionOptions,
    table: ResultTable,
    events: mpsc::UnboundedSender<SessionEvent>,
    table_tx: watch::Sender<ResultTable>,
    status: watch::Sender<SessionStatus>,
    cancel: watch::Receiver<bool>,
    _oracle: PhantomData<fn() -> O>,
}

impl<O: RulesOracle> Session<O> {
    async fn run(mut self) -> SessionStatus {
        let status = match self.walk().await {
            Ok(()) => SessionStatus::Finished,
            Err(Halt::Cancelled) => {
                let _ = self.engine.stop().await;
                SessionStatus::Cancelled
            }
            Err(Halt::Failed(reason)) => {
                tracing::warn!("Session {} failed: {}", self.id, reason);
                SessionStatus::Failed(reason)
            }
        };
        tracing::info!(
            "Session {} ended {:?} with {} results",
            self.id,
            status,
            self.table.len()
        );
        self.status.send_replace(status.clone());
        status
    }

    async fn walk(&mut self) -> Result<(), Halt> {
        let mut board = O::from_encoded(self.timeline.start_fen())
            .map_err(|e| Halt::Failed(e.to_string()))?;

        let first = if self.options.include_start {
            Ply::START
        } else {
            Ply(0)
        };
        let last = Ply::from_index(self.timeline.len() - 1);
        let planned = (last.0 - first.0 + 1) as usize;

        for (done, ply) in (first.0..=last.0).map(Ply).enumerate() {
            if *self.cancel.borrow() {
                return Err(Halt::Cancelled);
            }
            self.set_status(ply, false, None);

            if let Some(mv) = self.timeline.get(ply) {
                board
                    .apply(&mv.coordinate)
                    .map_err(|e| Halt::Failed(format!("move {} at ply {}: {}", mv.uci(), ply, e)))?;
            }

            let fen = board.encode();
            let pending = self.engine.request_analysis(&fen, self.options.depth).await?;
            let since = Instant::now();
            self.set_status(ply, true, Some(since));

            let mut result = self.await_result(ply, pending, since).await?;
            result.best_move_label = resolve_label(&mut board, &result);
            tracing::debug!(
                "Ply {}: score {:?} depth {:?} best {:?}",
                ply,
                result.score,
                result.depth,
                result.best_move_label
            );

            if !self.table.record(ply, result) {
                tracing::warn!("Ply {} already recorded, keeping the first result", ply);
            }
            self.table_tx.send_replace(self.table.clone());

            let percent = progress_percent(done + 1, planned);
            let _ = self.events.send(SessionEvent::Progress { ply, percent });
        }
        Ok(())
    }

    async fn await_result(
        &mut self,
        ply: Ply,
        pending: PendingAnalysis,
        since: Instant,
    ) -> Result<AnalysisResult, Halt> {
        let cancel = &mut self.cancel;
        let events = &self.events;
        let mut stall_at = self.options.stall_warning.map(|after| since + after);
        let mut cancel_live = true;

        let result = pending.wait();
        tokio::pin!(result);

        loop {
            tokio::select! {
                outcome = &mut result => return outcome.map_err(Halt::from),
                cancelled = async { cancel.wait_for(|cancelled| *cancelled).await.is_ok() }, if cancel_live => {
                    if cancelled {
                        return Err(Halt::Cancelled);
                    }
                    // Handle dropped: nobody can cancel any more.
                    cancel_live = false;
                }
                _ = tokio::time::sleep_until(stall_at.unwrap_or(since)), if stall_at.is_some() => {
                    let waited = since.elapsed();
                    tracing::warn!("Engine silent for {:?} on ply {}", waited, ply);
                    let _ = events.send(SessionEvent::Stalled { ply, waited });
                    stall_at = None;
                }
            }
        }
    }

    fn set_status(&self, ply: Ply, awaiting_engine: bool, since: Option<Instant>) {
        self.status.send_replace(SessionStatus::Running {
            ply,
            awaiting_engine,
            since,
        });
    }
}

/// SAN label of the engine's best move in the position on `board`.
///
/// Falls back to the raw coordinate string when the move cannot be played.
fn resolve_label<O: RulesOracle>(board: &mut O, result: &AnalysisResult) -> Option<String> {
    let raw = result.best_move_uci()?;
    let before = board.encode();
    let label = board
        .decode(raw)
        .and_then(|mv| speculate(board, &mv, |_, applied| applied.san.clone()));
    debug_assert_eq!(board.encode(), before);

    match label {
        Ok(san) => Some(san),
        Err(e) => {
            tracing::debug!("Best move {} has no label ({}), showing it raw", raw, e);
            Some(raw.to_string())
        }
    }
}
