//! Async adapter for one UCI analysis engine.
//!
//! The adapter owns the connection: a command writer task, a line reader
//! task, and the bookkeeping for the single analysis request that may be
//! pending at any time. Callers arm a request with
//! [`EngineAdapter::request_analysis`] and await the returned
//! [`PendingAnalysis`].
//!
//! Every `go` is numbered, passthrough ones included. A `bestmove` (or
//! `info`) line is attributed to
//! the search it belongs to by counting `bestmove` lines, so output of a
//! superseded search is never mistaken for the answer to a newer one.

use crate::config::SearchDepth;
use crate::results::AnalysisResult;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use uci::{EngineInfo, EngineMessage, GoOptions, GuiCommand};

/// How long [`EngineAdapter::terminate`] waits for a clean exit before killing.
pub const QUIT_GRACE: Duration = Duration::from_millis(500);

const COMMAND_QUEUE: usize = 64;
const LINE_BROADCAST: usize = 256;

/// Errors that can occur when working with the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Failed to spawn the engine process.
    #[error("Failed to spawn engine: {0}")]
    Spawn(#[from] std::io::Error),
    /// Engine executable was not found at the specified path.
    #[error("Engine not found at path: {0}")]
    NotFound(String),
    /// The engine's input or output closed.
    #[error("Engine disconnected")]
    Disconnected,
    /// A newer request was armed before this one completed.
    #[error("Analysis request superseded by a newer request")]
    Superseded,
}

type Completion = oneshot::Sender<Result<AnalysisResult, EngineError>>;

struct Pending {
    search: u64,
    tx: Completion,
}

/// Request bookkeeping shared between callers and the reader task.
#[derive(Default)]
struct Dispatch {
    searches_started: u64,
    searches_finished: u64,
    info: EngineInfo,
    pending: Option<Pending>,
    name: Option<String>,
    closed: bool,
}

impl Dispatch {
    /// Ordinal of the search whose output is currently arriving.
    fn current_search(&self) -> Option<u64> {
        (self.searches_finished < self.searches_started).then_some(self.searches_finished + 1)
    }

    fn pending_search(&self) -> Option<u64> {
        self.pending.as_ref().map(|p| p.search)
    }

    fn arm(&mut self) -> Result<PendingAnalysis, EngineError> {
        if self.closed {
            return Err(EngineError::Disconnected);
        }
        self.searches_started += 1;
        let search = self.searches_started;

        if let Some(prev) = self.pending.take() {
            tracing::debug!("Search {} superseded by search {}", prev.search, search);
            let _ = prev.tx.send(Err(EngineError::Superseded));
        }
        self.info = EngineInfo::new();

        let (tx, rx) = oneshot::channel();
        self.pending = Some(Pending { search, tx });
        Ok(PendingAnalysis { search, rx })
    }

    /// Count a search nobody waits for, so its `bestmove` is skipped.
    fn start_untracked(&mut self) -> u64 {
        self.searches_started += 1;
        self.searches_started
    }

    fn handle_line(&mut self, line: &str) {
        match EngineMessage::parse(line) {
            EngineMessage::Info(info) => {
                if self.current_search().is_some() && self.current_search() == self.pending_search() {
                    self.info.merge(info);
                }
            }
            EngineMessage::BestMove { best, .. } => {
                let Some(search) = self.current_search() else {
                    tracing::warn!("Ignoring bestmove with no search running: {}", line);
                    return;
                };
                self.searches_finished = search;

                match self.pending.take() {
                    Some(pending) if pending.search == search => {
                        let info = std::mem::take(&mut self.info);
                        let result = AnalysisResult::from_search(info, best);
                        // Receiver may have been dropped by a cancelled caller.
                        let _ = pending.tx.send(Ok(result));
                    }
                    other => {
                        self.pending = other;
                        tracing::warn!("Discarding result of superseded search {}: {}", search, line);
                    }
                }
            }
            EngineMessage::Id {
                name: Some(name), ..
            } => {
                self.name = Some(name);
            }
            _ => {}
        }
    }

    fn close(&mut self) {
        self.closed = true;
        if let Some(pending) = self.pending.take() {
            let _ = pending.tx.send(Err(EngineError::Disconnected));
        }
    }
}

fn lock(dispatch: &Mutex<Dispatch>) -> MutexGuard<'_, Dispatch> {
    dispatch.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to an armed analysis request.
#[derive(Debug)]
pub struct PendingAnalysis {
    search: u64,
    rx: oneshot::Receiver<Result<AnalysisResult, EngineError>>,
}

impl PendingAnalysis {
    /// Ordinal of the `go` command this request issued.
    pub fn search(&self) -> u64 {
        self.search
    }

    /// Wait for the engine's `bestmove`.
    pub async fn wait(self) -> Result<AnalysisResult, EngineError> {
        self.rx.await.map_err(|_| EngineError::Disconnected)?
    }
}

/// One connection to a UCI analysis engine.
pub struct EngineAdapter {
    commands: mpsc::Sender<String>,
    dispatch: Arc<Mutex<Dispatch>>,
    lines: broadcast::Sender<String>,
    child: Option<Child>,
    reader: JoinHandle<()>,
}

impl EngineAdapter {
    /// Spawn an engine process.
    ///
    /// Must be called from within a Tokio runtime. The process is killed
    /// when the adapter is dropped.
    ///
    /// # Errors
    ///
    /// - `EngineError::NotFound` if `path` names a file that doesn't exist
    /// - `EngineError::Spawn` if the process fails to start
    pub fn spawn(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let shown = path.display().to_string();
        // Bare program names are resolved through PATH by the OS.
        if path.components().count() > 1 && !path.exists() {
            return Err(EngineError::NotFound(shown));
        }

        let mut child = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => EngineError::NotFound(shown.clone()),
                _ => EngineError::Spawn(e),
            })?;

        let stdin = child.stdin.take().ok_or(EngineError::Disconnected)?;
        let stdout = child.stdout.take().ok_or(EngineError::Disconnected)?;
        tracing::info!("Spawned engine {}", shown);

        let mut adapter = Self::from_io(stdout, stdin);
        adapter.child = Some(child);
        Ok(adapter)
    }

    /// Drive an engine over an arbitrary reader/writer pair.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_io<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (commands, command_rx) = mpsc::channel::<String>(COMMAND_QUEUE);
        let (lines, _) = broadcast::channel(LINE_BROADCAST);
        let dispatch = Arc::new(Mutex::new(Dispatch::default()));

        tokio::spawn(write_commands(writer, command_rx));
        let reader = tokio::spawn(read_lines(reader, Arc::clone(&dispatch), lines.clone()));

        Self {
            commands,
            dispatch,
            lines,
            child: None,
            reader,
        }
    }

    /// Send the `uci` handshake. Replies are handled passively.
    pub async fn initialize(&self) -> Result<(), EngineError> {
        self.send(GuiCommand::Uci).await
    }

    /// Analyze `fen` to a fixed depth.
    pub async fn request_analysis(
        &self,
        fen: &str,
        depth: SearchDepth,
    ) -> Result<PendingAnalysis, EngineError> {
        self.request(fen, GoOptions::depth(depth.get())).await
    }

    /// Analyze `fen` for a fixed time.
    pub async fn request_analysis_by_time(
        &self,
        fen: &str,
        millis: u64,
    ) -> Result<PendingAnalysis, EngineError> {
        self.request(fen, GoOptions::movetime(millis)).await
    }

    async fn request(&self, fen: &str, go: GoOptions) -> Result<PendingAnalysis, EngineError> {
        let pending = lock(&self.dispatch).arm()?;
        self.send(GuiCommand::position_fen(fen)).await?;
        self.send(GuiCommand::Go(go)).await?;
        tracing::debug!("Search {} requested for {}", pending.search, fen);
        Ok(pending)
    }

    /// Ask the engine to finish its current search early.
    pub async fn stop(&self) -> Result<(), EngineError> {
        self.send(GuiCommand::Stop).await
    }

    pub async fn quit(&self) -> Result<(), EngineError> {
        self.send(GuiCommand::Quit).await
    }

    /// Send a raw line, unchanged.
    ///
    /// A `go` sent this way still counts as a search, and its output is
    /// never delivered to a pending request.
    pub async fn send_command(&self, raw: &str) -> Result<(), EngineError> {
        if let Ok(GuiCommand::Go(_)) = GuiCommand::parse(raw) {
            let search = lock(&self.dispatch).start_untracked();
            tracing::debug!("Search {} started by raw command", search);
        }
        self.send_line(raw.to_string()).await
    }

    async fn send(&self, command: GuiCommand) -> Result<(), EngineError> {
        self.send_line(command.to_uci()).await
    }

    async fn send_line(&self, line: String) -> Result<(), EngineError> {
        self.commands
            .send(line)
            .await
            .map_err(|_| EngineError::Disconnected)
    }

    /// Observe every raw line the engine writes from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.lines.subscribe()
    }

    /// Name from the engine's `id name` line, once seen.
    pub fn name(&self) -> Option<String> {
        lock(&self.dispatch).name.clone()
    }

    /// True once the engine's output has closed.
    pub fn is_closed(&self) -> bool {
        lock(&self.dispatch).closed
    }

    /// Send `quit`, give the process [`QUIT_GRACE`] to exit, then kill it.
    pub async fn terminate(mut self) {
        let _ = self.quit().await;
        if let Some(mut child) = self.child.take() {
            match tokio::time::timeout(QUIT_GRACE, child.wait()).await {
                Ok(Ok(status)) => tracing::debug!("Engine exited: {}", status),
                Ok(Err(e)) => tracing::warn!("Failed to wait for engine: {}", e),
                Err(_) => {
                    tracing::warn!("Engine ignored quit, killing it");
                    let _ = child.kill().await;
                }
            }
        }
    }
}

impl Drop for EngineAdapter {
    fn drop(&mut self) {
        let _ = self.commands.try_send(GuiCommand::Quit.to_uci());
        self.reader.abort();
    }
}

async fn write_commands<W>(mut writer: W, mut commands: mpsc::Receiver<String>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = commands.recv().await {
        tracing::trace!(">> {}", line);
        if writer.write_all(line.as_bytes()).await.is_err() {
            break;
        }
        if writer.write_all(b"\n").await.is_err() {
            break;
        }
        if writer.flush().await.is_err() {
            break;
        }
    }
}

async fn read_lines<R>(reader: R, dispatch: Arc<Mutex<Dispatch>>, lines: broadcast::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader).lines();
    loop {
        match reader.next_line().await {
            Ok(Some(line)) => {
                tracing::trace!("<< {}", line);
                lock(&dispatch).handle_line(&line);
                let _ = lines.send(line);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Failed to read engine output: {}", e);
                break;
            }
        }
    }
    tracing::debug!("Engine output closed");
    lock(&dispatch).close();
}
