//! Core session management
//!
//! Provides the [`ProcessSession`] handle, which owns one child process and
//! both of its channels, and translates everything that happens to them
//! into transcript messages.

use crate::config::SessionConfig;
use crate::error::{ErrorKind, SessionError};
use crate::lifecycle::{EventSink, LifecycleCallback, SessionEvent, SessionGuard};
use crate::log::{ConversationLog, ConversationState, Subscription};
use crate::session::reader::{self, ReaderContext};
use crate::session::state::{SessionState, StateCell};
use chatpipe_protocol::{Message, code_snippet_prompt, prepare_input};
use chatpipe_transport::{LineReader, ProcessChild, ProcessHandle, ProcessInput, TransportError};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::sync::{Mutex as AsyncMutex, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// A chat session backed by the Claude Code CLI
///
/// Cloning is cheap; clones drive the same session. No operation returns an
/// error: failures show up as SYSTEM messages in the transcript, in the
/// `tracing` output, and as [`SessionEvent`]s.
///
/// If every handle is dropped without calling [`ProcessSession::stop`], the
/// child process is killed.
#[derive(Clone)]
pub struct ProcessSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: String,
    config: SessionConfig,
    log: ConversationLog,
    state: Arc<StateCell>,
    input: AsyncMutex<Option<ProcessInput>>,
    child: AsyncMutex<Option<ProcessChild>>,
    reader: Mutex<Option<ReaderTask>>,
    events: EventSink,
}

struct ReaderTask {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl Default for ProcessSession {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl std::fmt::Debug for ProcessSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSession")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("cli_path", &self.inner.config.cli_path)
            .finish()
    }
}

impl ProcessSession {
    /// Create an idle session
    pub fn new(config: SessionConfig) -> Self {
        Self::build(config, None)
    }

    /// Create an idle session that reports lifecycle events to `callback`
    ///
    /// The callback runs inline on whichever task caused the event, so it
    /// should return quickly.
    pub fn with_lifecycle<F>(config: SessionConfig, callback: F) -> Self
    where
        F: Fn(SessionEvent) + Send + Sync + 'static,
    {
        Self::build(config, Some(Arc::new(callback)))
    }

    fn build(config: SessionConfig, callback: Option<LifecycleCallback>) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        Self {
            inner: Arc::new(SessionInner {
                events: EventSink::new(id.clone(), callback),
                id,
                config,
                log: ConversationLog::new(),
                state: Arc::new(StateCell::new()),
                input: AsyncMutex::new(None),
                child: AsyncMutex::new(None),
                reader: Mutex::new(None),
            }),
        }
    }

    /// Unique identifier of this session
    pub fn session_id(&self) -> &str {
        &self.inner.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.inner.state.get()
    }

    /// Watch lifecycle state changes
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.watch()
    }

    /// Configuration this session was created with
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// The transcript
    pub fn log(&self) -> &ConversationLog {
        &self.inner.log
    }

    /// Current transcript state
    pub fn snapshot(&self) -> ConversationState {
        self.inner.log.snapshot()
    }

    /// Observe the transcript; see [`ConversationLog::subscribe`]
    pub fn subscribe(&self) -> Subscription {
        self.inner.log.subscribe()
    }

    /// Remove every message from the transcript
    pub fn clear(&self) {
        self.inner.log.clear();
    }

    /// Directory the running process was started in
    pub fn working_directory(&self) -> Option<String> {
        self.inner.log.snapshot().working_directory().map(str::to_owned)
    }

    /// Guard that stops this session when dropped
    ///
    /// The stop is spawned on the current Tokio runtime. Outside a runtime
    /// the process is left to be killed when the last handle drops.
    pub fn guard(&self) -> SessionGuard {
        let session = self.clone();
        SessionGuard::new(move || match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { session.stop().await });
            }
            Err(_) => {
                warn!(session_id = %session.inner.id, "session guard dropped outside a runtime");
            }
        })
    }

    /// Spawn the CLI in `working_directory` and start reading its output
    ///
    /// Only valid from `Idle`. On success the transcript gets a SYSTEM
    /// message naming the directory and the session is `Running`; on failure
    /// it gets a SYSTEM error and the session is `Stopped`.
    #[instrument(skip_all, fields(session_id = %self.inner.id))]
    pub async fn start(&self, working_directory: impl AsRef<Path>) {
        let directory = working_directory.as_ref();

        if let Err(current) = self
            .inner
            .state
            .transition(SessionState::Idle, SessionState::Starting)
        {
            record_error(
                &self.inner.log,
                &SessionError::InvalidState {
                    operation: "start",
                    state: current.as_str(),
                },
            );
            return;
        }

        info!(working_directory = %directory.display(), "starting session");
        let process_config = self.inner.config.process_config();
        match ProcessHandle::spawn(&process_config, directory).await {
            Ok(handle) => {
                let (child, input, output) = handle.into_parts();
                self.attach(directory.display().to_string(), Some(child), input, output)
                    .await;
            }
            Err(err) => {
                let err = SessionError::Spawn(err);
                self.inner.state.force_stop();
                record_error(&self.inner.log, &err);
                self.inner.events.emit(|session_id| SessionEvent::SpawnFailed {
                    session_id,
                    error: err.to_string(),
                });
            }
        }
    }

    /// Wire a spawned process (or any pair of streams) into the session
    ///
    /// Expects `Starting`.
    pub(crate) async fn attach<R>(
        &self,
        directory: String,
        child: Option<ProcessChild>,
        input: ProcessInput,
        output: R,
    ) where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let pid = child.as_ref().and_then(ProcessChild::id);
        *self.inner.input.lock().await = Some(input);
        *self.inner.child.lock().await = child;

        if self
            .inner
            .state
            .transition(SessionState::Starting, SessionState::Running)
            .is_err()
        {
            debug!("session stopped while starting, releasing process");
            self.stop().await;
            return;
        }

        self.inner.log.begin(
            directory.clone(),
            Message::system(format!("Claude Code session started in: {directory}")),
        );
        self.inner.events.emit(|session_id| SessionEvent::Started {
            session_id,
            working_directory: directory,
            pid,
        });

        let (shutdown, shutdown_rx) = oneshot::channel();
        let ctx = ReaderContext {
            log: self.inner.log.clone(),
            state: self.inner.state.clone(),
            events: self.inner.events.clone(),
        };
        let handle = tokio::spawn(reader::run(ctx, LineReader::new(output), shutdown_rx));
        *self.reader_slot() = Some(ReaderTask { shutdown, handle });

        // A `stop` that ran before the task was stored could not signal it.
        if self.state() == SessionState::Stopped {
            if let Some(task) = self.reader_slot().take() {
                let _ = task.shutdown.send(());
            }
        }
    }

    /// Send `text` to the process as one line
    ///
    /// Only valid while `Running`. The USER message is appended and the
    /// processing flag raised in one step before the write starts. A failed
    /// write clears the flag and adds a SYSTEM error; the session keeps
    /// running.
    #[instrument(skip_all, fields(session_id = %self.inner.id))]
    pub async fn send(&self, text: &str) {
        let state = self.state();
        if state != SessionState::Running {
            self.refuse("send", state);
            return;
        }

        // Holding the input across append and write keeps USER order equal
        // to write order.
        let mut slot = self.inner.input.lock().await;
        let Some(input) = slot.as_mut() else {
            drop(slot);
            self.refuse("send", self.state());
            return;
        };

        self.inner
            .log
            .append_with_processing(Message::user(text), true);
        let result = input.send_line(text).await;
        drop(slot);

        if let Err(err) = result {
            self.write_failed(err);
        }
    }

    /// Send text typed into an input box
    ///
    /// Surrounding whitespace is trimmed. Returns `false`, without touching
    /// the transcript, when nothing is left.
    pub async fn submit(&self, raw: &str) -> bool {
        match prepare_input(raw) {
            Some(text) => {
                self.send(text).await;
                true
            }
            None => false,
        }
    }

    /// Ask about a piece of code
    ///
    /// Returns `false` for a blank selection.
    pub async fn send_code_snippet(&self, file_name: Option<&str>, selection: &str) -> bool {
        match code_snippet_prompt(file_name, selection) {
            Some(prompt) => {
                self.send(&prompt).await;
                true
            }
            None => false,
        }
    }

    /// Terminate the process and release both channels
    ///
    /// Idempotent and valid in any state; the session ends `Stopped` with
    /// the processing flag cleared. Each wait is bounded by the configured
    /// shutdown timeout.
    #[instrument(skip_all, fields(session_id = %self.inner.id))]
    pub async fn stop(&self) {
        let previous = self.inner.state.force_stop();
        if previous == SessionState::Idle {
            info!("session stopped before it was started");
            return;
        }

        let grace = self.inner.config.shutdown_timeout;
        let reader = self.reader_slot().take();
        // An in-flight send may hold the input; it is released after the
        // process is gone.
        let (input, input_busy) = match self.inner.input.try_lock() {
            Ok(mut slot) => (slot.take(), false),
            Err(_) => (None, true),
        };
        let child = self.inner.child.lock().await.take();

        if reader.is_none() && child.is_none() && input.is_none() && !input_busy {
            debug!(previous = %previous, "nothing left to release");
            self.inner.log.set_processing(false);
            return;
        }

        info!(previous = %previous, "stopping session");
        self.inner
            .events
            .emit(|session_id| SessionEvent::Stopping { session_id });

        if let Some(input) = input {
            close_input(input, grace).await;
        }
        let reader = reader.map(|task| {
            let _ = task.shutdown.send(());
            task.handle
        });

        let exit_code = match child {
            Some(mut child) => match child.terminate(grace).await {
                Ok(Some(status)) => status.code(),
                Ok(None) => {
                    warn!(pid = child.id(), "process did not exit within the shutdown timeout");
                    None
                }
                Err(err) => {
                    warn!(error = %err, "failed to terminate process");
                    None
                }
            },
            None => None,
        };

        if input_busy {
            match tokio::time::timeout(grace, self.inner.input.lock()).await {
                Ok(mut slot) => {
                    if let Some(input) = slot.take() {
                        close_input(input, grace).await;
                    }
                }
                Err(_) => warn!("input still busy after shutdown timeout"),
            }
        }

        if let Some(handle) = reader {
            let abort = handle.abort_handle();
            if tokio::time::timeout(grace, handle).await.is_err() {
                warn!("read loop did not finish within the shutdown timeout");
                abort.abort();
            }
        }

        self.inner.log.set_processing(false);
        info!(exit_code, "session stopped");
        self.inner
            .events
            .emit(|session_id| SessionEvent::Stopped {
                session_id,
                exit_code,
            });
    }

    fn reader_slot(&self) -> MutexGuard<'_, Option<ReaderTask>> {
        self.inner
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn refuse(&self, operation: &'static str, state: SessionState) {
        record_error(
            &self.inner.log,
            &SessionError::InvalidState {
                operation,
                state: state.as_str(),
            },
        );
    }

    fn write_failed(&self, err: TransportError) {
        let err = SessionError::Write(err);
        record_error(&self.inner.log, &err);
        self.inner.events.emit(|session_id| SessionEvent::Error {
            session_id,
            error: err.to_string(),
        });
    }
}

/// Log `err` and put it in the transcript
///
/// Read and write failures end the turn, so they clear the processing flag
/// in the same mutation.
/// Shut the process input down, giving up after `grace`
///
/// Failures are logged and otherwise ignored: the process is about to be
/// terminated either way.
async fn close_input(input: ProcessInput, grace: Duration) {
    match tokio::time::timeout(grace, input.close()).await {
        Ok(Ok(())) => debug!("process input closed"),
        Ok(Err(err)) => debug!(error = %err, "closing process input failed"),
        Err(_) => debug!("closing process input timed out"),
    }
}

pub(crate) fn record_error(log: &ConversationLog, err: &SessionError) {
    warn!(
        kind = %err.kind(),
        error = %err,
        retriable = err.is_retriable(),
        action = err.suggested_action(),
        "session error"
    );
    let message = Message::system_error(err.to_string());
    match err.kind() {
        ErrorKind::WriteFailure | ErrorKind::ReadFailure => {
            log.append_with_processing(message, false)
        }
        ErrorKind::SpawnFailure | ErrorKind::InvalidState => log.append(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::reader::SESSION_ENDED;
    use chatpipe_protocol::MessageRole;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::task::{Context, Poll};
    use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream};

    const WAIT: Duration = Duration::from_secs(5);

    /// Session wired to in-memory pipes instead of a real process
    struct Harness {
        session: ProcessSession,
        /// What the session wrote to the "process"
        stdin: BufReader<DuplexStream>,
        /// Where the "process" writes its output
        stdout: DuplexStream,
        events: Arc<Mutex<Vec<SessionEvent>>>,
        /// Set once the session shuts its input down
        input_closed: Arc<AtomicBool>,
    }

    /// Writer that records `poll_shutdown`
    struct ShutdownFlag {
        inner: DuplexStream,
        closed: Arc<AtomicBool>,
    }

    impl AsyncWrite for ShutdownFlag {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Pin::new(&mut self.inner).poll_write(cx, buf)
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.inner).poll_flush(cx)
        }

        fn poll_shutdown(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            self.closed.store(true, Ordering::SeqCst);
            Pin::new(&mut self.inner).poll_shutdown(cx)
        }
    }

    impl Harness {
        async fn running() -> Self {
            let events = Arc::new(Mutex::new(Vec::new()));
            let seen = events.clone();
            let session = ProcessSession::with_lifecycle(
                SessionConfig::default().with_shutdown_timeout(Duration::from_millis(500)),
                move |event| seen.lock().unwrap().push(event),
            );

            let (session_in, stdin) = tokio::io::duplex(1024);
            let (stdout, session_out) = tokio::io::duplex(1024);
            let input_closed = Arc::new(AtomicBool::new(false));
            let session_in = ShutdownFlag {
                inner: session_in,
                closed: input_closed.clone(),
            };
            session
                .inner
                .state
                .transition(SessionState::Idle, SessionState::Starting)
                .unwrap();
            session
                .attach(
                    "/work".to_string(),
                    None,
                    ProcessInput::from_writer(session_in),
                    session_out,
                )
                .await;

            Self {
                session,
                stdin: BufReader::new(stdin),
                stdout,
                events,
                input_closed,
            }
        }

        async fn read_stdin_line(&mut self) -> String {
            let mut line = String::new();
            tokio::time::timeout(WAIT, self.stdin.read_line(&mut line))
                .await
                .unwrap()
                .unwrap();
            line
        }
    }

    fn event_names(events: &Mutex<Vec<SessionEvent>>) -> Vec<&'static str> {
        events
            .lock()
            .unwrap()
            .iter()
            .map(|event| match event {
                SessionEvent::Started { .. } => "started",
                SessionEvent::SpawnFailed { .. } => "spawn_failed",
                SessionEvent::OutputClosed { .. } => "output_closed",
                SessionEvent::Stopping { .. } => "stopping",
                SessionEvent::Stopped { .. } => "stopped",
                SessionEvent::Error { .. } => "error",
            })
            .collect()
    }

    async fn wait_for<F>(sub: &mut Subscription, mut predicate: F) -> ConversationState
    where
        F: FnMut(&ConversationState) -> bool,
    {
        tokio::time::timeout(WAIT, async {
            loop {
                let state = sub.recv().await.expect("log dropped");
                if predicate(&state) {
                    return state;
                }
            }
        })
        .await
        .expect("timed out waiting for transcript")
    }

    #[tokio::test]
    async fn test_send_while_idle_is_refused() {
        let session = ProcessSession::default();

        session.send("hello").await;

        let state = session.snapshot();
        assert_eq!(state.len(), 1);
        let message = &state.messages()[0];
        assert_eq!(message.role(), MessageRole::System);
        assert!(message.is_error());
        assert_eq!(state.count_role(MessageRole::User), 0);
        assert!(!state.is_processing());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_fix_bug_scenario() {
        let mut h = Harness::running().await;
        let mut sub = h.session.subscribe();

        let started = sub.recv().await.unwrap();
        assert_eq!(started.len(), 1);
        assert_eq!(started.messages()[0].role(), MessageRole::System);
        assert!(started.messages()[0].content().contains("/work"));
        assert_eq!(started.working_directory(), Some("/work"));
        assert_eq!(h.session.state(), SessionState::Running);

        h.session.send("fix bug").await;
        let after_send = sub.recv().await.unwrap();
        let last = after_send.last().unwrap();
        assert_eq!(last.role(), MessageRole::User);
        assert_eq!(last.content(), "fix bug");
        assert!(after_send.is_processing());
        assert_eq!(h.read_stdin_line().await, "fix bug\n");

        h.stdout.write_all(b"Sure, here's a fix\n").await.unwrap();
        let answered = wait_for(&mut sub, |s| {
            s.last().map(Message::role) == Some(MessageRole::Assistant)
        })
        .await;
        assert_eq!(answered.last().unwrap().content(), "Sure, here's a fix");
        assert!(!answered.is_processing());
    }

    #[tokio::test]
    async fn test_later_lines_do_not_reopen_turn() {
        let h = Harness::running().await;
        let mut sub = h.session.subscribe();
        h.session.send("explain").await;

        let mut stdout = h.stdout;
        stdout.write_all(b"first\nsecond\nthird\n").await.unwrap();
        let state = wait_for(&mut sub, |s| s.count_role(MessageRole::Assistant) == 3).await;
        assert!(!state.is_processing());
    }

    #[tokio::test]
    async fn test_blank_lines_produce_one_message() {
        let mut h = Harness::running().await;
        let mut sub = h.session.subscribe();

        h.stdout.write_all(b"\n\n\nhello\n\n").await.unwrap();
        h.stdout.shutdown().await.unwrap();

        let state = wait_for(&mut sub, |s| {
            s.last().map(Message::content) == Some(SESSION_ENDED)
        })
        .await;
        let assistant: Vec<&str> = state
            .messages()
            .iter()
            .filter(|m| m.role() == MessageRole::Assistant)
            .map(|m| m.content())
            .collect();
        assert_eq!(assistant, vec!["hello"]);
    }

    #[tokio::test]
    async fn test_partial_line_then_eof() {
        let h = Harness::running().await;
        let mut sub = h.session.subscribe();
        let mut state_rx = h.session.watch_state();

        let mut stdout = h.stdout;
        stdout.write_all(b"partial").await.unwrap();
        drop(stdout);

        let state = wait_for(&mut sub, |s| {
            s.last().map(Message::content) == Some(SESSION_ENDED)
        })
        .await;
        let contents: Vec<&str> = state.messages().iter().map(|m| m.content()).collect();
        assert_eq!(
            contents[1..],
            ["partial", SESSION_ENDED],
            "unexpected transcript: {contents:?}"
        );

        tokio::time::timeout(WAIT, state_rx.wait_for(|s| *s == SessionState::Stopped))
            .await
            .unwrap()
            .unwrap();
        assert!(event_names(&h.events).contains(&"output_closed"));
    }

    #[tokio::test]
    async fn test_write_failure_keeps_running() {
        let h = Harness::running().await;
        drop(h.stdin);

        h.session.send("anyone there?").await;

        let state = h.session.snapshot();
        let last = state.last().unwrap();
        assert!(last.is_error());
        assert!(last.content().starts_with("Error sending message: "));
        assert_eq!(state.count_role(MessageRole::User), 1);
        assert!(!state.is_processing());
        assert_eq!(h.session.state(), SessionState::Running);
        assert!(event_names(&h.events).contains(&"error"));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let h = Harness::running().await;
        h.session.send("long task").await;
        assert!(h.session.log().is_processing());

        h.session.stop().await;
        h.session.stop().await;

        assert_eq!(h.session.state(), SessionState::Stopped);
        assert!(!h.session.log().is_processing());
        assert_eq!(event_names(&h.events), vec!["started", "stopping", "stopped"]);
        assert!(h.input_closed.load(Ordering::SeqCst));

        // Input channel is closed.
        let mut stdin = h.stdin;
        let mut rest = String::new();
        stdin.read_line(&mut rest).await.unwrap();
        assert_eq!(rest, "long task\n");
        rest.clear();
        assert_eq!(stdin.read_line(&mut rest).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_send_after_stop_is_refused() {
        let h = Harness::running().await;
        h.session.stop().await;
        let before = h.session.snapshot().len();

        h.session.send("too late").await;

        let state = h.session.snapshot();
        assert_eq!(state.len(), before + 1);
        assert_eq!(state.count_role(MessageRole::User), 0);
        assert!(state.last().unwrap().content().contains("Stopped"));
    }

    #[tokio::test]
    async fn test_stop_from_idle() {
        let session = ProcessSession::default();
        session.stop().await;
        assert_eq!(session.state(), SessionState::Stopped);

        let dir = tempfile::tempdir().unwrap();
        session.start(dir.path()).await;
        let state = session.snapshot();
        assert_eq!(state.len(), 1);
        assert!(state.messages()[0].content().starts_with("Cannot start"));
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[tokio::test]
    async fn test_start_twice_is_refused() {
        let h = Harness::running().await;
        let dir = tempfile::tempdir().unwrap();

        h.session.start(dir.path()).await;

        let last = h.session.snapshot().last().cloned().unwrap();
        assert!(last.is_error());
        assert_eq!(last.content(), "Cannot start: session is Running");
        assert_eq!(h.session.state(), SessionState::Running);
    }

    #[tokio::test]
    async fn test_start_in_missing_directory() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let seen = events.clone();
        let session = ProcessSession::with_lifecycle(SessionConfig::default(), move |event| {
            seen.lock().unwrap().push(event)
        });
        let dir = tempfile::tempdir().unwrap();

        session.start(dir.path().join("missing")).await;

        let state = session.snapshot();
        assert_eq!(state.len(), 1);
        assert!(state.messages()[0].is_error());
        assert!(
            state.messages()[0]
                .content()
                .starts_with("Error starting Claude Code: ")
        );
        assert_eq!(state.working_directory(), None);
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(matches!(
            events.lock().unwrap().as_slice(),
            [SessionEvent::SpawnFailed { .. }]
        ));
    }

    #[tokio::test]
    async fn test_submit_trims_and_ignores_blank() {
        let mut h = Harness::running().await;
        let before = h.session.snapshot().len();

        assert!(!h.session.submit("   \n\t").await);
        assert_eq!(h.session.snapshot().len(), before);

        assert!(h.session.submit("  fix bug \n").await);
        assert_eq!(h.session.snapshot().last().unwrap().content(), "fix bug");
        assert_eq!(h.read_stdin_line().await, "fix bug\n");
    }

    #[tokio::test]
    async fn test_send_code_snippet() {
        let mut h = Harness::running().await;

        assert!(!h.session.send_code_snippet(Some("main.rs"), "  ").await);
        assert!(
            h.session
                .send_code_snippet(Some("main.rs"), "fn main() {}")
                .await
        );

        assert_eq!(
            h.read_stdin_line().await,
            "Here's some code from main.rs:\n"
        );
        let last = h.session.snapshot().last().cloned().unwrap();
        assert_eq!(last.role(), MessageRole::User);
        assert!(last.content().contains("```\nfn main() {}\n```"));
    }

    #[tokio::test]
    async fn test_clear_empties_transcript() {
        let h = Harness::running().await;
        h.session.send("one").await;
        assert!(!h.session.snapshot().is_empty());

        h.session.clear();

        assert!(h.session.snapshot().is_empty());
        assert_eq!(h.session.working_directory().as_deref(), Some("/work"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_guard_stops_session() {
        let h = Harness::running().await;
        let mut state_rx = h.session.watch_state();

        drop(h.session.guard());

        tokio::time::timeout(WAIT, state_rx.wait_for(|s| *s == SessionState::Stopped))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sends_keep_transcript_and_input_in_step() {
        const SENDS: usize = 50;
        let mut h = Harness::running().await;

        let sends: Vec<_> = (0..SENDS)
            .map(|i| {
                let session = h.session.clone();
                tokio::spawn(async move { session.send(&format!("msg-{i}")).await })
            })
            .collect();
        for send in sends {
            send.await.unwrap();
        }

        let state = h.session.snapshot();
        let users: Vec<String> = state
            .messages()
            .iter()
            .filter(|m| m.role() == MessageRole::User)
            .map(|m| m.content().to_string())
            .collect();
        assert_eq!(users.len(), SENDS);

        let mut written = Vec::with_capacity(SENDS);
        for _ in 0..SENDS {
            written.push(h.read_stdin_line().await.trim_end().to_string());
        }
        assert_eq!(written, users);

        let mut distinct = users.clone();
        distinct.sort();
        distinct.dedup();
        assert_eq!(distinct.len(), SENDS);

        h.session.stop().await;
    }

    #[tokio::test]
    async fn test_session_ids_are_unique() {
        let a = ProcessSession::default();
        let b = ProcessSession::default();
        assert_ne!(a.session_id(), b.session_id());
        assert!(format!("{a:?}").contains(a.session_id()));
    }
}
