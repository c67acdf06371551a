//! Observable conversation transcript
//!
//! [`ConversationLog`] is the single writer for a session's messages and its
//! processing flag. Every mutation happens under one lock, and every
//! subscriber is handed the resulting full [`ConversationState`] before the
//! lock is released, so all observers see the same sequence of snapshots in
//! mutation order.

use chatpipe_protocol::{Message, MessageRole};
use futures::Stream;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::trace;

/// Snapshot of the transcript
///
/// Cloning is cheap. Messages are individually shared, so consecutive
/// snapshots point at the same message allocations and an append only
/// copies the list of pointers.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    messages: Arc<Vec<Arc<Message>>>,
    is_processing: bool,
    working_directory: Option<String>,
}

impl ConversationState {
    /// Messages in the order they were appended
    pub fn messages(&self) -> &[Arc<Message>] {
        &self.messages
    }

    /// Whether a user message is waiting for its first line of output
    pub fn is_processing(&self) -> bool {
        self.is_processing
    }

    /// Directory the session was started in
    pub fn working_directory(&self) -> Option<&str> {
        self.working_directory.as_deref()
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the transcript is empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Most recent message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last().map(Arc::as_ref)
    }

    /// Number of messages with the given role
    pub fn count_role(&self, role: MessageRole) -> usize {
        self.messages.iter().filter(|m| m.role() == role).count()
    }
}

struct LogInner {
    state: ConversationState,
    subscribers: Vec<mpsc::UnboundedSender<ConversationState>>,
}

impl LogInner {
    fn notify(&mut self) {
        let snapshot = &self.state;
        self.subscribers
            .retain(|subscriber| subscriber.send(snapshot.clone()).is_ok());
        trace!(
            messages = snapshot.len(),
            processing = snapshot.is_processing,
            subscribers = self.subscribers.len(),
            "transcript updated"
        );
    }
}

/// Shared, observable message log
///
/// Clones refer to the same log.
#[derive(Clone)]
pub struct ConversationLog {
    inner: Arc<Mutex<LogInner>>,
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConversationLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("ConversationLog")
            .field("messages", &inner.state.len())
            .field("is_processing", &inner.state.is_processing)
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

impl ConversationLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(LogInner {
                state: ConversationState::default(),
                subscribers: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LogInner> {
        // A panicking observer must not take the transcript down with it.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` and notify subscribers if it reports a change
    fn mutate<F>(&self, f: F)
    where
        F: FnOnce(&mut ConversationState) -> bool,
    {
        let mut inner = self.lock();
        if f(&mut inner.state) {
            inner.notify();
        }
    }

    /// Current state
    pub fn snapshot(&self) -> ConversationState {
        self.lock().state.clone()
    }

    /// Whether a turn is in progress
    pub fn is_processing(&self) -> bool {
        self.lock().state.is_processing
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.lock().state.len()
    }

    /// Whether the log holds no messages
    pub fn is_empty(&self) -> bool {
        self.lock().state.is_empty()
    }

    /// Observe the log
    ///
    /// The subscription yields the current state first, then one snapshot
    /// per later mutation. Dropping it unsubscribes.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        // Sent under the lock so no mutation can slip in between.
        let _ = tx.send(inner.state.clone());
        inner.subscribers.push(tx);
        Subscription { rx }
    }

    /// Append a message
    pub fn append(&self, message: Message) {
        self.mutate(|state| {
            Arc::make_mut(&mut state.messages).push(Arc::new(message));
            true
        });
    }

    /// Remove every message
    ///
    /// The processing flag and working directory are left alone.
    pub fn clear(&self) {
        self.mutate(|state| {
            state.messages = Arc::new(Vec::new());
            true
        });
    }

    /// Set the processing flag, notifying only if it changes
    pub fn set_processing(&self, processing: bool) {
        self.mutate(|state| {
            let changed = state.is_processing != processing;
            state.is_processing = processing;
            changed
        });
    }

    /// Append and set the processing flag as one mutation
    pub(crate) fn append_with_processing(&self, message: Message, processing: bool) {
        self.mutate(|state| {
            Arc::make_mut(&mut state.messages).push(Arc::new(message));
            state.is_processing = processing;
            true
        });
    }

    /// Record the working directory together with the session's opening message
    pub(crate) fn begin(&self, working_directory: String, message: Message) {
        self.mutate(|state| {
            state.working_directory = Some(working_directory);
            Arc::make_mut(&mut state.messages).push(Arc::new(message));
            true
        });
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }
}

/// Stream of transcript snapshots from [`ConversationLog::subscribe`]
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<ConversationState>,
}

impl Subscription {
    /// Wait for the next snapshot
    ///
    /// Returns `None` once the log has been dropped and every pending
    /// snapshot was delivered.
    pub async fn recv(&mut self) -> Option<ConversationState> {
        self.rx.recv().await
    }

    /// Next snapshot if one is already queued
    pub fn try_recv(&mut self) -> Option<ConversationState> {
        self.rx.try_recv().ok()
    }

    /// Drain queued snapshots and return the newest
    pub fn latest(&mut self) -> Option<ConversationState> {
        let mut latest = None;
        while let Some(state) = self.try_recv() {
            latest = Some(state);
        }
        latest
    }
}

impl Stream for Subscription {
    type Item = ConversationState;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
