//! Session state machine
//!
//! `Idle → Starting → Running → Stopped`. `Starting` falls through to
//! `Stopped` when the spawn fails, and `stop` may jump to `Stopped` from any
//! state. Nothing leaves `Stopped`.

use std::fmt;
use tokio::sync::watch;

/// Lifecycle state of a [`ProcessSession`](crate::ProcessSession)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Created, not started
    #[default]
    Idle,
    /// Spawning the process
    Starting,
    /// Process running, output being read
    Running,
    /// Terminal
    Stopped,
}

impl SessionState {
    /// Name used in messages and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Starting => "Starting",
            SessionState::Running => "Running",
            SessionState::Stopped => "Stopped",
        }
    }

    /// Whether no further transitions can happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Stopped)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared, watchable state cell
///
/// All transitions are compare-and-set so concurrent `stop`, end of output
/// and spawn completion agree on who moved the session.
#[derive(Debug)]
pub(crate) struct StateCell {
    tx: watch::Sender<SessionState>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        Self {
            tx: watch::Sender::new(SessionState::Idle),
        }
    }

    pub(crate) fn get(&self) -> SessionState {
        *self.tx.borrow()
    }

    pub(crate) fn watch(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Move `from → to`; on mismatch returns the actual state
    pub(crate) fn transition(
        &self,
        from: SessionState,
        to: SessionState,
    ) -> Result<(), SessionState> {
        let mut actual = from;
        let moved = self.tx.send_if_modified(|state| {
            actual = *state;
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        });
        if moved { Ok(()) } else { Err(actual) }
    }

    /// Force `Stopped` and return what the state was before
    pub(crate) fn force_stop(&self) -> SessionState {
        let mut previous = SessionState::Stopped;
        self.tx.send_if_modified(|state| {
            previous = *state;
            if state.is_terminal() {
                false
            } else {
                *state = SessionState::Stopped;
                true
            }
        });
        previous
    }
}
