//! Error types for chat sessions
//!
//! Session operations never return these to the caller. Each failure is
//! logged, turned into a SYSTEM message in the transcript, and paired with
//! the state or flag adjustment it implies. The types exist so that the
//! message text, the log record, and the lifecycle event agree.

use chatpipe_transport::TransportError;
use std::fmt;
use thiserror::Error;

/// Failure taxonomy surfaced through the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Executable missing, not runnable, or bad working directory
    SpawnFailure,
    /// Writing to the process input failed
    WriteFailure,
    /// Reading the process output failed
    ReadFailure,
    /// Operation called in a state that does not allow it
    InvalidState,
}

impl ErrorKind {
    /// Stable tag for logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SpawnFailure => "spawn_failure",
            ErrorKind::WriteFailure => "write_failure",
            ErrorKind::ReadFailure => "read_failure",
            ErrorKind::InvalidState => "invalid_state",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while driving a session
///
/// The `Display` text is exactly what lands in the transcript.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The process could not be started
    #[error("Error starting Claude Code: {0}")]
    Spawn(#[source] TransportError),

    /// A message could not be delivered to the process
    #[error("Error sending message: {0}")]
    Write(#[source] TransportError),

    /// The output stream failed
    #[error("Error reading Claude output: {0}")]
    Read(#[source] std::io::Error),

    /// The session is not in a state that allows the operation
    #[error("Cannot {operation}: session is {state}")]
    InvalidState {
        /// Operation that was refused
        operation: &'static str,
        /// State the session was in
        state: &'static str,
    },
}

impl SessionError {
    /// Taxonomy tag for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Spawn(_) => ErrorKind::SpawnFailure,
            SessionError::Write(_) => ErrorKind::WriteFailure,
            SessionError::Read(_) => ErrorKind::ReadFailure,
            SessionError::InvalidState { .. } => ErrorKind::InvalidState,
        }
    }

    /// Whether the caller can simply try again
    ///
    /// A failed write leaves the session running, so resending may work.
    /// Everything else needs a new session or a different call.
    pub fn is_retriable(&self) -> bool {
        matches!(self, SessionError::Write(_))
    }

    /// User-facing action to take
    pub fn suggested_action(&self) -> &'static str {
        match self {
            SessionError::Spawn(TransportError::InvalidWorkingDirectory(_)) => {
                "Choose an existing directory and start a new session"
            }
            SessionError::Spawn(_) => "Check that the claude CLI is installed and on PATH",
            SessionError::Write(_) => "Try sending the message again",
            SessionError::Read(_) => "Start a new session",
            SessionError::InvalidState { .. } => "Start a new session before sending",
        }
    }
}
