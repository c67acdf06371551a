//! Session lifecycle events and RAII cleanup
//!
//! Provides:
//! - [`SessionEvent`] for visibility into process start, shutdown and failures
//! - Lifecycle callbacks registered with [`ProcessSession::with_lifecycle`]
//! - [`SessionGuard`] which stops a session when it goes out of scope
//!
//! # Example
//!
//! ```no_run
//! use chatpipe::{ProcessSession, SessionConfig, SessionEvent};
//!
//! # async fn demo() {
//! let session = ProcessSession::with_lifecycle(SessionConfig::default(), |event| {
//!     if let SessionEvent::Stopped { exit_code, .. } = &event {
//!         println!("claude exited with {exit_code:?}");
//!     }
//! });
//!
//! {
//!     let _guard = session.guard();
//!     session.start(".").await;
//!     // ... use session ...
//! } // stop requested on drop
//! # }
//! ```
//!
//! [`ProcessSession::with_lifecycle`]: crate::ProcessSession::with_lifecycle

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lifecycle events for a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The process is running and its output is being read
    Started {
        /// Session identifier
        session_id: String,
        /// Directory the process runs in
        working_directory: String,
        /// OS process id, when known
        pid: Option<u32>,
    },

    /// The process could not be started
    SpawnFailed {
        /// Session identifier
        session_id: String,
        /// Error description
        error: String,
    },

    /// The process closed its output on its own
    OutputClosed {
        /// Session identifier
        session_id: String,
    },

    /// `stop` is releasing the process
    Stopping {
        /// Session identifier
        session_id: String,
    },

    /// The process and both channels have been released
    Stopped {
        /// Session identifier
        session_id: String,
        /// Exit code, if the process exited normally within the grace period
        exit_code: Option<i32>,
    },

    /// A read or write failed while running
    Error {
        /// Session identifier
        session_id: String,
        /// Error description
        error: String,
    },
}

impl SessionEvent {
    /// Get the session ID associated with this event
    pub fn session_id(&self) -> &str {
        match self {
            SessionEvent::Started { session_id, .. }
            | SessionEvent::SpawnFailed { session_id, .. }
            | SessionEvent::OutputClosed { session_id }
            | SessionEvent::Stopping { session_id }
            | SessionEvent::Stopped { session_id, .. }
            | SessionEvent::Error { session_id, .. } => session_id,
        }
    }

    /// Get a human-readable description of this event
    pub fn description(&self) -> String {
        match self {
            SessionEvent::Started {
                working_directory, ..
            } => format!("Session started in {working_directory}"),
            SessionEvent::SpawnFailed { error, .. } => format!("Spawn failed: {error}"),
            SessionEvent::OutputClosed { .. } => "Process output closed".to_string(),
            SessionEvent::Stopping { .. } => "Session stopping".to_string(),
            SessionEvent::Stopped {
                exit_code: Some(code),
                ..
            } => format!("Session stopped (exit code {code})"),
            SessionEvent::Stopped { .. } => "Session stopped".to_string(),
            SessionEvent::Error { error, .. } => format!("Error: {error}"),
        }
    }
}

/// Callback invoked for every [`SessionEvent`]
pub type LifecycleCallback = Arc<dyn Fn(SessionEvent) + Send + Sync>;

/// Delivers events for one session to its optional callback
#[derive(Clone)]
pub(crate) struct EventSink {
    session_id: String,
    callback: Option<LifecycleCallback>,
}

impl EventSink {
    pub(crate) fn new(session_id: String, callback: Option<LifecycleCallback>) -> Self {
        Self {
            session_id,
            callback,
        }
    }

    pub(crate) fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Build an event for this session and hand it to the callback
    pub(crate) fn emit(&self, make: impl FnOnce(String) -> SessionEvent) {
        if let Some(callback) = &self.callback {
            callback(make(self.session_id.clone()));
        }
    }
}

/// RAII guard for automatic session cleanup
///
/// Runs its cleanup when dropped, even if the scope is left early. The guard
/// returned by [`ProcessSession::guard`](crate::ProcessSession::guard)
/// schedules `stop` on the current Tokio runtime.
pub struct SessionGuard {
    on_drop: Option<Box<dyn FnOnce() + Send>>,
}

impl SessionGuard {
    /// Create a new session guard with a cleanup function
    pub fn new<F>(on_drop: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            on_drop: Some(Box::new(on_drop)),
        }
    }

    /// Consume the guard without running cleanup
    pub fn disarm(mut self) {
        self.on_drop.take();
    }

    /// Run cleanup now and consume the guard
    pub fn cleanup(mut self) {
        if let Some(cleanup) = self.on_drop.take() {
            cleanup();
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(cleanup) = self.on_drop.take() {
            cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn all_events() -> Vec<SessionEvent> {
        let id = || "sess_1".to_string();
        vec![
            SessionEvent::Started {
                session_id: id(),
                working_directory: "/tmp".to_string(),
                pid: Some(42),
            },
            SessionEvent::SpawnFailed {
                session_id: id(),
                error: "not found".to_string(),
            },
            SessionEvent::OutputClosed { session_id: id() },
            SessionEvent::Stopping { session_id: id() },
            SessionEvent::Stopped {
                session_id: id(),
                exit_code: Some(0),
            },
            SessionEvent::Error {
                session_id: id(),
                error: "broken pipe".to_string(),
            },
        ]
    }

    #[test]
    fn test_all_event_types_have_session_id() {
        for event in all_events() {
            assert_eq!(event.session_id(), "sess_1");
            assert!(!event.description().is_empty());
        }
    }

    #[test]
    fn test_descriptions() {
        let started = &all_events()[0];
        assert!(started.description().contains("/tmp"));

        let stopped = SessionEvent::Stopped {
            session_id: "s".to_string(),
            exit_code: None,
        };
        assert_eq!(stopped.description(), "Session stopped");
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = SessionEvent::OutputClosed {
            session_id: "s".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "output_closed");

        let back: SessionEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_event_sink_stamps_session_id() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let sink = EventSink::new(
            "abc".to_string(),
            Some(Arc::new(move |event| sink_seen.lock().unwrap().push(event))),
        );

        sink.emit(|session_id| SessionEvent::Stopping { session_id });
        assert_eq!(sink.session_id(), "abc");
        assert_eq!(
            *seen.lock().unwrap(),
            vec![SessionEvent::Stopping {
                session_id: "abc".to_string()
            }]
        );

        // Without a callback the event is never built.
        EventSink::new("x".to_string(), None).emit(|_| panic!("should not build"));
    }

    #[test]
    fn test_session_guard_cleanup_on_drop() {
        let cleaned_up = Arc::new(AtomicBool::new(false));
        let flag = cleaned_up.clone();

        {
            let _guard = SessionGuard::new(move || flag.store(true, Ordering::SeqCst));
        }

        assert!(cleaned_up.load(Ordering::SeqCst));
    }

    #[test]
    fn test_session_guard_manual_cleanup() {
        let cleaned_up = Arc::new(AtomicBool::new(false));
        let flag = cleaned_up.clone();

        let guard = SessionGuard::new(move || flag.store(true, Ordering::SeqCst));
        assert!(!cleaned_up.load(Ordering::SeqCst));
        guard.cleanup();
        assert!(cleaned_up.load(Ordering::SeqCst));
    }

    #[test]
    fn test_session_guard_disarm() {
        let cleaned_up = Arc::new(AtomicBool::new(false));
        let flag = cleaned_up.clone();

        SessionGuard::new(move || flag.store(true, Ordering::SeqCst)).disarm();
        assert!(!cleaned_up.load(Ordering::SeqCst));
    }
}
