//! Shared helpers for session integration tests
//!
//! Sessions here run small `/bin/sh` scripts in place of the assistant CLI,
//! so the tests only need a POSIX shell.

#![allow(dead_code)]

use chatpipe::{
    ConversationState, Message, MessageRole, ProcessSession, SessionConfig, SessionState,
    Subscription,
};
use std::time::Duration;

/// Upper bound for anything a test waits on
pub const WAIT: Duration = Duration::from_secs(10);

/// Install a test-friendly tracing subscriber (`RUST_LOG` controls output)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Config that runs `script` with `/bin/sh -c`
pub fn sh_config(script: &str) -> SessionConfig {
    SessionConfig::new()
        .with_cli_path("/bin/sh")
        .with_args(["-c", script])
        .with_shutdown_timeout(Duration::from_millis(500))
}

/// Idle session that runs `script`
pub fn sh_session(script: &str) -> ProcessSession {
    init_tracing();
    ProcessSession::new(sh_config(script))
}

/// Wait until a snapshot satisfies `predicate`
///
/// # Panics
///
/// Panics if nothing matches within [`WAIT`].
pub async fn wait_for<F>(sub: &mut Subscription, mut predicate: F) -> ConversationState
where
    F: FnMut(&ConversationState) -> bool,
{
    tokio::time::timeout(WAIT, async {
        while let Some(state) = sub.recv().await {
            if predicate(&state) {
                return state;
            }
        }
        panic!("transcript closed before the condition held");
    })
    .await
    .expect("timed out waiting for transcript")
}

/// Wait until the session reaches `Stopped`
pub async fn wait_stopped(session: &ProcessSession) {
    let mut rx = session.watch_state();
    tokio::time::timeout(WAIT, rx.wait_for(|state| *state == SessionState::Stopped))
        .await
        .expect("timed out waiting for session to stop")
        .expect("state channel closed");
}

/// Contents of every message with `role`, in order
pub fn contents_of(state: &ConversationState, role: MessageRole) -> Vec<String> {
    state
        .messages()
        .iter()
        .filter(|m| m.role() == role)
        .map(|m| m.content().to_string())
        .collect()
}

/// Whether the last message is the end-of-session note
pub fn has_ended(state: &ConversationState) -> bool {
    state.last().map(Message::content) == Some("Claude Code session ended")
}
