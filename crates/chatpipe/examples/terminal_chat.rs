//! Terminal Chat Example
//!
//! A line-mode front end for a Claude Code session rooted in the current
//! directory. Type a message and press enter. Commands:
//!
//! - `/clear` empties the transcript
//! - `/snippet <file>` asks about the contents of a file
//! - `/quit` stops the session and exits
//!
//! The CLI can be overridden with `CHATPIPE_CLI_PATH` and `CHATPIPE_CLI_ARGS`.
//!
//! Run with: cargo run --example terminal_chat

use chatpipe::{ConversationState, ProcessSession, SessionConfig, SessionEvent};
use futures::StreamExt;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let config = SessionConfig::from_env()?;
    let session = ProcessSession::with_lifecycle(config, |event| match &event {
        SessionEvent::Stopped { .. } | SessionEvent::SpawnFailed { .. } => {
            eprintln!("[{}]", event.description());
        }
        _ => tracing::debug!(event = %event.description(), "lifecycle"),
    });
    let _guard = session.guard();

    // Print every message once, in order.
    let mut updates = session.subscribe();
    let printer = tokio::spawn(async move {
        let mut printed = 0;
        while let Some(state) = updates.next().await {
            printed = print_new(&state, printed);
        }
    });

    let cwd = std::env::current_dir()?;
    session.start(&cwd).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "/quit" => break,
            "/clear" => session.clear(),
            command if command.starts_with("/snippet ") => {
                let path = command.trim_start_matches("/snippet ").trim();
                send_snippet(&session, Path::new(path)).await;
            }
            _ => {
                session.submit(&line).await;
            }
        }
    }

    session.stop().await;
    drop(session);
    printer.abort();
    Ok(())
}

/// Print messages past `printed`; returns the new count
fn print_new(state: &ConversationState, printed: usize) -> usize {
    // The transcript shrank: it was cleared.
    let start = if state.len() < printed { 0 } else { printed };

    for message in &state.messages()[start..] {
        println!(
            "[{}] {}: {}",
            message.time_label(),
            message.role().label(),
            message.content()
        );
    }
    if state.is_processing() && start < state.len() {
        println!("...");
    }
    state.len()
}

async fn send_snippet(session: &ProcessSession, path: &Path) {
    match tokio::fs::read_to_string(path).await {
        Ok(selection) => {
            let file_name = path.file_name().and_then(|name| name.to_str());
            if !session.send_code_snippet(file_name, &selection).await {
                eprintln!("{} is empty", path.display());
            }
        }
        Err(err) => eprintln!("cannot read {}: {err}", path.display()),
    }
}
