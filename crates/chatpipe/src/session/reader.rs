//! Background read loop
//!
//! One task per running session. It owns the output side of the process
//! and is the only writer of ASSISTANT messages.

use crate::error::SessionError;
use crate::lifecycle::{EventSink, SessionEvent};
use crate::log::ConversationLog;
use crate::session::core::record_error;
use crate::session::state::{SessionState, StateCell};
use chatpipe_protocol::Message;
use chatpipe_transport::LineReader;
use std::io;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio::sync::oneshot;
use tracing::{debug, info};

pub(crate) const SESSION_ENDED: &str = "Claude Code session ended";

/// What the read loop needs from its session
///
/// Holds no reference to the process itself, so dropping every session
/// handle still kills the child and ends the loop.
#[derive(Clone)]
pub(crate) struct ReaderContext {
    pub(crate) log: ConversationLog,
    pub(crate) state: Arc<StateCell>,
    pub(crate) events: EventSink,
}

/// Read lines until end of output, a read error, or `shutdown`
///
/// Shutdown wins over data that is ready at the same time. A dropped
/// `shutdown` sender counts as a shutdown.
pub(crate) async fn run<R>(
    ctx: ReaderContext,
    mut lines: LineReader<R>,
    mut shutdown: oneshot::Receiver<()>,
) where
    R: AsyncRead + Unpin,
{
    debug!(session_id = %ctx.events.session_id(), "read loop started");
    let mut received = 0u64;

    loop {
        let next = tokio::select! {
            biased;
            _ = &mut shutdown => {
                debug!(session_id = %ctx.events.session_id(), lines = received, "read loop shut down");
                return;
            }
            next = lines.next_line() => next,
        };

        match next {
            Ok(Some(line)) => {
                received += 1;
                debug!(bytes = line.len(), "received line");
                // The first line ends the turn; later lines leave the flag cleared.
                ctx.log.append_with_processing(Message::assistant(line), false);
            }
            Ok(None) => {
                output_closed(&ctx, received);
                return;
            }
            Err(err) => {
                read_failed(&ctx, err);
                return;
            }
        }
    }
}

fn output_closed(ctx: &ReaderContext, received: u64) {
    if ctx
        .state
        .transition(SessionState::Running, SessionState::Stopped)
        .is_ok()
    {
        info!(session_id = %ctx.events.session_id(), lines = received, "process closed its output");
        ctx.log
            .append_with_processing(Message::system(SESSION_ENDED), false);
        ctx.events
            .emit(|session_id| SessionEvent::OutputClosed { session_id });
    } else {
        // `stop` already owns the teardown.
        ctx.log.set_processing(false);
    }
}

fn read_failed(ctx: &ReaderContext, err: io::Error) {
    let err = SessionError::Read(err);
    let _ = ctx.state.transition(SessionState::Running, SessionState::Stopped);
    record_error(&ctx.log, &err);
    ctx.events.emit(|session_id| SessionEvent::Error {
        session_id,
        error: err.to_string(),
    });
}
