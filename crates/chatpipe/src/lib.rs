//! Process-backed chat sessions for the Claude Code CLI
//!
//! chatpipe runs the assistant CLI as a long-lived child process, pipes user
//! text to its standard input, and streams its output back as an ordered,
//! observable transcript. A front end (editor panel, terminal UI) only has to
//! render [`ConversationState`] snapshots and call [`ProcessSession::send`].
//!
//! # Key Features
//!
//! - **Turn tracking**: a processing flag that is set by each user message and
//!   cleared by the first line of output that answers it
//! - **Merged output**: stderr shares stdout's pipe, so diagnostics appear in
//!   the transcript where the process printed them
//! - **Snapshot subscriptions**: observers get the full state after every
//!   mutation instead of reconciling deltas
//! - **Errors in context**: no process failure is raised to the caller; each
//!   one becomes a SYSTEM message in the transcript
//! - **Bounded shutdown**: `stop` closes both channels and waits a bounded
//!   time for the process to exit
//!
//! # Architecture
//!
//! 1. **Protocol Layer** (`chatpipe-protocol`): message types
//! 2. **Transport Layer** (`chatpipe-transport`): spawning and line decoding
//! 3. **Session Layer** (this crate): state machine, read loop, transcript
//!
//! # Usage Example
//!
//! ```no_run
//! use chatpipe::{ProcessSession, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let session = ProcessSession::new(SessionConfig::default());
//!     let mut updates = session.subscribe();
//!
//!     session.start("/path/to/repo").await;
//!     session.send("What does this project do?").await;
//!
//!     while let Some(state) = updates.recv().await {
//!         if !state.is_processing() {
//!             break;
//!         }
//!     }
//!
//!     for message in session.snapshot().messages() {
//!         println!("{}: {}", message.role().label(), message.content());
//!     }
//!
//!     session.stop().await;
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod log;
pub mod session;

// Re-export commonly used types
pub use config::{ConfigError, SessionConfig};
pub use error::{ErrorKind, SessionError};
pub use lifecycle::{SessionEvent, SessionGuard};
pub use log::{ConversationLog, ConversationState, Subscription};
pub use session::{ProcessSession, SessionState};

pub use chatpipe_protocol::{Message, MessageRole};
