//! Process-backed chat session
//!
//! # Module Organization
//!
//! - [`state`] - Lifecycle state machine (`Idle → Starting → Running → Stopped`)
//! - [`core`] - The `ProcessSession` handle: start, send, stop, subscribe
//! - `reader` - Background task turning process output into messages
//!
//! # Examples
//!
//! ```no_run
//! # use chatpipe::{ProcessSession, SessionConfig};
//! # async fn example() {
//! let session = ProcessSession::new(SessionConfig::default());
//! session.start("/path/to/repo").await;
//!
//! // Whitespace-only input is ignored
//! assert!(!session.submit("   ").await);
//! session.submit("  explain src/main.rs  ").await;
//!
//! session.stop().await;
//! # }
//! ```

pub mod core;
mod reader;
pub mod state;

// Re-export public types
pub use self::core::ProcessSession;
pub use self::state::SessionState;
