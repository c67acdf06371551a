//! Shared message types for chatpipe
//!
//! Pure data: the transcript [`Message`] record, its [`MessageRole`], and the
//! small text helpers the chat front end uses to turn raw input into the text
//! that is piped to the assistant process.
//!
//! # Type Organization
//!
//! - **Message types**: [`message`] - Immutable transcript entries
//! - **Prompt helpers**: [`prompt`] - Input normalization and snippet prompts
//!
//! # Usage
//!
//! ```
//! use chatpipe_protocol::{Message, MessageRole};
//!
//! let msg = Message::user("fix bug");
//! assert_eq!(msg.role(), MessageRole::User);
//! assert_eq!(msg.content(), "fix bug");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod message;
pub mod prompt;

pub use message::{Message, MessageRole};
pub use prompt::{code_snippet_prompt, prepare_input};
