//! Subprocess transport for CLI communication
//!
//! Implements line-oriented communication with the assistant CLI via its
//! stdin and its merged stdout/stderr.

pub mod lines;
pub mod process;

pub use lines::{LineDecoder, LineReader};
pub use process::{ProcessChild, ProcessConfig, ProcessHandle, ProcessInput, ProcessOutput};
