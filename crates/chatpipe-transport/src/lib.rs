//! Subprocess transport for chatpipe
//!
//! Spawns the assistant CLI, merges its standard error into its standard
//! output so diagnostics keep their place in the stream, and turns the raw
//! byte stream into discrete lines.
//!
//! # Architecture
//!
//! - **Process spawning**: [`ProcessHandle`] owns the child and both pipes
//! - **Line decoding**: [`LineDecoder`] / [`LineReader`] split output on `\n`
//! - **Error handling**: [`TransportError`] for every spawn and I/O failure
//!
//! # Usage
//!
//! ```ignore
//! use chatpipe_transport::{LineReader, ProcessConfig, ProcessHandle};
//!
//! let handle = ProcessHandle::spawn(&ProcessConfig::default(), "/repo".as_ref()).await?;
//! let (mut child, mut input, output) = handle.into_parts();
//! input.send_line("hello").await?;
//! let mut lines = LineReader::new(output);
//! while let Some(line) = lines.next_line().await? {
//!     println!("{line}");
//! }
//! child.terminate(std::time::Duration::from_secs(5)).await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod subprocess;

// Re-export commonly used types
pub use error::{Result, TransportError};
pub use subprocess::{
    LineDecoder, LineReader, ProcessChild, ProcessConfig, ProcessHandle, ProcessInput,
    ProcessOutput,
};
