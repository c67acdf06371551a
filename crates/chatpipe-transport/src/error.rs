//! Transport error types

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur while spawning or talking to the child process
#[derive(Debug, Error)]
pub enum TransportError {
    /// The requested working directory is missing or not a directory
    #[error("working directory {} does not exist or is not a directory", .0.display())]
    InvalidWorkingDirectory(PathBuf),

    /// The executable could not be started
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        /// Executable that was invoked
        program: String,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// A standard stream was not captured at spawn time
    #[error("child process has no {0} pipe")]
    MissingPipe(&'static str),

    /// I/O error on one of the pipes
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
