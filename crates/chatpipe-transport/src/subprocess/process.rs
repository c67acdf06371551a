//! Process management for CLI subprocess

use crate::error::{Result, TransportError};
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter, ReadBuf};
use tokio::process::{Child as TokioChild, Command};
use tracing::{debug, info, warn};

/// Configuration for spawning a CLI process
#[derive(Clone, Debug)]
pub struct ProcessConfig {
    /// Path to the CLI executable
    pub cli_path: String,

    /// Arguments to pass to the CLI
    pub args: Vec<String>,

    /// Extra environment variables for the child
    pub env: HashMap<String, String>,

    /// Start the child with an empty environment (only `env` is passed)
    pub clear_env: bool,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            cli_path: "claude".to_string(),
            args: vec!["--no-color".to_string()],
            env: HashMap::new(),
            clear_env: false,
        }
    }
}

impl ProcessConfig {
    /// Create a configuration for an arbitrary executable with no arguments
    pub fn new(cli_path: impl Into<String>) -> Self {
        Self {
            cli_path: cli_path.into(),
            args: Vec::new(),
            env: HashMap::new(),
            clear_env: false,
        }
    }

    /// Add an argument
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Replace the argument list
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set an environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Isolate the child from the parent's environment
    ///
    /// When set, only variables added through [`ProcessConfig::with_env`]
    /// reach the child.
    pub fn with_clear_env(mut self, clear: bool) -> Self {
        self.clear_env = clear;
        self
    }
}

/// Handle to a freshly spawned CLI process
///
/// Owns the child plus both ends of its I/O. Split it with
/// [`ProcessHandle::into_parts`] so the writer and the reader can live on
/// different tasks.
pub struct ProcessHandle {
    child: ProcessChild,
    input: ProcessInput,
    output: ProcessOutput,
}

impl ProcessHandle {
    /// Spawn the CLI rooted at `working_directory`
    ///
    /// Standard error shares one OS pipe with standard output, so the reader
    /// sees diagnostics interleaved exactly as the process wrote them.
    pub async fn spawn(config: &ProcessConfig, working_directory: &Path) -> Result<Self> {
        match tokio::fs::metadata(working_directory).await {
            Ok(metadata) if metadata.is_dir() => {}
            _ => {
                return Err(TransportError::InvalidWorkingDirectory(
                    working_directory.to_path_buf(),
                ));
            }
        }

        let (reader, writer) = io::pipe()?;

        let mut cmd = Command::new(&config.cli_path);
        cmd.args(&config.args).current_dir(working_directory);

        if config.clear_env {
            cmd.env_clear();
        }
        cmd.envs(&config.env);

        cmd.stdin(Stdio::piped());
        cmd.stdout(writer.try_clone()?);
        cmd.stderr(writer);
        cmd.kill_on_drop(true);

        let spawned = cmd.spawn();
        // The command still holds our copies of the write end; the reader only
        // sees end-of-stream once they are gone.
        drop(cmd);

        let mut process = spawned.map_err(|source| TransportError::Spawn {
            program: config.cli_path.clone(),
            source,
        })?;

        let stdin = process
            .stdin
            .take()
            .ok_or(TransportError::MissingPipe("stdin"))?;
        let output = ProcessOutput::from_pipe(reader)?;

        info!(
            program = %config.cli_path,
            pid = process.id(),
            working_directory = %working_directory.display(),
            "spawned CLI process"
        );

        Ok(Self {
            child: ProcessChild { child: process },
            input: ProcessInput::from_writer(BufWriter::new(stdin)),
            output,
        })
    }

    /// OS process id, if still known
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Split into the child, its input channel, and its merged output
    pub fn into_parts(self) -> (ProcessChild, ProcessInput, ProcessOutput) {
        (self.child, self.input, self.output)
    }
}

/// The running child process
pub struct ProcessChild {
    child: TokioChild,
}

impl ProcessChild {
    /// OS process id (`None` once the process has been reaped)
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Exit status if the process has already exited
    pub fn try_exit_status(&mut self) -> Result<Option<ExitStatus>> {
        Ok(self.child.try_wait()?)
    }

    /// Ask the process to exit and wait for it, bounded by `grace`
    ///
    /// On Unix the process first receives SIGTERM; if it is still alive after
    /// `grace` it is killed and waited on for another `grace`. Returns `None`
    /// if it never reported an exit status within that time.
    pub async fn terminate(&mut self, grace: Duration) -> Result<Option<ExitStatus>> {
        if let Some(status) = self.child.try_wait()? {
            return Ok(Some(status));
        }

        self.request_exit();
        if let Ok(status) = tokio::time::timeout(grace, self.child.wait()).await {
            return Ok(Some(status?));
        }

        warn!(pid = self.child.id(), "process ignored termination request, killing");
        if let Err(err) = self.child.start_kill() {
            debug!(error = %err, "kill failed");
        }
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => Ok(Some(status?)),
            Err(_) => Ok(None),
        }
    }

    #[cfg(unix)]
    fn request_exit(&mut self) {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let Some(pid) = self.child.id().and_then(|id| i32::try_from(id).ok()) else {
            return;
        };
        if let Err(err) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
            debug!(pid, error = %err, "SIGTERM failed, falling back to kill");
            let _ = self.child.start_kill();
        }
    }

    #[cfg(not(unix))]
    fn request_exit(&mut self) {
        if let Err(err) = self.child.start_kill() {
            debug!(error = %err, "kill failed");
        }
    }
}

/// Write side of the child: its standard input
pub struct ProcessInput {
    writer: Pin<Box<dyn AsyncWrite + Send>>,
}

impl ProcessInput {
    /// Wrap any async writer
    pub fn from_writer<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + 'static,
    {
        Self {
            writer: Box::pin(writer),
        }
    }

    /// Write `text` followed by a single `\n`, then flush
    pub async fn send_line(&mut self, text: &str) -> Result<()> {
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        debug!(bytes = text.len() + 1, "wrote line to process");
        Ok(())
    }

    /// Flush and close the channel
    pub async fn close(mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// Read side of the child: standard output with standard error merged in
pub struct ProcessOutput {
    reader: Pin<Box<dyn AsyncRead + Send>>,
}

impl ProcessOutput {
    /// Wrap any async reader
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self {
            reader: Box::pin(reader),
        }
    }

    #[cfg(unix)]
    fn from_pipe(reader: io::PipeReader) -> Result<Self> {
        use std::os::fd::OwnedFd;
        use tokio::net::unix::pipe;

        let receiver = pipe::Receiver::from_owned_fd(OwnedFd::from(reader))?;
        Ok(Self::from_reader(receiver))
    }

    #[cfg(not(unix))]
    fn from_pipe(reader: io::PipeReader) -> Result<Self> {
        // No async anonymous pipes here: pump the blocking reader on its own
        // thread into an in-memory duplex.
        const BRIDGE_CAPACITY: usize = 64 * 1024;

        let (mut tx, rx) = tokio::io::duplex(BRIDGE_CAPACITY);
        let handle = tokio::runtime::Handle::current();
        std::thread::Builder::new()
            .name("chatpipe-output".to_string())
            .spawn(move || {
                use std::io::Read;

                let mut reader = reader;
                let mut chunk = [0u8; 8192];
                loop {
                    let n = match reader.read(&mut chunk) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => n,
                    };
                    if handle.block_on(tx.write_all(&chunk[..n])).is_err() {
                        break;
                    }
                }
            })?;
        Ok(Self::from_reader(rx))
    }
}

impl AsyncRead for ProcessOutput {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.reader.as_mut().poll_read(cx, buf)
    }
}
