//! Session configuration

use chatpipe_transport::ProcessConfig;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Executable override
pub const ENV_CLI_PATH: &str = "CHATPIPE_CLI_PATH";

/// Argument list override, split with shell quoting rules
pub const ENV_CLI_ARGS: &str = "CHATPIPE_CLI_ARGS";

/// Shutdown grace period override, in milliseconds
pub const ENV_SHUTDOWN_TIMEOUT_MS: &str = "CHATPIPE_SHUTDOWN_TIMEOUT_MS";

/// Invalid configuration values
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable could not be parsed
    #[error("invalid value for {var}: {reason}")]
    InvalidVar {
        /// Variable name
        var: &'static str,
        /// What was wrong with it
        reason: String,
    },
}

/// Configuration for a [`ProcessSession`](crate::ProcessSession)
///
/// Controls which executable is launched, with what arguments and
/// environment, and how long `stop` waits for it to exit.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Path to the assistant CLI executable
    pub cli_path: String,

    /// Arguments passed to the CLI
    pub args: Vec<String>,

    /// Extra environment variables for the child
    pub env: HashMap<String, String>,

    /// Do not inherit the parent's environment
    pub clear_env: bool,

    /// How long `stop` waits for the process after each termination step
    pub shutdown_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let process = ProcessConfig::default();
        Self {
            cli_path: process.cli_path,
            args: process.args,
            env: process.env,
            clear_env: process.clear_env,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl SessionConfig {
    /// Create a new session config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Unset variables keep their defaults. This will look for:
    /// - `CHATPIPE_CLI_PATH` for the executable
    /// - `CHATPIPE_CLI_ARGS` for the argument list (shell-quoted; empty means none)
    /// - `CHATPIPE_SHUTDOWN_TIMEOUT_MS` for the shutdown grace period
    pub fn from_env() -> Result<Self, ConfigError> {
        use std::env;

        let mut config = Self::default();

        if let Ok(cli_path) = env::var(ENV_CLI_PATH) {
            let cli_path = cli_path.trim();
            if cli_path.is_empty() {
                return Err(ConfigError::InvalidVar {
                    var: ENV_CLI_PATH,
                    reason: "must not be empty".to_string(),
                });
            }
            config.cli_path = cli_path.to_string();
        }

        if let Ok(args) = env::var(ENV_CLI_ARGS) {
            config.args = shell_words::split(&args).map_err(|e| ConfigError::InvalidVar {
                var: ENV_CLI_ARGS,
                reason: e.to_string(),
            })?;
        }

        if let Ok(timeout) = env::var(ENV_SHUTDOWN_TIMEOUT_MS) {
            let millis = timeout
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidVar {
                    var: ENV_SHUTDOWN_TIMEOUT_MS,
                    reason: e.to_string(),
                })?;
            config.shutdown_timeout = Duration::from_millis(millis);
        }

        Ok(config)
    }

    /// Set the CLI path
    pub fn with_cli_path(mut self, path: impl Into<String>) -> Self {
        self.cli_path = path.into();
        self
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

    /// Set an environment variable for the child
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Start the child with only the variables set through [`SessionConfig::with_env`]
    pub fn with_clear_env(mut self, clear: bool) -> Self {
        self.clear_env = clear;
        self
    }

    /// Set the shutdown grace period
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Lower into the transport's spawn configuration
    pub fn process_config(&self) -> ProcessConfig {
        ProcessConfig {
            cli_path: self.cli_path.clone(),
            args: self.args.clone(),
            env: self.env.clone(),
            clear_env: self.clear_env,
        }
    }
}
