/// Error handling module for ephemeral-redis.
///
/// This module defines the error types used throughout the library.
/// Startup failures carry the full contents of the server log so that the
/// server's own diagnostics (for example a rejected config directive) reach
/// the caller unchanged.
///
/// # Example
///
/// ```
/// use ephemeral_redis::error::{Error, Result};
///
/// fn handle_error(result: Result<()>) {
///     match result {
///         Ok(_) => println!("Operation succeeded"),
///         Err(e @ Error::Startup { .. }) => println!("Server log:\n{}", e.log().unwrap_or("")),
///         Err(Error::ShutdownTimeout { pid, .. }) => println!("Process {} would not die", pid),
///         Err(e) => println!("Other error: {}", e),
///     }
/// }
/// ```
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Why a server failed to reach the ready state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupFailure {
    /// The executable could not be spawned at all.
    ///
    /// `errno` is the raw OS error code reported by the spawn call, when
    /// one is available (e.g. `ENOENT` for a missing executable).
    SpawnFailed {
        /// Raw OS error code
        errno: Option<i32>,
    },

    /// The process exited before printing the readiness marker.
    Exited {
        /// Exit code, absent when the process was killed by a signal
        code: Option<i32>,
    },

    /// The process stayed alive but never printed the readiness marker.
    TimedOut {
        /// How long the supervisor waited
        waited: Duration,
    },
}

impl fmt::Display for StartupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpawnFailed { errno: Some(errno) } => {
                write!(f, "could not spawn executable (os error {})", errno)
            }
            Self::SpawnFailed { errno: None } => write!(f, "could not spawn executable"),
            Self::Exited { code: Some(code) } => {
                write!(f, "process exited with status {} before becoming ready", code)
            }
            Self::Exited { code: None } => {
                write!(f, "process was terminated by a signal before becoming ready")
            }
            Self::TimedOut { waited } => write!(f, "not ready after {:?}", waited),
        }
    }
}

/// Errors that can occur in the ephemeral-redis library.
///
/// Every startup and shutdown failure is returned to the caller. The only
/// place errors are swallowed is the drop/exit-hook cleanup path, which logs
/// them instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to parse configuration from a file or string.
    ///
    /// This error occurs when:
    /// - The configuration file cannot be read
    /// - The configuration JSON is malformed
    /// - Field types are incorrect
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration parsed but contains values that cannot be used.
    ///
    /// This error occurs when:
    /// - The executable or readiness marker is empty
    /// - The timeout or poll interval is zero
    /// - An option key is empty or contains whitespace
    /// - An option key or value contains a newline
    /// - Neither a positive port nor a unix socket is configured
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The server process did not reach the ready state.
    ///
    /// `log` holds the full server log at the time of failure. For a spawn
    /// failure it contains the `exec failed` line written by the supervisor.
    #[error("failed to launch {executable}: {failure}\n{log}")]
    Startup {
        /// Executable that was launched
        executable: String,
        /// What went wrong
        failure: StartupFailure,
        /// Server log contents
        log: String,
    },

    /// The process survived every signal in the escalation sequence.
    #[error("process {pid} did not exit within {timeout:?} after SIGKILL")]
    ShutdownTimeout {
        /// Process that refused to exit
        pid: u32,
        /// Per-signal wait
        timeout: Duration,
    },

    /// A signal could not be delivered for a reason other than the process
    /// being gone already.
    #[error("Signal delivery failed: {0}")]
    Signal(String),

    /// Scratch directory, config file or log file operation failed.
    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        /// Path that was being accessed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// `start` was called on a handle whose previous start failed.
    ///
    /// Failed starts are never retried; create a new handle instead.
    #[error("Server failed to start earlier; create a new instance to retry")]
    StartAfterFailure,

    /// Any other error not covered by the above categories.
    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Server log attached to a startup failure.
    pub fn log(&self) -> Option<&str> {
        match self {
            Self::Startup { log, .. } => Some(log),
            _ => None,
        }
    }

    /// Returns `true` when a startup failure happened because the process
    /// was already dead (spawn failure or early exit) rather than a timeout.
    pub fn process_exited(&self) -> bool {
        matches!(
            self,
            Self::Startup {
                failure: StartupFailure::SpawnFailed { .. } | StartupFailure::Exited { .. },
                ..
            }
        )
    }

    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }
}

/// Result type for ephemeral-redis operations.
///
/// This is a convenience type alias for `std::result::Result` with the `Error` type
/// from this module.
pub type Result<T> = std::result::Result<T, Error>;
