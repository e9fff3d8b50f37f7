use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Error type for daemon lifecycle operations.
/// Every variant reaching the controller is treated as fatal, except
/// `Signal` and the read errors surfaced by `stop`, which are only logged.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Standard IO errors not tied to a specific resource.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// One of the two detachment forks failed.
    #[error("fork #{stage} failed: {source}")]
    Fork {
        stage: u8,
        #[source]
        source: io::Error,
    },

    /// A system call other than fork failed (setsid, fcntl, ...).
    #[error("syscall '{call}' failed: {source}")]
    SyscallError {
        call: &'static str,
        #[source]
        source: io::Error,
    },

    /// Forking with live threads only carries the calling thread over.
    #[error("refusing to fork: {0} threads are running")]
    MultiThreaded(usize),

    /// A standard stream could not be replaced after detachment.
    #[error("failed to redirect {stream} to {target}: {source}")]
    Redirect {
        stream: &'static str,
        target: String,
        #[source]
        source: io::Error,
    },

    /// The lock file could not be opened or locked for a reason other than contention.
    #[error("failed to lock {}: {source}", .path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Another instance kept the lock for the whole retry budget.
    #[error("failed to acquire lock {} within {timeout:?} ({attempts} attempts)", .path.display())]
    LockTimeout {
        path: PathBuf,
        timeout: Duration,
        attempts: u32,
    },

    /// The pid file could not be opened, truncated, written or synced.
    #[error("failed to write pid file {}: {source}", .path.display())]
    PidWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The pid file exists but could not be read.
    #[error("failed to read pid file {}: {source}", .path.display())]
    PidRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The pid file does not hold a positive decimal pid.
    #[error("pid file {} holds an invalid pid {contents:?}", .path.display())]
    InvalidPid { path: PathBuf, contents: String },

    /// Delivering the termination signal failed (no such process, permission denied).
    #[error("failed to signal pid {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: io::Error,
    },

    /// The worker routine returned an error or panicked.
    #[error("worker failed: {0}")]
    Worker(String),
}

/// A specialized Result type for daemon lifecycle operations.
pub type DaemonResult<T> = Result<T, DaemonError>;
