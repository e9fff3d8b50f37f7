use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{DaemonError, DaemonResult};
use crate::lock::{LOCK_SUFFIX, LockPolicy};
use crate::stdio::Stdio;

/// Configuration for one lifecycle session.
///
/// The lock file is always derived from the pid file by appending
/// [`LOCK_SUFFIX`], so the two resources pair 1:1 and live side by side.
#[derive(Debug)]
pub struct DaemonConfig {
    pub(crate) pid_file: PathBuf,
    pub(crate) lock_file: PathBuf,
    pub(crate) stdin: Stdio,
    pub(crate) stdout: Stdio,
    pub(crate) stderr: Stdio,
    pub(crate) lock_policy: LockPolicy,
}

impl DaemonConfig {
    /// Creates a new configuration around `pid_file`.
    ///
    /// # Defaults
    /// - Stdio: `/dev/null` for all three streams
    /// - Lock timeout: 10 seconds, polled every 100 milliseconds
    pub fn new<P: Into<PathBuf>>(pid_file: P) -> Self {
        let pid_file = pid_file.into();
        let lock_file = lock_path_for(&pid_file);
        DaemonConfig {
            pid_file,
            lock_file,
            stdin: Stdio::devnull(),
            stdout: Stdio::devnull(),
            stderr: Stdio::devnull(),
            lock_policy: LockPolicy::default(),
        }
    }

    // --- Public Getters ---

    /// Returns the configured PID file path.
    pub fn pid_file_path(&self) -> &Path {
        &self.pid_file
    }

    /// Returns the lock file path derived from the PID file path.
    pub fn lock_file_path(&self) -> &Path {
        &self.lock_file
    }

    /// Returns the lock retry schedule.
    pub fn lock_policy(&self) -> LockPolicy {
        self.lock_policy
    }

    // --- Builder Methods ---

    /// Configures the standard input stream used after detachment.
    pub fn stdin<S: Into<Stdio>>(mut self, stdio: S) -> Self {
        self.stdin = stdio.into();
        self
    }

    /// Configures the standard output stream used after detachment.
    pub fn stdout<S: Into<Stdio>>(mut self, stdio: S) -> Self {
        self.stdout = stdio.into();
        self
    }

    /// Configures the standard error stream used after detachment.
    pub fn stderr<S: Into<Stdio>>(mut self, stdio: S) -> Self {
        self.stderr = stdio.into();
        self
    }

    /// Total time spent retrying a contended lock before giving up.
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_policy.timeout = timeout;
        self
    }

    /// Pause between two lock attempts.
    pub fn lock_interval(mut self, interval: Duration) -> Self {
        self.lock_policy.interval = interval;
        self
    }

    /// Validates configuration without starting anything.
    /// Checks that the PID path is set and that its directory exists.
    pub fn build(self) -> DaemonResult<Self> {
        if self.pid_file.as_os_str().is_empty() {
            return Err(DaemonError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "PID file path is empty",
            )));
        }
        let parent_missing = self
            .pid_file
            .parent()
            .map(|p| !p.as_os_str().is_empty() && !p.exists())
            .unwrap_or(false);
        if parent_missing {
            return Err(DaemonError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "PID file directory does not exist",
            )));
        }
        Ok(self)
    }
}

impl From<PathBuf> for DaemonConfig {
    fn from(pid_file: PathBuf) -> Self {
        DaemonConfig::new(pid_file)
    }
}

impl From<&Path> for DaemonConfig {
    fn from(pid_file: &Path) -> Self {
        DaemonConfig::new(pid_file)
    }
}

impl From<&str> for DaemonConfig {
    fn from(pid_file: &str) -> Self {
        DaemonConfig::new(pid_file)
    }
}

fn lock_path_for(pid_file: &Path) -> PathBuf {
    let mut name = OsString::from(pid_file.as_os_str());
    name.push(LOCK_SUFFIX);
    PathBuf::from(name)
}
