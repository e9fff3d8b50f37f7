//! Exclusive advisory lock on a dedicated lock file.
//!
//! The lock is a `flock(2)` on an open file description. It is released by
//! [`LockHandle::release`], by dropping the handle, or by the kernel when the
//! holding process dies. The last case is what makes crashed daemons
//! harmless: no stale-lock cleanup exists or is needed.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{DaemonError, DaemonResult};
use crate::sys::unix;

/// Appended to the pid file path to obtain the lock file path.
pub const LOCK_SUFFIX: &str = ".lock";

/// Retry budget used when none is configured.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);
/// Pause between two attempts used when none is configured.
pub const DEFAULT_LOCK_INTERVAL: Duration = Duration::from_millis(100);

/// Bounded polling schedule for lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    /// Total time spent retrying a contended lock.
    pub timeout: Duration,
    /// Pause between two attempts.
    pub interval: Duration,
}

impl Default for LockPolicy {
    fn default() -> Self {
        LockPolicy {
            timeout: DEFAULT_LOCK_TIMEOUT,
            interval: DEFAULT_LOCK_INTERVAL,
        }
    }
}

impl LockPolicy {
    /// Number of attempts made before giving up: `timeout / interval + 1`,
    /// capped at `u32::MAX`. A zero interval degenerates to a single attempt.
    pub fn attempts(&self) -> u32 {
        let per_try = self.interval.as_nanos();
        if per_try == 0 {
            return 1;
        }
        let n = self.timeout.as_nanos() / per_try;
        u32::try_from(n).unwrap_or(u32::MAX).saturating_add(1)
    }
}

/// An acquired exclusive lock. Owns the only descriptor holding it.
#[derive(Debug)]
pub struct LockHandle {
    path: PathBuf,
    file: Option<File>,
}

impl LockHandle {
    /// Path of the locked file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `false` once [`LockHandle::release`] has run.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Removes the lock and closes the descriptor. Calling it again is a no-op.
    pub fn release(&mut self) -> DaemonResult<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        unix::unlock(file.as_raw_fd()).map_err(|source| DaemonError::Lock {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "released lock");
        Ok(())
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

/// Opens (creating if needed) `path` and takes an exclusive lock on it,
/// retrying on contention according to `policy`.
///
/// Contention is retried silently; any other failure is returned at once.
/// When the budget is exhausted the result is [`DaemonError::LockTimeout`].
pub fn try_acquire(path: &Path, policy: LockPolicy) -> DaemonResult<LockHandle> {
    let lock_err = |source: io::Error| DaemonError::Lock {
        path: path.to_path_buf(),
        source,
    };

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(lock_err)?;
    unix::set_cloexec(file.as_raw_fd()).map_err(lock_err)?;

    let attempts = policy.attempts();
    let acquired = acquire_with(
        attempts,
        policy.interval,
        || match unix::try_lock_exclusive(file.as_raw_fd()) {
            Ok(()) => Ok(true),
            Err(e) if is_contention(&e) => Ok(false),
            Err(e) => Err(lock_err(e)),
        },
        thread::sleep,
    )?;

    if !acquired {
        info!(path = %path.display(), attempts, "failed to acquire lock");
        return Err(DaemonError::LockTimeout {
            path: path.to_path_buf(),
            timeout: policy.timeout,
            attempts,
        });
    }

    info!(path = %path.display(), "acquired lock");
    Ok(LockHandle {
        path: path.to_path_buf(),
        file: Some(file),
    })
}

fn is_contention(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Runs `attempt` up to `attempts` times, sleeping `interval` between two
/// contended tries. Returns `Ok(true)` on the first success, `Ok(false)` when
/// every attempt was contended, and the first hard error otherwise.
fn acquire_with<A, S>(
    attempts: u32,
    interval: Duration,
    mut attempt: A,
    mut sleep: S,
) -> DaemonResult<bool>
where
    A: FnMut() -> DaemonResult<bool>,
    S: FnMut(Duration),
{
    for n in 1..=attempts {
        if attempt()? {
            return Ok(true);
        }
        if n < attempts {
            sleep(interval);
        }
    }
    Ok(false)
}
