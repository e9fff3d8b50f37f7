//! PID file management.
//!
//! The pid file holds the decimal process id of the instance that last passed
//! the lock, with no trailing metadata. It is rewritten on every start and
//! never deleted, so its value may be stale once that process exits.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::io::AsRawFd;
use std::path::Path;

use tracing::debug;

use crate::error::{DaemonError, DaemonResult};
use crate::sys::unix;

/// Writes the current process id to `path`, returning it.
pub fn write_current_pid(path: &Path) -> DaemonResult<u32> {
    let pid = std::process::id();
    debug!(pid, path = %path.display(), "write pid");
    write_pid(path, pid)?;
    Ok(pid)
}

pub(crate) fn write_pid(path: &Path, pid: u32) -> DaemonResult<()> {
    let pid_err = |source: io::Error| DaemonError::PidWrite {
        path: path.to_path_buf(),
        source,
    };

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(pid_err)?;
    unix::set_cloexec(file.as_raw_fd()).map_err(pid_err)?;

    file.set_len(0).map_err(pid_err)?;
    write!(file, "{pid}").map_err(pid_err)?;
    file.sync_all().map_err(pid_err)?;
    Ok(())
}

/// Reads the pid stored at `path`.
///
/// Returns `Ok(None)` when the file does not exist. Surrounding whitespace is
/// ignored; anything that is not a positive `pid_t` is [`DaemonError::InvalidPid`].
pub fn read_pid(path: &Path) -> DaemonResult<Option<u32>> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(DaemonError::PidRead {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    // Zero and negative values would address process groups when signalled.
    match contents.trim().parse::<libc::pid_t>() {
        Ok(pid) if pid > 0 => Ok(Some(pid as u32)),
        _ => Err(DaemonError::InvalidPid {
            path: path.to_path_buf(),
            contents,
        }),
    }
}
