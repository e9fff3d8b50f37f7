//! The UNIX double fork, see Stevens' "Advanced Programming in the UNIX
//! Environment" for details.
//!
//! Only the grandchild returns from [`detach`]; the two intermediate
//! processes leave through `_exit(0)` without running any cleanup.

use std::io::{self, Write};
use std::os::unix::io::{AsRawFd, RawFd};

use tracing::info;

use crate::daemon::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use crate::stdio::Stdio;
use crate::sys::unix::{self, Fork};

pub(crate) fn detach(config: &DaemonConfig) -> DaemonResult<()> {
    ensure_single_threaded()?;

    fork_and_exit_parent(1)?;

    // Decouple from the parent environment: new session, new process group,
    // no controlling terminal.
    unix::setsid().map_err(|source| DaemonError::SyscallError {
        call: "setsid",
        source,
    })?;
    unix::umask(0);

    // The session leader exits, so the daemon can never reacquire a terminal.
    fork_and_exit_parent(2)?;

    let _ = io::stdout().flush();
    let _ = io::stderr().flush();
    redirect_stream("stdin", &config.stdin, libc::STDIN_FILENO, true)?;
    redirect_stream("stdout", &config.stdout, libc::STDOUT_FILENO, false)?;
    redirect_stream("stderr", &config.stderr, libc::STDERR_FILENO, false)?;

    info!(pid = std::process::id(), "OK daemonized");
    Ok(())
}

fn ensure_single_threaded() -> DaemonResult<()> {
    match unix::thread_count() {
        Some(n) if n > 1 => Err(DaemonError::MultiThreaded(n)),
        _ => Ok(()),
    }
}

fn fork_and_exit_parent(stage: u8) -> DaemonResult<()> {
    match unix::fork() {
        Ok(Fork::Parent) => unix::exit_immediately(0),
        Ok(Fork::Child) => Ok(()),
        Err(source) => Err(DaemonError::Fork { stage, source }),
    }
}

fn redirect_stream(
    name: &'static str,
    stdio: &Stdio,
    target_fd: RawFd,
    readable: bool,
) -> DaemonResult<()> {
    let redirect_err = |source: io::Error| DaemonError::Redirect {
        stream: name,
        target: stdio.describe(),
        source,
    };

    match stdio {
        Stdio::Keep => Ok(()),
        Stdio::File(f) => unix::dup2(f.as_raw_fd(), target_fd).map_err(redirect_err),
        Stdio::Devnull | Stdio::Path(_) => {
            // The opened file is closed on drop; the duplicate stays.
            if let Some(f) = stdio.open(readable).map_err(redirect_err)? {
                unix::dup2(f.as_raw_fd(), target_fd).map_err(redirect_err)?;
            }
            Ok(())
        }
    }
}
