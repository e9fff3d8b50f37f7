//! # daemon_ctl
//!
//! Turns a worker routine into a well-behaved POSIX daemon: double-fork
//! detachment, at most one running instance per pid file (enforced by an
//! advisory lock on `<pid file>.lock`), and `start`/`stop`/`restart`
//! control through the pid file and SIGTERM.
//!
//! ```no_run
//! use daemon_ctl::{Daemon, DaemonConfig};
//!
//! let daemon = Daemon::new(DaemonConfig::new("/tmp/worker.pid"));
//! daemon
//!     .run_with_args(std::env::args_os(), || {
//!         // the service loop
//!         Ok::<_, std::io::Error>(())
//!     })
//!     .exit();
//! ```

#[cfg(not(unix))]
compile_error!("daemon_ctl only supports POSIX targets");

mod cli;
mod daemon;
mod detach;
mod error;
mod lifecycle;
mod lock;
mod logging;
mod pid;
mod signal;
mod stdio;
mod sys;

// Re-export public types to keep the API flat
pub use cli::{Cli, Command, Exit, parse_args};
pub use daemon::DaemonConfig;
pub use error::{DaemonError, DaemonResult};
pub use lifecycle::{Daemon, StopOutcome, standard_daemonize};
pub use lock::{DEFAULT_LOCK_INTERVAL, DEFAULT_LOCK_TIMEOUT, LOCK_SUFFIX, LockHandle, LockPolicy, try_acquire};
pub use logging::{LOG_ENV, silent, stderr_dispatch};
pub use pid::{read_pid, write_current_pid};
pub use signal::{STOP_SIGNAL, termination_flag};
pub use stdio::Stdio;
