//! Lifecycle controller.
//!
//! Each invocation is one transition over the filesystem artifacts (lock
//! file, pid file); nothing else persists between invocations.
//!
//! | Invocation | Flow |
//! |---|---|
//! | none | lock, pid, worker (foreground) |
//! | `start` | detach, lock, pid, worker |
//! | `stop` | read pid, SIGTERM |
//! | `restart` | stop, then start |

use std::ffi::OsString;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};

use tracing::{Dispatch, debug, error, info, warn};

use crate::cli::{self, Command, Exit};
use crate::daemon::DaemonConfig;
use crate::detach;
use crate::error::{DaemonError, DaemonResult};
use crate::lock::{self, LockHandle};
use crate::logging;
use crate::pid;
use crate::signal::STOP_SIGNAL;
use crate::sys::unix;

/// Result of a `stop` request. `stop` never fails the invocation.
#[derive(Debug)]
pub enum StopOutcome {
    /// No pid file: nothing to stop.
    NotRunning,
    /// The termination signal was delivered. Exit is not awaited.
    Signaled(u32),
    /// The pid file was unreadable or the signal could not be delivered.
    Failed(DaemonError),
}

/// Drives one lifecycle session for a [`DaemonConfig`].
///
/// Every operation, including the worker, runs with the session's logger
/// installed as the default `tracing` dispatcher.
#[derive(Debug)]
pub struct Daemon {
    config: DaemonConfig,
    logger: Dispatch,
}

impl Daemon {
    /// Controller logging to standard error (see [`stderr_dispatch`](crate::stderr_dispatch)).
    pub fn new(config: DaemonConfig) -> Self {
        Daemon {
            config,
            logger: logging::stderr_dispatch(),
        }
    }

    /// Replaces the session logger.
    pub fn with_logger(mut self, logger: Dispatch) -> Self {
        self.logger = logger;
        self
    }

    /// Returns the session configuration.
    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    fn scoped<R>(&self, f: impl FnOnce() -> R) -> R {
        tracing::dispatcher::with_default(&self.logger, f)
    }

    /// Double-forks into the background. Only the grandchild returns.
    pub fn detach(&self) -> DaemonResult<()> {
        self.scoped(|| detach::detach(&self.config))
    }

    /// Takes the exclusive lock on the configured lock file.
    pub fn acquire_lock(&self) -> DaemonResult<LockHandle> {
        self.scoped(|| lock::try_acquire(&self.config.lock_file, self.config.lock_policy))
    }

    /// Writes the current pid to the configured pid file.
    pub fn register_pid(&self) -> DaemonResult<u32> {
        self.scoped(|| pid::write_current_pid(&self.config.pid_file))
    }

    /// Takes the lock, then records the pid. The order makes a fresh pid file
    /// proof that its writer passed the lock.
    pub fn init_process(&self) -> DaemonResult<LockHandle> {
        let handle = self.acquire_lock()?;
        self.register_pid()?;
        Ok(handle)
    }

    /// Detaches, then runs [`Daemon::init_process`] in the grandchild.
    pub fn start(&self) -> DaemonResult<LockHandle> {
        self.detach()?;
        self.init_process()
    }

    /// Signals the instance recorded in the pid file. Does not touch the lock
    /// and does not wait for the target to exit.
    pub fn stop(&self) -> StopOutcome {
        self.scoped(|| {
            let path = &self.config.pid_file;
            let pid = match pid::read_pid(path) {
                Ok(Some(pid)) => pid,
                Ok(None) => {
                    debug!(path = %path.display(), "pidfile does not exist");
                    return StopOutcome::NotRunning;
                }
                Err(e) => {
                    warn!(error = %e, "while reading pid to stop");
                    return StopOutcome::Failed(e);
                }
            };

            match unix::kill(pid as libc::pid_t, STOP_SIGNAL) {
                Ok(()) => {
                    info!(pid, "sent SIGTERM");
                    StopOutcome::Signaled(pid)
                }
                Err(source) => {
                    let e = DaemonError::Signal { pid, source };
                    warn!(error = %e, pid, "while killing pid");
                    StopOutcome::Failed(e)
                }
            }
        })
    }

    /// Stops the recorded instance, then starts a fresh one.
    pub fn restart(&self) -> DaemonResult<LockHandle> {
        self.stop();
        self.start()
    }

    /// Dispatches one invocation and runs `worker` where the flow calls for it.
    ///
    /// The lock is held for as long as the worker runs. Fatal errors, worker
    /// errors and worker panics are logged and reported as [`Exit::Failure`].
    pub fn run<F, E>(&self, command: Option<Command>, worker: F) -> Exit
    where
        F: FnOnce() -> Result<(), E>,
        E: Display,
    {
        let result = match command {
            None => self.init_process().and_then(|handle| {
                self.notify_ready();
                self.run_worker(handle, worker)
            }),
            Some(Command::Start) => self.start().and_then(|h| self.run_worker(h, worker)),
            Some(Command::Restart) => self.restart().and_then(|h| self.run_worker(h, worker)),
            Some(Command::Stop) => {
                self.stop();
                Ok(())
            }
        };

        match result {
            Ok(()) => Exit::Success,
            Err(e) => {
                self.scoped(|| error!(error = %e, "fatal"));
                Exit::Failure
            }
        }
    }

    /// Parses `args` (program name first) and dispatches.
    pub fn run_with_args<I, T, F, E>(&self, args: I, worker: F) -> Exit
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
        F: FnOnce() -> Result<(), E>,
        E: Display,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        self.scoped(|| info!(argv = ?args, "invoked"));

        match cli::parse_args(args) {
            Ok(command) => self.run(command, worker),
            Err(e) => {
                let _ = e.print();
                if e.use_stderr() {
                    self.scoped(|| error!(kind = ?e.kind(), "usage error"));
                    Exit::Usage
                } else {
                    Exit::Success
                }
            }
        }
    }

    fn run_worker<F, E>(&self, mut handle: LockHandle, worker: F) -> DaemonResult<()>
    where
        F: FnOnce() -> Result<(), E>,
        E: Display,
    {
        let outcome = self.scoped(|| panic::catch_unwind(AssertUnwindSafe(worker)));
        let result = match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DaemonError::Worker(e.to_string())),
            Err(payload) => Err(DaemonError::Worker(panic_message(payload.as_ref()))),
        };
        self.scoped(|| handle.release())?;
        result
    }

    /// Tells a supervising service manager that startup finished.
    #[cfg(target_os = "linux")]
    fn notify_ready(&self) {
        if std::env::var_os("NOTIFY_SOCKET").is_none() {
            return;
        }
        // Unset the variable so it does not leak into the worker's children.
        if let Err(e) = sd_notify::notify(true, &[sd_notify::NotifyState::Ready]) {
            self.scoped(|| warn!(error = %e, "sd_notify READY failed"));
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn notify_ready(&self) {}
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_owned()
    }
}

/// Builds a controller logging to stderr, dispatches on the process
/// arguments and exits with the resulting status.
///
/// `config` is a full [`DaemonConfig`] or just a pid file path.
pub fn standard_daemonize<F, E, C>(worker: F, config: C) -> !
where
    F: FnOnce() -> Result<(), E>,
    E: Display,
    C: Into<DaemonConfig>,
{
    let daemon = Daemon::new(config.into());
    daemon.run_with_args(std::env::args_os(), worker).exit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::os::unix::process::ExitStatusExt;
    use std::path::Path;
    use std::time::Duration;

    fn daemon_at(dir: &Path) -> Daemon {
        let config = DaemonConfig::new(dir.join("app.pid")).lock_timeout(Duration::from_millis(200));
        Daemon::new(config).with_logger(logging::silent())
    }

    #[test]
    fn stop_without_pid_file_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = daemon_at(dir.path());
        assert!(matches!(daemon.stop(), StopOutcome::NotRunning));
        assert!(!dir.path().join("app.pid").exists());
    }

    #[test]
    fn stop_signals_the_recorded_process() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = daemon_at(dir.path());
        let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        pid::write_pid(daemon.config().pid_file_path(), child.id()).unwrap();

        let outcome = daemon.stop();
        assert!(matches!(outcome, StopOutcome::Signaled(p) if p == child.id()));

        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(libc::SIGTERM));
    }

    #[test]
    fn stop_on_vanished_process_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = daemon_at(dir.path());
        pid::write_pid(daemon.config().pid_file_path(), (libc::pid_t::MAX - 1) as u32).unwrap();

        match daemon.stop() {
            StopOutcome::Failed(DaemonError::Signal { source, .. }) => {
                assert_eq!(source.raw_os_error(), Some(libc::ESRCH));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn stop_with_garbage_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = daemon_at(dir.path());
        std::fs::write(daemon.config().pid_file_path(), "not-a-pid").unwrap();
        assert!(matches!(
            daemon.stop(),
            StopOutcome::Failed(DaemonError::InvalidPid { .. })
        ));
    }

    #[test]
    fn init_process_holds_lock_and_records_pid() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = daemon_at(dir.path());

        let handle = daemon.init_process().unwrap();
        assert!(handle.is_held());
        assert_eq!(handle.path(), daemon.config().lock_file_path());
        assert_eq!(
            pid::read_pid(daemon.config().pid_file_path()).unwrap(),
            Some(std::process::id())
        );

        let err = daemon.acquire_lock().unwrap_err();
        assert!(matches!(err, DaemonError::LockTimeout { .. }));
    }

    #[test]
    fn foreground_runs_worker_under_lock() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = daemon_at(dir.path());
        let ran = Cell::new(false);

        let exit = daemon.run(None, || {
            ran.set(true);
            let contended = lock::try_acquire(
                daemon.config().lock_file_path(),
                daemon.config().lock_policy(),
            );
            assert!(matches!(contended, Err(DaemonError::LockTimeout { .. })));
            Ok::<_, String>(())
        });

        assert_eq!(exit, Exit::Success);
        assert!(ran.get());
        assert_eq!(
            pid::read_pid(daemon.config().pid_file_path()).unwrap(),
            Some(std::process::id())
        );
        // Released once the worker returned.
        daemon.acquire_lock().unwrap();
    }

    #[test]
    fn foreground_fails_when_lock_is_held() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = daemon_at(dir.path());
        let _held = daemon.acquire_lock().unwrap();
        let ran = Cell::new(false);

        let exit = daemon.run(None, || {
            ran.set(true);
            Ok::<_, String>(())
        });

        assert_eq!(exit, Exit::Failure);
        assert!(!ran.get());
        assert!(!daemon.config().pid_file_path().exists());
    }

    #[test]
    fn worker_error_and_panic_are_failures() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = daemon_at(dir.path());

        let exit = daemon.run(None, || Err("disk on fire"));
        assert_eq!(exit, Exit::Failure);

        let exit = daemon.run(None, || -> Result<(), String> { panic!("boom") });
        assert_eq!(exit, Exit::Failure);

        // Lock was released on both failure paths.
        daemon.acquire_lock().unwrap();
    }

    #[test]
    fn run_stop_skips_worker() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = daemon_at(dir.path());
        let exit = daemon.run(Some(Command::Stop), || -> Result<(), String> {
            panic!("worker must not run on stop")
        });
        assert_eq!(exit, Exit::Success);
    }

    #[test]
    fn start_refuses_threaded_process() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = daemon_at(dir.path());
        if unix::thread_count().is_none() {
            return;
        }
        let exit = daemon.run(Some(Command::Start), || Ok::<_, String>(()));
        assert_eq!(exit, Exit::Failure);
        assert!(!daemon.config().pid_file_path().exists());
    }

    #[test]
    fn usage_errors() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = daemon_at(dir.path());
        let never = || -> Result<(), String> { panic!("worker must not run") };

        assert_eq!(daemon.run_with_args(["prog", "reload"], never), Exit::Usage);
        assert_eq!(daemon.run_with_args(["prog", "start", "now"], never), Exit::Usage);
        assert_eq!(daemon.run_with_args(["prog", "stop"], never), Exit::Success);
    }

    #[test]
    fn panic_messages() {
        assert_eq!(panic_message(&"boom"), "panicked: boom");
        assert_eq!(panic_message(&String::from("bang")), "panicked: bang");
        assert_eq!(panic_message(&42u8), "panicked");
    }
}
