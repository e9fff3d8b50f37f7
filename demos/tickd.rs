//! A simple ticker daemon.
//!
//! ```text
//! tickd            # foreground
//! tickd start      # background
//! tickd stop
//! tickd restart
//! ```
//!
//! Environment:
//! - `TICKD_PID_FILE`: pid file (default `$TMPDIR/tickd.pid`)
//! - `TICKD_LOG`: where stdout goes once detached (default `/dev/null`)
//! - `TICKD_LOCK_TIMEOUT_MS`: lock retry budget (default 10000)
//! - `TICKD_INTERVAL_MS`: pause between ticks (default 1000)
//! - `TICKD_MAX_TICKS`: stop on its own after this many ticks

use std::env;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use daemon_ctl::{DaemonConfig, Exit, standard_daemonize, termination_flag};
use tracing::info;

fn env_u64(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn tick(interval: Duration, max_ticks: Option<u64>) -> io::Result<()> {
    let term = termination_flag()?;
    println!("[tickd] running as pid {}", std::process::id());
    info!("ticker started");

    let mut i = 0u64;
    while !term.load(Ordering::Relaxed) && max_ticks.is_none_or(|max| i < max) {
        println!("[tickd] tick #{i}");
        i += 1;
        thread::sleep(interval);
    }

    println!("[tickd] stopping after {i} ticks");
    info!(ticks = i, "ticker stopped");
    Ok(())
}

fn main() -> ExitCode {
    let pid_file = env::var_os("TICKD_PID_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|| env::temp_dir().join("tickd.pid"));

    let mut config = DaemonConfig::new(pid_file);
    if let Some(log) = env::var_os("TICKD_LOG") {
        config = config.stdout(PathBuf::from(log));
    }
    if let Some(ms) = env_u64("TICKD_LOCK_TIMEOUT_MS") {
        config = config.lock_timeout(Duration::from_millis(ms));
    }
    let config = match config.build() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("tickd: {e}");
            return Exit::Failure.into();
        }
    };

    let interval = Duration::from_millis(env_u64("TICKD_INTERVAL_MS").unwrap_or(1000));
    let max_ticks = env_u64("TICKD_MAX_TICKS");

    standard_daemonize(|| tick(interval, max_ticks), config)
}
