use std::env;

use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive for the default sink.
pub const LOG_ENV: &str = "DAEMON_CTL_LOG";

const DEFAULT_FILTER: &str = "debug";

/// Plain-text logger writing to standard error.
///
/// Writes go through file descriptor 2 at the time of each event, so once the
/// process has detached they land wherever stderr was redirected.
pub fn stderr_dispatch() -> Dispatch {
    let filter = match env::var(LOG_ENV) {
        Ok(level) if !level.trim().is_empty() => EnvFilter::new(level),
        _ => EnvFilter::new(DEFAULT_FILTER),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true)
        .with_env_filter(filter)
        .finish();
    Dispatch::new(subscriber)
}

/// A logger that drops every event.
pub fn silent() -> Dispatch {
    Dispatch::none()
}
