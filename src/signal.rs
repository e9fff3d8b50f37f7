use std::io;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::flag;

/// Signal delivered by `stop` to the running instance.
pub const STOP_SIGNAL: libc::c_int = SIGTERM;

/// Registers SIGTERM and SIGINT and returns a flag that flips to `true` once
/// either arrives. Workers poll it to return cleanly, releasing the lock.
///
/// Replaces the default disposition: after this call, SIGTERM no longer kills
/// the process outright.
pub fn termination_flag() -> io::Result<Arc<AtomicBool>> {
    let term = Arc::new(AtomicBool::new(false));
    flag::register(SIGTERM, Arc::clone(&term))?;
    flag::register(SIGINT, Arc::clone(&term))?;
    Ok(term)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::{Duration, Instant};

    #[test]
    fn flag_flips_on_sigterm() {
        let term = termination_flag().unwrap();
        assert!(!term.load(Ordering::Relaxed));

        signal_hook::low_level::raise(SIGTERM).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while !term.load(Ordering::Relaxed) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(term.load(Ordering::Relaxed));
    }
}
