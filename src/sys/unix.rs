//! Thin wrappers over the libc calls the lifecycle needs.
//! Each returns `io::Result` built from `errno`; callers attach context.

use std::io;
use std::os::unix::io::RawFd;

/// Outcome of a successful `fork(2)` from the point of view of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fork {
    Parent,
    Child,
}

fn check(ret: libc::c_int) -> io::Result<libc::c_int> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

pub(crate) fn fork() -> io::Result<Fork> {
    // SAFETY: the caller guarantees no other thread is running, so the child
    // inherits a consistent address space.
    let pid = check(unsafe { libc::fork() })?;
    Ok(if pid == 0 { Fork::Child } else { Fork::Parent })
}

pub(crate) fn setsid() -> io::Result<()> {
    // SAFETY: no memory is touched.
    check(unsafe { libc::setsid() }).map(|_| ())
}

/// Sets the file mode creation mask, returning the previous one.
pub(crate) fn umask(mask: libc::mode_t) -> libc::mode_t {
    // SAFETY: umask cannot fail.
    unsafe { libc::umask(mask) }
}

pub(crate) fn dup2(src: RawFd, dst: RawFd) -> io::Result<()> {
    // SAFETY: both descriptors are plain integers; dup2 validates them.
    check(unsafe { libc::dup2(src, dst) }).map(|_| ())
}

pub(crate) fn set_cloexec(fd: RawFd) -> io::Result<()> {
    // SAFETY: F_GETFD/F_SETFD only read and write descriptor flags.
    let flags = check(unsafe { libc::fcntl(fd, libc::F_GETFD) })?;
    check(unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) }).map(|_| ())
}

/// Non-blocking exclusive `flock(2)` on the whole file.
/// Contention surfaces as `ErrorKind::WouldBlock`.
pub(crate) fn try_lock_exclusive(fd: RawFd) -> io::Result<()> {
    // SAFETY: flock only operates on the descriptor.
    check(unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) }).map(|_| ())
}

pub(crate) fn unlock(fd: RawFd) -> io::Result<()> {
    // SAFETY: flock only operates on the descriptor.
    check(unsafe { libc::flock(fd, libc::LOCK_UN) }).map(|_| ())
}

pub(crate) fn kill(pid: libc::pid_t, signal: libc::c_int) -> io::Result<()> {
    // SAFETY: kill has no memory effects on this process.
    check(unsafe { libc::kill(pid, signal) }).map(|_| ())
}

/// Terminates the process without running exit handlers or flushing buffers
/// the child also owns a copy of.
pub(crate) fn exit_immediately(code: libc::c_int) -> ! {
    // SAFETY: _exit never returns.
    unsafe { libc::_exit(code) }
}

/// Number of threads in this process, where the platform exposes it.
#[cfg(target_os = "linux")]
pub(crate) fn thread_count() -> Option<usize> {
    std::fs::read_dir("/proc/self/task").ok().map(|d| d.count())
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn thread_count() -> Option<usize> {
    None
}
