use std::ffi::OsString;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

/// Invocation surface expected of any program embedding the controller.
/// Running without a command stays in the foreground.
#[derive(Debug, Parser)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// Lifecycle command; absent for a foreground run.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Lifecycle commands accepted after the program name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Detach into the background, take the lock, write the pid, run the worker
    Start,
    /// Send SIGTERM to the instance recorded in the pid file
    Stop,
    /// Stop, then start
    Restart,
}

/// Parses the full argument vector, program name first.
pub fn parse_args<I, T>(args: I) -> Result<Option<Command>, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::try_parse_from(args).map(|cli| cli.command)
}

/// Exit status of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Normal completion, or dispatch to a detached worker.
    Success,
    /// Fork failure, lock timeout, pid-write failure, worker failure.
    Failure,
    /// Unknown command or wrong arity.
    Usage,
}

impl Exit {
    /// Numeric process exit status.
    pub fn code(self) -> i32 {
        match self {
            Exit::Success => 0,
            Exit::Failure => 1,
            Exit::Usage => 2,
        }
    }

    /// Terminates the process with this status.
    pub fn exit(self) -> ! {
        std::process::exit(self.code())
    }
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit.code() as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn no_command_means_foreground() {
        assert_eq!(parse_args(["prog"]).unwrap(), None);
    }

    #[test]
    fn known_commands() {
        assert_eq!(parse_args(["prog", "start"]).unwrap(), Some(Command::Start));
        assert_eq!(parse_args(["prog", "stop"]).unwrap(), Some(Command::Stop));
        assert_eq!(parse_args(["prog", "restart"]).unwrap(), Some(Command::Restart));
    }

    #[test]
    fn unknown_command_is_a_usage_error() {
        let err = parse_args(["prog", "reload"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        assert_eq!(err.exit_code(), Exit::Usage.code());
    }

    #[test]
    fn extra_arguments_are_a_usage_error() {
        let err = parse_args(["prog", "start", "now"]).unwrap_err();
        assert_eq!(err.exit_code(), Exit::Usage.code());
    }

    #[test]
    fn help_is_not_an_error_exit() {
        let err = parse_args(["prog", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert_eq!(err.exit_code(), 0);
    }

    #[test]
    fn exit_codes() {
        assert_eq!(Exit::Success.code(), 0);
        assert_eq!(Exit::Failure.code(), 1);
        assert_eq!(Exit::Usage.code(), 2);
    }
}
