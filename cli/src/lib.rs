//! BackUP - Shared pieces of the `backup` and `restore` command-line tools.
//!
//! Both binaries take positional paths followed by bare flag words
//! (`create`, `ignore`, `full_info`, ...). This crate maps those words onto
//! engine [`RunFlags`], drives the run, and turns the outcome into a process
//! exit code: 0 on success, the OS error code of a fatal error, or `EINVAL`
//! for a malformed command line.

pub mod logging;
pub mod progress;
pub mod report;

use clap::error::ErrorKind;
use clap::ValueEnum;
use engine::{Configuration, RunFlags};

use crate::progress::ConsoleProgress;

/// Flag words accepted after the paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Flag {
    /// Create the destination if it does not exist
    Create,
    /// Restore only: clear a non-empty destination first
    Override,
    /// Keep going past errors instead of aborting
    Ignore,
    /// Print the success and error tables after the run
    #[value(name = "full_info")]
    FullInfo,
    /// Print the error table after the run
    #[value(name = "error_info")]
    ErrorInfo,
    /// Print nothing except requested tables
    Silent,
    /// Print every transfer as it happens
    Process,
}

/// Fold flag words into engine flags.
pub fn run_flags(flags: &[Flag]) -> RunFlags {
    let mut run_flags = RunFlags::default();
    for flag in flags {
        match flag {
            Flag::Create => run_flags.create_destination = true,
            Flag::Override => run_flags.override_destination = true,
            Flag::Ignore => run_flags.ignore_errors = true,
            Flag::FullInfo => {
                run_flags.show_error_report = true;
                run_flags.show_success_report = true;
            }
            Flag::ErrorInfo => run_flags.show_error_report = true,
            Flag::Silent => run_flags.silent = true,
            Flag::Process => run_flags.show_progress = true,
        }
    }
    run_flags
}

/// Run `config` with console output.
///
/// # Returns
/// The process exit code
pub fn run_cli(config: &Configuration) -> i32 {
    tracing::debug!(
        operation = %config.operation,
        source = %config.source.display(),
        destination = %config.destination.display(),
        flags = ?config.flags,
        "parsed command line"
    );
    let progress = ConsoleProgress::new(config.flags);
    match engine::run(config, Some(&progress)) {
        Ok(_) => 0,
        Err(error) => {
            if !config.flags.silent {
                eprintln!("{}", error);
            }
            error.exit_code()
        }
    }
}

/// Print a clap parse outcome and return the matching exit code.
///
/// Help and version requests succeed; anything else is a malformed
/// invocation.
pub fn usage_exit(error: clap::Error) -> i32 {
    let _ = error.print();
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => libc::EINVAL,
    }
}
