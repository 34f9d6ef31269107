//! Console implementation of the engine's progress callback.

use std::path::Path;

use engine::{Operation, ProgressCallback, RunFlags, RunReport};

use crate::report;

/// Prints banners, per-entry rows and the requested tables to stdout.
pub struct ConsoleProgress {
    flags: RunFlags,
}

impl ConsoleProgress {
    pub fn new(flags: RunFlags) -> Self {
        ConsoleProgress { flags }
    }
}

impl ProgressCallback for ConsoleProgress {
    fn on_run_started(&self, operation: Operation, source: &Path, target: &Path) {
        if !self.flags.silent {
            println!("{}", report::start_banner(operation, source, target));
        }
        if self.flags.show_progress {
            println!("\n{}", report::heading("PROCESS"));
        }
    }

    fn on_entry(&self, source: &Path, destination: &Path) {
        println!("{}", report::format_row(source, &destination.display().to_string()));
    }

    fn on_run_completed(&self, run: &RunReport) {
        print!(
            "{}",
            report::render_report(run, self.flags.show_error_report, self.flags.show_success_report)
        );
        if !self.flags.silent {
            println!("{}", report::finish_banner(run.operation));
        }
    }
}
