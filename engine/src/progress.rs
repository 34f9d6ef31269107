//! Progress reporting trait.
//!
//! This module defines the ProgressCallback trait, which decouples the engine
//! from any specific output technology. The CLI implements it to print
//! banners and per-entry transfer lines.

use std::path::Path;

use crate::model::{Operation, RunReport};

/// Receives notifications while a run executes.
///
/// All methods are called synchronously from the run's thread.
pub trait ProgressCallback {
    /// Called once the run has validated its inputs and prepared its target.
    fn on_run_started(&self, operation: Operation, source: &Path, target: &Path);

    /// Called before each transfer, only when progress output is enabled.
    fn on_entry(&self, source: &Path, destination: &Path);

    /// Called after the run completed successfully.
    fn on_run_completed(&self, report: &RunReport);
}
