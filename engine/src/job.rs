//! Run orchestration.
//!
//! A run goes through the same lifecycle whether it backs up or restores:
//! - `prepare`: validate inputs and create the target
//! - `transfer`: walk and copy entries through a [`TransferExecutor`]
//! - metadata preservation (second pass, owned by the executor)
//! - `finish`: run-specific epilogue such as writing the summary
//!
//! [`execute`] drives that lifecycle and is the single place where a fatal
//! error triggers cleanup of a partially written target.

use std::path::Path;

use chrono::Local;
use uuid::Uuid;

use crate::backup::BackupRun;
use crate::chain::Timestamp;
use crate::classify::ErrorPolicy;
use crate::error::EngineError;
use crate::fs_ops;
use crate::model::{CleanupScope, Configuration, Operation, RunReport};
use crate::progress::ProgressCallback;
use crate::restore::RestoreRun;
use crate::transfer::{TransferExecutor, TransferLedger};

/// One backup or restore run.
pub trait TransferRun {
    fn operation(&self) -> Operation;

    fn source(&self) -> &Path;

    /// Validate inputs and create the target.
    ///
    /// Once [`TransferRun::target`] returns `Some`, the target holds partial
    /// output and is cleaned up on abort.
    fn prepare(&mut self) -> Result<(), EngineError>;

    /// Walk the source and hand every entry to transfer to `executor`.
    fn transfer(&mut self, executor: &mut TransferExecutor<'_>) -> Result<(), EngineError>;

    /// Called after metadata has been preserved.
    fn finish(&mut self, executor: &mut TransferExecutor<'_>) -> Result<(), EngineError>;

    /// Backup directory or restore destination, once prepared.
    fn target(&self) -> Option<&Path>;

    fn cleanup_scope(&self) -> CleanupScope {
        self.operation().cleanup_scope()
    }

    fn timestamp(&self) -> Option<&Timestamp> {
        None
    }
}

/// Drive `run` to completion.
///
/// On a fatal error after the target was created, the target is cleaned up
/// once (unless errors are ignored) and the error is returned.
pub fn execute(
    run: &mut dyn TransferRun,
    config: &Configuration,
    progress: Option<&dyn ProgressCallback>,
) -> Result<RunReport, EngineError> {
    let id = Uuid::new_v4();
    let span = tracing::info_span!("run", id = %id, op = %config.operation);
    let _guard = span.enter();

    let started_at = Local::now();
    tracing::info!(
        source = %config.source.display(),
        destination = %config.destination.display(),
        "run started"
    );

    match drive(run, config, progress) {
        Ok(ledger) => {
            let report = RunReport {
                id,
                operation: config.operation,
                source: run.source().to_path_buf(),
                target: run.target().map(Path::to_path_buf).unwrap_or_default(),
                timestamp: run.timestamp().cloned(),
                successes: ledger.successes,
                errors: ledger.errors,
                started_at,
                finished_at: Local::now(),
            };
            tracing::info!(
                transferred = report.transferred_count(),
                deleted = report.deleted_count(),
                errors = report.errors.len(),
                "run completed"
            );
            if let Some(progress) = progress {
                progress.on_run_completed(&report);
            }
            Ok(report)
        }
        Err(error) => {
            tracing::info!(error = %error, "run aborted");
            if let Some(target) = run.target() {
                if !config.flags.ignore_errors {
                    clean_up(target, run.cleanup_scope());
                }
            }
            Err(error)
        }
    }
}

fn drive(
    run: &mut dyn TransferRun,
    config: &Configuration,
    progress: Option<&dyn ProgressCallback>,
) -> Result<TransferLedger, EngineError> {
    run.prepare()?;

    if let (Some(progress), Some(target)) = (progress, run.target()) {
        progress.on_run_started(config.operation, run.source(), target);
    }

    let policy = ErrorPolicy {
        ignore_errors: config.flags.ignore_errors,
    };
    let entry_progress = progress.filter(|_| config.flags.show_progress);
    let mut executor = TransferExecutor::new(policy, entry_progress);

    run.transfer(&mut executor)?;
    executor.preserve_metadata()?;
    run.finish(&mut executor)?;

    Ok(executor.into_ledger())
}

fn clean_up(target: &Path, scope: CleanupScope) {
    tracing::info!(path = %target.display(), scope = ?scope, "removing partial output");
    let result = match scope {
        CleanupScope::RemoveBackupRoot => fs_ops::remove_entry(target),
        CleanupScope::RemoveContentsOnly => fs_ops::clear_directory(target),
    };
    if let Err(failure) = result {
        tracing::warn!("cleanup incomplete: {}", failure.describe());
    }
}

/// Take a full or incremental backup as described by `config`.
///
/// # Errors
/// `InvalidConfiguration` if `config` describes a restore, otherwise any
/// fatal error of the run.
pub fn run_backup(config: &Configuration, progress: Option<&dyn ProgressCallback>) -> Result<RunReport, EngineError> {
    let mut run = BackupRun::new(config)?;
    execute(&mut run, config, progress)
}

/// Restore the backup described by `config`.
///
/// # Errors
/// `InvalidConfiguration` if `config` describes a backup, otherwise any
/// fatal error of the run.
pub fn run_restore(config: &Configuration, progress: Option<&dyn ProgressCallback>) -> Result<RunReport, EngineError> {
    let mut run = RestoreRun::new(config)?;
    execute(&mut run, config, progress)
}

/// Dispatch on the configured operation.
pub fn run(config: &Configuration, progress: Option<&dyn ProgressCallback>) -> Result<RunReport, EngineError> {
    match config.operation {
        Operation::Backup(_) => run_backup(config, progress),
        Operation::Restore => run_restore(config, progress),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BackupKind, RunFlags};
    use std::cell::RefCell;
    use std::fs;
    use std::path::PathBuf;

    /// Run that prepares a target, then fails during transfer.
    struct FailingRun {
        source: PathBuf,
        target_dir: PathBuf,
        operation: Operation,
        target: Option<PathBuf>,
    }

    impl TransferRun for FailingRun {
        fn operation(&self) -> Operation {
            self.operation
        }

        fn source(&self) -> &Path {
            &self.source
        }

        fn prepare(&mut self) -> Result<(), EngineError> {
            fs::create_dir_all(&self.target_dir).expect("Failed to create target");
            fs::write(self.target_dir.join("partial"), b"x").expect("Failed to write partial");
            self.target = Some(self.target_dir.clone());
            Ok(())
        }

        fn transfer(&mut self, _executor: &mut TransferExecutor<'_>) -> Result<(), EngineError> {
            Err(EngineError::InvalidConfiguration("boom".into()))
        }

        fn finish(&mut self, _executor: &mut TransferExecutor<'_>) -> Result<(), EngineError> {
            Ok(())
        }

        fn target(&self) -> Option<&Path> {
            self.target.as_deref()
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        events: RefCell<Vec<String>>,
    }

    impl ProgressCallback for RecordingProgress {
        fn on_run_started(&self, operation: Operation, _source: &Path, _target: &Path) {
            self.events.borrow_mut().push(format!("started {}", operation));
        }

        fn on_entry(&self, source: &Path, _destination: &Path) {
            let name = source.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            self.events.borrow_mut().push(format!("entry {}", name));
        }

        fn on_run_completed(&self, report: &RunReport) {
            self.events
                .borrow_mut()
                .push(format!("completed {}", report.transferred_count()));
        }
    }

    fn failing(operation: Operation, temp: &Path) -> (FailingRun, Configuration) {
        let run = FailingRun {
            source: temp.join("src"),
            target_dir: temp.join("dst").join("target"),
            operation,
            target: None,
        };
        let config = Configuration::backup(BackupKind::Full, temp.join("src"), temp.join("dst"), RunFlags::default());
        (run, config)
    }

    #[test]
    fn test_abort_removes_backup_root() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let (mut run, config) = failing(Operation::Backup(BackupKind::Full), temp_dir.path());

        let result = execute(&mut run, &config, None);
        assert!(result.is_err());
        assert!(!run.target_dir.exists());
        assert!(temp_dir.path().join("dst").is_dir());
    }

    #[test]
    fn test_abort_clears_restore_contents_only() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let (mut run, config) = failing(Operation::Restore, temp_dir.path());

        let result = execute(&mut run, &config, None);
        assert!(result.is_err());
        assert!(run.target_dir.is_dir());
        assert!(!run.target_dir.join("partial").exists());
    }

    #[test]
    fn test_abort_keeps_output_when_ignoring_errors() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let (mut run, mut config) = failing(Operation::Backup(BackupKind::Full), temp_dir.path());
        config.flags.ignore_errors = true;

        let result = execute(&mut run, &config, None);
        assert!(result.is_err());
        assert!(run.target_dir.join("partial").exists());
    }

    #[test]
    fn test_run_reports_progress_events() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        fs::create_dir(&src).expect("Failed to create src");
        fs::write(src.join("file1.txt"), b"test").expect("Failed to write file");

        let flags = RunFlags {
            create_destination: true,
            show_progress: true,
            ..RunFlags::default()
        };
        let config = Configuration::backup(BackupKind::Full, &src, &dst, flags);
        let progress = RecordingProgress::default();

        let report = run(&config, Some(&progress)).expect("Failed to run backup");
        assert_eq!(report.transferred_count(), 1);
        assert!(report.timestamp.is_some());
        assert_eq!(
            progress.events.borrow().as_slice(),
            &[
                "started full backup".to_string(),
                "entry file1.txt".to_string(),
                "completed 1".to_string(),
            ]
        );
    }

    #[test]
    fn test_entry_progress_needs_flag() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        fs::create_dir(&src).expect("Failed to create src");
        fs::write(src.join("file1.txt"), b"test").expect("Failed to write file");

        let flags = RunFlags {
            create_destination: true,
            ..RunFlags::default()
        };
        let config = Configuration::backup(BackupKind::Full, &src, &dst, flags);
        let progress = RecordingProgress::default();

        run(&config, Some(&progress)).expect("Failed to run backup");
        assert_eq!(progress.events.borrow().len(), 2);
    }

    #[test]
    fn test_operation_mismatch_is_rejected() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = Configuration::restore(temp_dir.path(), temp_dir.path(), RunFlags::default());
        let err = run_backup(&config, None).expect_err("restore config cannot back up");
        assert_eq!(err.exit_code(), libc::EINVAL);
    }
}
