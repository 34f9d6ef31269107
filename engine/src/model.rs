//! Core data model for backup and restore runs.
//!
//! This module defines the main data structures shared by every component:
//! - Configuration / RunFlags: what a single run is asked to do
//! - BackupLayout: the fixed on-disk names of a backup directory
//! - Entry: one filesystem object seen during a walk
//! - TransferOutcome / RunReport: what a run did

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use uuid::Uuid;

use crate::chain::Timestamp;

/// Kind of backup to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupKind {
    /// Complete copy of the source tree
    Full,
    /// Only what changed since the most recent full backup
    Incremental,
}

impl BackupKind {
    /// Keyword used for this kind in the summary file.
    pub fn keyword(&self) -> &'static str {
        match self {
            BackupKind::Full => "full",
            BackupKind::Incremental => "incremental",
        }
    }

    /// Parse the summary-file keyword.
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "full" => Some(BackupKind::Full),
            "incremental" => Some(BackupKind::Incremental),
            _ => None,
        }
    }
}

impl fmt::Display for BackupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// The operation a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Backup(BackupKind),
    Restore,
}

impl Operation {
    /// What to remove when a run aborts after creating its target.
    pub fn cleanup_scope(&self) -> CleanupScope {
        match self {
            Operation::Backup(_) => CleanupScope::RemoveBackupRoot,
            Operation::Restore => CleanupScope::RemoveContentsOnly,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Backup(kind) => write!(f, "{} backup", kind),
            Operation::Restore => write!(f, "restore"),
        }
    }
}

/// How much of a partially written target is removed on abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupScope {
    /// Remove the freshly created backup directory itself
    RemoveBackupRoot,
    /// Keep the destination directory, remove everything inside it
    RemoveContentsOnly,
}

/// Named switches controlling a single run.
///
/// `full_info` on the command line maps to both report flags; `error_info`
/// maps to `show_error_report` alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunFlags {
    /// Create the destination root if it is missing
    pub create_destination: bool,
    /// Record entry-level failures and keep going instead of aborting
    pub ignore_errors: bool,
    /// Print the error table after the run
    pub show_error_report: bool,
    /// Print the success table after the run
    pub show_success_report: bool,
    /// Suppress all non-data output, including fatal messages
    pub silent: bool,
    /// Report every transfer as it happens
    pub show_progress: bool,
    /// Restore only: clear a non-empty destination first
    pub override_destination: bool,
}

/// Fixed names inside a backup directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupLayout {
    pub data_dir: &'static str,
    pub summary_file: &'static str,
}

impl Default for BackupLayout {
    fn default() -> Self {
        BackupLayout {
            data_dir: "data",
            summary_file: "type.nt",
        }
    }
}

impl BackupLayout {
    /// Payload root of a backup directory.
    pub fn data_root(&self, backup_dir: &Path) -> PathBuf {
        backup_dir.join(self.data_dir)
    }

    /// Summary file of a backup directory.
    pub fn summary_path(&self, backup_dir: &Path) -> PathBuf {
        backup_dir.join(self.summary_file)
    }
}

/// Immutable description of one run, built once from external input.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub operation: Operation,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub flags: RunFlags,
    pub layout: BackupLayout,
}

impl Configuration {
    pub fn backup<P: Into<PathBuf>>(kind: BackupKind, source: P, destination: P, flags: RunFlags) -> Self {
        Configuration {
            operation: Operation::Backup(kind),
            source: source.into(),
            destination: destination.into(),
            flags,
            layout: BackupLayout::default(),
        }
    }

    pub fn restore<P: Into<PathBuf>>(source: P, destination: P, flags: RunFlags) -> Self {
        Configuration {
            operation: Operation::Restore,
            source: source.into(),
            destination: destination.into(),
            flags,
            layout: BackupLayout::default(),
        }
    }
}

/// Kind of a walked filesystem object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

/// One filesystem object visited during a walk. Never persisted.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Absolute path of the object
    pub path: PathBuf,
    /// Path relative to the walked root
    pub relative_path: PathBuf,
    pub kind: EntryKind,
    /// Byte size (0 for directories)
    pub size: u64,
    pub modified: Option<SystemTime>,
    /// Link target string for symlinks
    pub symlink_target: Option<PathBuf>,
}

/// Result of processing a single entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeResult {
    Success,
    /// Entry was recorded as deleted from the source since the reference backup
    Deleted,
    Error(String),
}

/// What happened to one source entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    pub kind: EntryKind,
    pub result: OutcomeResult,
}

impl TransferOutcome {
    pub fn success(source_path: PathBuf, destination_path: PathBuf, kind: EntryKind) -> Self {
        TransferOutcome {
            source_path,
            destination_path,
            kind,
            result: OutcomeResult::Success,
        }
    }

    pub fn deleted(source_path: PathBuf, kind: EntryKind) -> Self {
        TransferOutcome {
            source_path,
            destination_path: PathBuf::from("DELETE"),
            kind,
            result: OutcomeResult::Deleted,
        }
    }

    pub fn error(source_path: PathBuf, destination_path: PathBuf, kind: EntryKind, message: String) -> Self {
        TransferOutcome {
            source_path,
            destination_path,
            kind,
            result: OutcomeResult::Error(message),
        }
    }

    /// Right-hand column of a report row: the destination, or the failure text.
    pub fn detail(&self) -> String {
        match &self.result {
            OutcomeResult::Success => self.destination_path.display().to_string(),
            OutcomeResult::Deleted => "DELETE".to_string(),
            OutcomeResult::Error(message) => message.clone(),
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub id: Uuid,
    pub operation: Operation,
    pub source: PathBuf,
    /// Timestamped backup directory, or the restore destination
    pub target: PathBuf,
    /// Set for backups only
    pub timestamp: Option<Timestamp>,
    pub successes: Vec<TransferOutcome>,
    pub errors: Vec<TransferOutcome>,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}

impl RunReport {
    /// Entries actually written to the target.
    pub fn transferred_count(&self) -> usize {
        self.successes
            .iter()
            .filter(|o| o.result == OutcomeResult::Success)
            .count()
    }

    /// Deletion markers recorded by an incremental backup.
    pub fn deleted_count(&self) -> usize {
        self.successes
            .iter()
            .filter(|o| o.result == OutcomeResult::Deleted)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
