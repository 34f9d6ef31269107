//! # BackUP Engine - Backup and Restore Library
//!
//! A headless engine that takes full and incremental backups of a directory
//! tree and restores them. Designed as the foundation for the `backup` and
//! `restore` command-line tools, and usable from any other front end.
//!
//! ## Overview
//!
//! Every backup lands in `<destination>/<YYYY-MM-DD_HH-MM-SS>/` and holds a
//! `data/` payload plus a `type.nt` summary. The engine provides:
//! - Full backups, copying the whole tree
//! - Incremental backups against the newest full backup (size + mtime change
//!   detection), recording entries deleted since then
//! - Restores that merge an incremental with its full backup
//! - Ownership, permission and timestamp preservation
//! - Fatal-or-record error policy with OS error codes for exit status
//! - Progress reporting via callbacks (decoupled from UI technology)
//!
//! ## Basic Usage
//!
//! ```no_run
//! use engine::{run_backup, run_restore, BackupKind, Configuration, RunFlags};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let flags = RunFlags { create_destination: true, ..RunFlags::default() };
//!
//! // Full backup, then an incremental on top of it
//! let full = Configuration::backup(BackupKind::Full, "/home/me/docs", "/mnt/backups", flags);
//! run_backup(&full, None)?;
//! let incremental = Configuration::backup(BackupKind::Incremental, "/home/me/docs", "/mnt/backups", flags);
//! let report = run_backup(&incremental, None)?;
//!
//! // Restore the incremental into an empty directory
//! let target = report.target.clone();
//! let restore = Configuration::restore(target, "/tmp/restored".into(), flags);
//! let restored = run_restore(&restore, None)?;
//! println!("Restored {} entries", restored.transferred_count());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (Configuration, Entry, RunReport)
//! - **error**: Run-level error type and exit codes
//! - **classify**: Filesystem failure classification and error policy
//! - **catalog**: Source tree walking
//! - **chain**: Timestamps and full-backup resolution
//! - **detect**: Change detection against a full backup
//! - **summary**: The `type.nt` summary file
//! - **fs_ops**: Low-level filesystem operations
//! - **metadata**: Ownership, mode and timestamp preservation
//! - **transfer**: Transfer execution and outcome ledger
//! - **backup** / **restore**: The two run types
//! - **job**: Run orchestration and cleanup
//! - **progress**: Progress callback trait

pub mod model;
pub mod error;
pub mod classify;
pub mod catalog;
pub mod chain;
pub mod detect;
pub mod summary;
pub mod fs_ops;
pub mod metadata;
pub mod transfer;
pub mod backup;
pub mod restore;
pub mod job;
pub mod progress;

// Re-export main types and functions
pub use model::{
    BackupKind, BackupLayout, CleanupScope, Configuration, Entry, EntryKind, Operation, OutcomeResult,
    RunFlags, RunReport, TransferOutcome,
};
pub use error::EngineError;
pub use classify::{ErrorCategory, ErrorPolicy, FsFailure};
pub use chain::{ChainResolver, ResolvedFull, Timestamp};
pub use summary::SummaryRecord;
pub use backup::BackupRun;
pub use restore::{DeletionSet, RestoreRun};
pub use job::{execute, run, run_backup, run_restore, TransferRun};
pub use progress::ProgressCallback;
