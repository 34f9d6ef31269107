//! Error types for the backup engine.
//!
//! `EngineError` represents run-level failures: anything that aborts a run.
//! Entry-level failures tolerated under the ignore policy are recorded as
//! `TransferOutcome`s instead, never as `EngineError`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::classify::FsFailure;

/// Errors that abort a backup or restore run.
///
/// Every variant maps to an OS error code via [`EngineError::exit_code`],
/// which the binaries use as the process exit status.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed invocation or configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Source root does not exist
    #[error("Source entity ({}) does not exist. Check the source path.", path.display())]
    SourceNotFound { path: PathBuf },

    /// A path that must be a directory is something else
    #[error("Path ({}) is not a directory. Check the path.", path.display())]
    NotADirectory { path: PathBuf },

    /// Destination root is missing and creation was not requested
    #[error("Destination folder ({}) does not exist. Check the path or add 'create'.", path.display())]
    DestinationMissing { path: PathBuf },

    /// The backup directory for this timestamp already exists
    #[error("Backup {} already exists.", path.display())]
    BackupExists { path: PathBuf },

    /// Restore destination has content and override was not requested
    #[error("Destination folder ({}) is not empty. Clear it first or add 'override'.", path.display())]
    DestinationNotEmpty { path: PathBuf },

    /// No usable full backup could be found
    #[error("No valid full backup found in {}. Create a full backup first.", root.display())]
    NoValidFullBackup { root: PathBuf },

    /// Summary file is missing, empty or malformed
    #[error("Broken backup {}: {reason}", path.display())]
    CorruptBackup { path: PathBuf, reason: String },

    /// Classified filesystem failure
    #[error("{0}")]
    Filesystem(FsFailure),

    /// Summary file could not be written or read
    #[error("Cannot access summary file {}: {source}", path.display())]
    Summary {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl EngineError {
    /// OS error code used as the process exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidConfiguration(_) => libc::EINVAL,
            Self::SourceNotFound { .. } => libc::ENOENT,
            Self::NotADirectory { .. } => libc::ENOTDIR,
            Self::DestinationMissing { .. } => libc::ENOENT,
            Self::BackupExists { .. } => libc::EEXIST,
            Self::DestinationNotEmpty { .. } => libc::ENOTEMPTY,
            Self::NoValidFullBackup { .. } => libc::ENOENT,
            Self::CorruptBackup { .. } => libc::EINVAL,
            Self::Filesystem(failure) => failure.code,
            Self::Summary { source, .. } => source.raw_os_error().unwrap_or(libc::EIO),
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptBackup {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::FailureOrigin;
    use std::path::Path;

    #[test]
    fn test_exit_codes() {
        let missing = EngineError::SourceNotFound { path: "/nope".into() };
        assert_eq!(missing.exit_code(), libc::ENOENT);

        let busy = EngineError::DestinationNotEmpty { path: "/dst".into() };
        assert_eq!(busy.exit_code(), libc::ENOTEMPTY);

        let corrupt = EngineError::corrupt("/b/x/type.nt", "empty summary");
        assert_eq!(corrupt.exit_code(), libc::EINVAL);
    }

    #[test]
    fn test_filesystem_error_carries_os_code() {
        let failure = FsFailure::classify(
            &io::Error::from_raw_os_error(libc::EROFS),
            FailureOrigin::Transfer,
            Path::new("/ro"),
            None,
        );
        let err = EngineError::Filesystem(failure);
        assert_eq!(err.exit_code(), libc::EROFS);
        assert_eq!(err.to_string(), "File system is read-only.");
    }

    #[test]
    fn test_display_mentions_path() {
        let err = EngineError::BackupExists {
            path: "/b/2024-01-01_00-00-00".into(),
        };
        assert!(err.to_string().contains("2024-01-01_00-00-00"));
    }
}
