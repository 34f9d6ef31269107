//! Error classification.
//!
//! Maps raw OS error codes to a closed set of categories, renders a fixed
//! human message per category, and decides whether a failure aborts the run.
//!
//! Two mappings exist. `from_os_code` is used for errors raised while creating
//! or copying entries. `from_errno` is used for errors raised by the metadata
//! calls (chown, chmod, utimens), which report a narrower errno set.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::EngineError;

/// Closed vocabulary of failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    PermissionDenied,
    NotFound,
    AlreadyExists,
    NotADirectory,
    IsADirectory,
    DirectoryNotEmpty,
    OutOfSpace,
    SymlinkLoop,
    ReadOnlyFilesystem,
    DeviceBusy,
    CrossDeviceLink,
    OperationNotPermitted,
    NameTooLong,
    FileTooLarge,
    ResourceUnavailable,
    InvalidBackup,
    Unknown,
}

impl ErrorCategory {
    /// Category of an error raised while creating or copying an entry.
    pub fn from_os_code(code: i32) -> Self {
        match code {
            libc::EACCES => ErrorCategory::PermissionDenied,
            libc::ENOENT => ErrorCategory::NotFound,
            libc::EEXIST => ErrorCategory::AlreadyExists,
            libc::ENOTDIR => ErrorCategory::NotADirectory,
            libc::EISDIR => ErrorCategory::IsADirectory,
            libc::ENOTEMPTY => ErrorCategory::DirectoryNotEmpty,
            libc::ENOSPC => ErrorCategory::OutOfSpace,
            libc::ELOOP => ErrorCategory::SymlinkLoop,
            libc::EROFS => ErrorCategory::ReadOnlyFilesystem,
            libc::EBUSY => ErrorCategory::DeviceBusy,
            libc::EXDEV => ErrorCategory::CrossDeviceLink,
            libc::EPERM => ErrorCategory::OperationNotPermitted,
            libc::ENAMETOOLONG => ErrorCategory::NameTooLong,
            libc::EFBIG => ErrorCategory::FileTooLarge,
            libc::EAGAIN => ErrorCategory::ResourceUnavailable,
            libc::EINVAL => ErrorCategory::InvalidBackup,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Category of an errno raised by a metadata-preservation call.
    pub fn from_errno(errno: i32) -> Self {
        match errno {
            libc::EPERM | libc::EACCES => ErrorCategory::PermissionDenied,
            libc::ENOENT | libc::EFAULT | libc::ENXIO => ErrorCategory::NotFound,
            libc::ELOOP => ErrorCategory::SymlinkLoop,
            libc::EBUSY | libc::EUSERS => ErrorCategory::DeviceBusy,
            libc::ENAMETOOLONG => ErrorCategory::NameTooLong,
            libc::ENOSPC => ErrorCategory::OutOfSpace,
            libc::EROFS => ErrorCategory::ReadOnlyFilesystem,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Short machine-friendly label.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorCategory::PermissionDenied => "permission-denied",
            ErrorCategory::NotFound => "not-found",
            ErrorCategory::AlreadyExists => "already-exists",
            ErrorCategory::NotADirectory => "not-a-directory",
            ErrorCategory::IsADirectory => "is-a-directory",
            ErrorCategory::DirectoryNotEmpty => "directory-not-empty",
            ErrorCategory::OutOfSpace => "out-of-space",
            ErrorCategory::SymlinkLoop => "symlink-loop",
            ErrorCategory::ReadOnlyFilesystem => "read-only-filesystem",
            ErrorCategory::DeviceBusy => "device-busy",
            ErrorCategory::CrossDeviceLink => "cross-device-link",
            ErrorCategory::OperationNotPermitted => "operation-not-permitted",
            ErrorCategory::NameTooLong => "name-too-long",
            ErrorCategory::FileTooLarge => "file-too-large",
            ErrorCategory::ResourceUnavailable => "resource-temporarily-unavailable",
            ErrorCategory::InvalidBackup => "invalid-backup",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a failure was raised; selects the errno mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOrigin {
    /// Directory creation, file or symlink copy, removal
    Transfer,
    /// chown / chmod / utimens
    Metadata,
}

/// A classified filesystem failure involving one or two paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsFailure {
    pub category: ErrorCategory,
    /// Raw OS code, used as the process exit status when fatal
    pub code: i32,
    pub path1: PathBuf,
    pub path2: Option<PathBuf>,
    /// OS description, used verbatim for `Unknown`
    pub os_message: String,
}

impl FsFailure {
    /// Classify an I/O error raised while operating on `path1` (and `path2`).
    pub fn classify(error: &io::Error, origin: FailureOrigin, path1: &Path, path2: Option<&Path>) -> Self {
        let code = error.raw_os_error().unwrap_or_else(|| code_for_kind(error.kind()));
        let category = match origin {
            FailureOrigin::Transfer => ErrorCategory::from_os_code(code),
            FailureOrigin::Metadata => ErrorCategory::from_errno(code),
        };
        FsFailure {
            category,
            code,
            path1: path1.to_path_buf(),
            path2: path2.map(Path::to_path_buf),
            os_message: error.to_string(),
        }
    }

    /// Fixed human message for this failure's category.
    pub fn describe(&self) -> String {
        let p1 = self.path1.display();
        let either = match &self.path2 {
            Some(p2) => format!("'{}' or '{}'", p1, p2.display()),
            None => format!("'{}'", p1),
        };
        let second = self.path2.as_deref().unwrap_or(&self.path1).display();

        match self.category {
            ErrorCategory::PermissionDenied => {
                format!("Cannot access {}. Check permissions or run as root.", either)
            }
            ErrorCategory::NotFound => format!("Cannot find {}. Check the path.", either),
            ErrorCategory::AlreadyExists => format!("Entry '{}' already exists.", second),
            ErrorCategory::NotADirectory => {
                format!("Entry '{}' is not a directory. Check the path.", p1)
            }
            ErrorCategory::IsADirectory => {
                format!("Entry '{}' is a directory. Check the path.", p1)
            }
            ErrorCategory::DirectoryNotEmpty => {
                format!("Directory '{}' is not empty. Clear it or choose another directory.", p1)
            }
            ErrorCategory::OutOfSpace => {
                "Not enough free space on the device to complete the operation.".to_string()
            }
            ErrorCategory::SymlinkLoop => {
                "Too many levels of symbolic links. Check for recursive links.".to_string()
            }
            ErrorCategory::ReadOnlyFilesystem => "File system is read-only.".to_string(),
            ErrorCategory::DeviceBusy => {
                "Device or resource is busy. Wait or close processes using it.".to_string()
            }
            ErrorCategory::CrossDeviceLink => {
                "Cannot link across different file systems.".to_string()
            }
            ErrorCategory::OperationNotPermitted => {
                format!("Operation on {} is not permitted.", either)
            }
            ErrorCategory::NameTooLong => format!("Name {} is too long.", either),
            ErrorCategory::FileTooLarge => format!("File {} is too large.", either),
            ErrorCategory::ResourceUnavailable => {
                "Resource is temporarily unavailable. Try again later.".to_string()
            }
            ErrorCategory::InvalidBackup => {
                "Backup is broken. Use another backup or recreate it.".to_string()
            }
            ErrorCategory::Unknown => self.os_message.clone(),
        }
    }
}

impl fmt::Display for FsFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Error-handling policy of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPolicy {
    pub ignore_errors: bool,
}

impl ErrorPolicy {
    /// Decide what a failure means for the run.
    ///
    /// Returns the message to record as a recoverable outcome, or the fatal
    /// error that must abort the run.
    pub fn dispose(&self, failure: FsFailure) -> Result<String, EngineError> {
        if self.ignore_errors {
            tracing::warn!(category = %failure.category, "{}", failure.describe());
            Ok(failure.describe())
        } else {
            Err(EngineError::Filesystem(failure))
        }
    }
}

/// Fallback code for errors that carry no OS code (synthetic io::Errors).
fn code_for_kind(kind: io::ErrorKind) -> i32 {
    match kind {
        io::ErrorKind::NotFound => libc::ENOENT,
        io::ErrorKind::PermissionDenied => libc::EACCES,
        io::ErrorKind::AlreadyExists => libc::EEXIST,
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => libc::EINVAL,
        io::ErrorKind::WouldBlock => libc::EAGAIN,
        _ => libc::EIO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_code_mapping() {
        assert_eq!(ErrorCategory::from_os_code(libc::EACCES), ErrorCategory::PermissionDenied);
        assert_eq!(ErrorCategory::from_os_code(libc::EPERM), ErrorCategory::OperationNotPermitted);
        assert_eq!(ErrorCategory::from_os_code(libc::EXDEV), ErrorCategory::CrossDeviceLink);
        assert_eq!(ErrorCategory::from_os_code(libc::EINVAL), ErrorCategory::InvalidBackup);
        assert_eq!(ErrorCategory::from_os_code(libc::EIO), ErrorCategory::Unknown);
    }

    #[test]
    fn test_errno_mapping_differs_for_metadata() {
        // chown reports EPERM for ownership it cannot grant
        assert_eq!(ErrorCategory::from_errno(libc::EPERM), ErrorCategory::PermissionDenied);
        assert_eq!(ErrorCategory::from_errno(libc::EFAULT), ErrorCategory::NotFound);
        assert_eq!(ErrorCategory::from_errno(libc::EUSERS), ErrorCategory::DeviceBusy);
        assert_eq!(ErrorCategory::from_errno(libc::EXDEV), ErrorCategory::Unknown);
    }

    #[test]
    fn test_classify_uses_raw_code() {
        let err = io::Error::from_raw_os_error(libc::ENOSPC);
        let failure = FsFailure::classify(&err, FailureOrigin::Transfer, Path::new("/x"), None);
        assert_eq!(failure.category, ErrorCategory::OutOfSpace);
        assert_eq!(failure.code, libc::ENOSPC);
    }

    #[test]
    fn test_classify_synthetic_error_gets_code() {
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let failure = FsFailure::classify(&err, FailureOrigin::Transfer, Path::new("/x"), None);
        assert_eq!(failure.category, ErrorCategory::NotFound);
        assert_eq!(failure.code, libc::ENOENT);
    }

    #[test]
    fn test_describe_mentions_paths() {
        let err = io::Error::from_raw_os_error(libc::EACCES);
        let failure = FsFailure::classify(
            &err,
            FailureOrigin::Transfer,
            Path::new("/src/a"),
            Some(Path::new("/dst/a")),
        );
        let message = failure.describe();
        assert!(message.contains("/src/a"));
        assert!(message.contains("/dst/a"));

        let exists = FsFailure::classify(
            &io::Error::from_raw_os_error(libc::EEXIST),
            FailureOrigin::Transfer,
            Path::new("/src/a"),
            Some(Path::new("/dst/a")),
        );
        assert_eq!(exists.describe(), "Entry '/dst/a' already exists.");
    }

    #[test]
    fn test_unknown_uses_os_message() {
        let err = io::Error::from_raw_os_error(libc::EIO);
        let failure = FsFailure::classify(&err, FailureOrigin::Transfer, Path::new("/x"), None);
        assert_eq!(failure.describe(), err.to_string());
    }

    #[test]
    fn test_policy_dispose() {
        let failure = FsFailure::classify(
            &io::Error::from_raw_os_error(libc::EACCES),
            FailureOrigin::Transfer,
            Path::new("/x"),
            None,
        );

        let lenient = ErrorPolicy { ignore_errors: true };
        let message = lenient.dispose(failure.clone()).expect("ignored errors are recoverable");
        assert!(message.contains("/x"));

        let strict = ErrorPolicy { ignore_errors: false };
        let fatal = strict.dispose(failure).expect_err("errors are fatal by default");
        assert_eq!(fatal.exit_code(), libc::EACCES);
    }
}
