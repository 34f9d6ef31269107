//! Metadata preservation.
//!
//! Copies owner, group, permission bits and access/modification times from a
//! source entry to its transferred copy. Symlinks are never passed here.
//!
//! All three steps are attempted even if an earlier one fails, so a single
//! report lists every fidelity problem of an entry.

use std::fs;
use std::path::Path;

use filetime::{set_file_times, FileTime};

use crate::classify::{FailureOrigin, FsFailure};

/// Every step that failed while preserving one entry's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreservationFailure {
    pub failures: Vec<FsFailure>,
}

impl PreservationFailure {
    /// All failure messages joined into one report cell.
    pub fn message(&self) -> String {
        self.failures
            .iter()
            .map(FsFailure::describe)
            .collect::<Vec<_>>()
            .join("  ")
    }

    /// The first failure, which decides the exit code when fatal.
    pub fn into_primary(mut self) -> FsFailure {
        self.failures.remove(0)
    }
}

/// Apply `source`'s ownership, mode and timestamps to `destination`.
pub fn preserve(source: &Path, destination: &Path) -> Result<(), PreservationFailure> {
    let classify = |error: std::io::Error| {
        FsFailure::classify(&error, FailureOrigin::Metadata, source, Some(destination))
    };

    let metadata = fs::metadata(source).map_err(|e| PreservationFailure {
        failures: vec![classify(e)],
    })?;

    let mut failures = Vec::new();

    if let Err(e) = set_owner_like(&metadata, destination) {
        failures.push(classify(e));
    }
    if let Err(e) = set_permissions_like(&metadata, destination) {
        failures.push(classify(e));
    }

    let accessed = FileTime::from_last_access_time(&metadata);
    let modified = FileTime::from_last_modification_time(&metadata);
    if let Err(e) = set_file_times(destination, accessed, modified) {
        failures.push(classify(e));
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(PreservationFailure { failures })
    }
}

#[cfg(unix)]
fn set_owner_like(metadata: &fs::Metadata, destination: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::MetadataExt;

    std::os::unix::fs::chown(destination, Some(metadata.uid()), Some(metadata.gid()))
}

#[cfg(not(unix))]
fn set_owner_like(_metadata: &fs::Metadata, _destination: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn set_permissions_like(metadata: &fs::Metadata, destination: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = metadata.permissions().mode();
    fs::set_permissions(destination, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_permissions_like(metadata: &fs::Metadata, destination: &Path) -> std::io::Result<()> {
    let mut permissions = fs::metadata(destination)?.permissions();
    permissions.set_readonly(metadata.permissions().readonly());
    fs::set_permissions(destination, permissions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn current_mode(path: &Path) -> u32 {
        use std::os::unix::fs::PermissionsExt;

        fs::metadata(path).expect("metadata").permissions().mode()
    }

    #[test]
    fn test_file_permissions_and_times_are_preserved() {
        let temp = tempfile::tempdir().expect("tempdir");
        let source = temp.path().join("source.txt");
        let dest = temp.path().join("dest.txt");
        fs::write(&source, b"data").expect("write source");
        fs::write(&dest, b"data").expect("write dest");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&source, fs::Permissions::from_mode(0o640)).expect("set source perms");
        }

        let atime = FileTime::from_unix_time(1_700_000_000, 111_000_000);
        let mtime = FileTime::from_unix_time(1_700_000_100, 222_000_000);
        set_file_times(&source, atime, mtime).expect("set source times");

        preserve(&source, &dest).expect("preserve metadata");

        let dest_meta = fs::metadata(&dest).expect("dest metadata");
        assert_eq!(FileTime::from_last_access_time(&dest_meta), atime);
        assert_eq!(FileTime::from_last_modification_time(&dest_meta), mtime);

        #[cfg(unix)]
        assert_eq!(current_mode(&dest) & 0o777, 0o640);
    }

    #[test]
    fn test_directory_times_are_preserved() {
        let temp = tempfile::tempdir().expect("tempdir");
        let source = temp.path().join("src-dir");
        let dest = temp.path().join("dst-dir");
        fs::create_dir(&source).expect("create source dir");
        fs::create_dir(&dest).expect("create dest dir");

        let mtime = FileTime::from_unix_time(1_650_000_000, 0);
        set_file_times(&source, mtime, mtime).expect("set source times");

        preserve(&source, &dest).expect("preserve metadata");

        let dest_meta = fs::metadata(&dest).expect("dest metadata");
        assert_eq!(FileTime::from_last_modification_time(&dest_meta), mtime);
    }

    #[test]
    fn test_missing_destination_reports_every_step() {
        let temp = tempfile::tempdir().expect("tempdir");
        let source = temp.path().join("source.txt");
        fs::write(&source, b"data").expect("write source");

        let failure = preserve(&source, &temp.path().join("gone")).expect_err("nothing to update");
        assert!(!failure.failures.is_empty());
        assert!(failure
            .failures
            .iter()
            .all(|f| f.category == crate::classify::ErrorCategory::NotFound));
        assert!(failure.message().contains("gone"));
        assert_eq!(failure.into_primary().code, libc::ENOENT);
    }
}
