//! Filesystem operations module.
//!
//! This module provides the low-level mutations used by transfers and by
//! destination preparation:
//! - Creating directories and missing ancestors
//! - Copying file contents and symlinks
//! - Clearing or removing partially written trees
//!
//! Every failure is returned as a classified [`FsFailure`] naming the paths
//! involved.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::classify::{FailureOrigin, FsFailure};

fn failure(error: io::Error, path1: &Path, path2: Option<&Path>) -> FsFailure {
    FsFailure::classify(&error, FailureOrigin::Transfer, path1, path2)
}

/// True if `error` means the path does not exist, including the case where
/// one of its ancestors is not a directory.
pub fn is_absent(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::NotFound || error.raw_os_error() == Some(libc::ENOTDIR)
}

/// Create a directory. An existing directory is not an error.
pub fn create_directory(path: &Path) -> Result<(), FsFailure> {
    fs::create_dir_all(path).map_err(|e| failure(e, path, None))
}

/// Copy a regular file's contents, truncating any existing destination.
///
/// # Returns
/// Number of bytes copied
pub fn copy_file_contents(src: &Path, dst: &Path) -> Result<u64, FsFailure> {
    let mut src_file = fs::File::open(src).map_err(|e| failure(e, src, Some(dst)))?;
    let mut dst_file = fs::File::create(dst).map_err(|e| failure(e, src, Some(dst)))?;
    io::copy(&mut src_file, &mut dst_file).map_err(|e| failure(e, src, Some(dst)))
}

/// Recreate the symlink `src` at `dst` with the same target string.
///
/// The link is never dereferenced.
pub fn copy_symlink(src: &Path, dst: &Path) -> Result<(), FsFailure> {
    let target = fs::read_link(src).map_err(|e| failure(e, src, Some(dst)))?;
    make_symlink(&target, dst).map_err(|e| failure(e, src, Some(dst)))
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

/// Create every missing ancestor of `path`, outermost first.
///
/// # Returns
/// The directories that were actually created, outermost first.
pub fn create_missing_ancestors(path: &Path) -> Result<Vec<PathBuf>, FsFailure> {
    let mut missing = Vec::new();
    let mut cursor = path.parent();

    while let Some(dir) = cursor {
        if dir.as_os_str().is_empty() {
            break;
        }
        match fs::symlink_metadata(dir) {
            Ok(metadata) if metadata.is_dir() => break,
            Ok(_) => {
                return Err(failure(
                    io::Error::from_raw_os_error(libc::ENOTDIR),
                    dir,
                    None,
                ))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => missing.push(dir.to_path_buf()),
            Err(e) => return Err(failure(e, dir, None)),
        }
        cursor = dir.parent();
    }

    missing.reverse();
    for dir in &missing {
        match fs::create_dir(dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => {}
            Err(e) => return Err(failure(e, dir, None)),
        }
    }
    Ok(missing)
}

/// True if `dir` has no children.
pub fn is_empty_dir(dir: &Path) -> Result<bool, FsFailure> {
    let mut entries = fs::read_dir(dir).map_err(|e| failure(e, dir, None))?;
    Ok(entries.next().is_none())
}

/// Remove everything inside `dir`, keeping `dir` itself.
pub fn clear_directory(dir: &Path) -> Result<(), FsFailure> {
    for entry in fs::read_dir(dir).map_err(|e| failure(e, dir, None))? {
        let entry = entry.map_err(|e| failure(e, dir, None))?;
        remove_entry(&entry.path())?;
    }
    Ok(())
}

/// Remove a file, symlink or whole directory tree.
pub fn remove_entry(path: &Path) -> Result<(), FsFailure> {
    let metadata = fs::symlink_metadata(path).map_err(|e| failure(e, path, None))?;
    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| failure(e, path, None))
}
