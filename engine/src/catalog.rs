//! Path catalog walker.
//!
//! Enumerates a directory subtree lazily. Directories are always yielded
//! before their descendants, so a consumer can create a directory before
//! copying anything into it. Symlinks are never traversed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::classify::{FailureOrigin, FsFailure};
use crate::error::EngineError;
use crate::model::{Entry, EntryKind};

/// I/O failure on a single entry during a walk.
#[derive(Debug, Error)]
#[error("Failed to read {}: {source}", path.display())]
pub struct CatalogError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// A validated walk root. Each call to [`Catalog::entries`] restarts the walk.
#[derive(Debug, Clone)]
pub struct Catalog {
    root: PathBuf,
}

impl Catalog {
    /// Open a catalog rooted at `root`.
    ///
    /// # Errors
    /// `SourceNotFound` if the root does not exist, `NotADirectory` if it is
    /// something else. Nothing is yielded in either case.
    pub fn open(root: &Path) -> Result<Self, EngineError> {
        match fs::metadata(root) {
            Ok(metadata) if metadata.is_dir() => Ok(Catalog {
                root: root.to_path_buf(),
            }),
            Ok(_) => Err(EngineError::NotADirectory {
                path: root.to_path_buf(),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(EngineError::SourceNotFound {
                path: root.to_path_buf(),
            }),
            Err(e) => Err(EngineError::Filesystem(FsFailure::classify(
                &e,
                FailureOrigin::Transfer,
                root,
                None,
            ))),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily walk the subtree in pre-order, siblings sorted by name.
    pub fn entries(&self) -> CatalogIter {
        CatalogIter {
            root: self.root.clone(),
            inner: WalkDir::new(&self.root)
                .follow_links(false)
                .min_depth(1)
                .sort_by_file_name()
                .into_iter(),
        }
    }
}

/// Iterator returned by [`Catalog::entries`].
pub struct CatalogIter {
    root: PathBuf,
    inner: walkdir::IntoIter,
}

impl Iterator for CatalogIter {
    type Item = Result<Entry, CatalogError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let dir_entry = match self.inner.next()? {
                Ok(dir_entry) => dir_entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone());
                    let source = e
                        .into_io_error()
                        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop"));
                    return Some(Err(CatalogError { path, source }));
                }
            };

            match entry_from(&self.root, dir_entry.path()) {
                Ok(Some(entry)) => return Some(Ok(entry)),
                Ok(None) => {
                    tracing::warn!(path = %dir_entry.path().display(), "skipping special file");
                    continue;
                }
                Err(source) => {
                    return Some(Err(CatalogError {
                        path: dir_entry.path().to_path_buf(),
                        source,
                    }))
                }
            }
        }
    }
}

/// Build an [`Entry`] without following symlinks.
///
/// Returns `None` for objects that are neither files, directories nor symlinks.
fn entry_from(root: &Path, path: &Path) -> io::Result<Option<Entry>> {
    let metadata = fs::symlink_metadata(path)?;
    let file_type = metadata.file_type();

    let (kind, symlink_target) = if file_type.is_symlink() {
        (EntryKind::Symlink, Some(fs::read_link(path)?))
    } else if file_type.is_dir() {
        (EntryKind::Directory, None)
    } else if file_type.is_file() {
        (EntryKind::File, None)
    } else {
        return Ok(None);
    };

    let relative_path = path.strip_prefix(root).unwrap_or(path).to_path_buf();

    Ok(Some(Entry {
        path: path.to_path_buf(),
        relative_path,
        kind,
        size: if kind == EntryKind::Directory { 0 } else { metadata.len() },
        modified: metadata.modified().ok(),
        symlink_target,
    }))
}
