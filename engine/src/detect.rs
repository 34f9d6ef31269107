//! Change detection against a reference full backup.
//!
//! The comparison is a cheap size + mtime heuristic, not a content hash: two
//! files with identical size and mtime but different bytes are considered
//! unchanged.

use std::fs;
use std::path::{Path, PathBuf};

use crate::model::{Entry, EntryKind};

/// Verdict for one live entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Unchanged,
    Changed,
}

/// Compares live entries with their counterparts in a reference data tree.
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    reference: Option<PathBuf>,
}

impl ChangeDetector {
    /// Detector for a full backup: everything is `Changed`.
    pub fn full() -> Self {
        ChangeDetector { reference: None }
    }

    /// Detector comparing against the data root of a reference backup.
    pub fn against(reference_data_root: impl Into<PathBuf>) -> Self {
        ChangeDetector {
            reference: Some(reference_data_root.into()),
        }
    }

    pub fn classify(&self, entry: &Entry) -> Change {
        match &self.reference {
            None => Change::Changed,
            Some(root) => classify_against(entry, &root.join(&entry.relative_path)),
        }
    }
}

fn classify_against(entry: &Entry, reference: &Path) -> Change {
    let metadata = match fs::symlink_metadata(reference) {
        Ok(metadata) => metadata,
        Err(_) => return Change::Changed,
    };
    let file_type = metadata.file_type();

    let unchanged = match entry.kind {
        EntryKind::Directory => file_type.is_dir() && same_mtime(entry, &metadata),
        EntryKind::Symlink => {
            file_type.is_symlink()
                && fs::read_link(reference).ok().as_deref() == entry.symlink_target.as_deref()
        }
        EntryKind::File => {
            file_type.is_file() && metadata.len() == entry.size && same_mtime(entry, &metadata)
        }
    };

    if unchanged {
        Change::Unchanged
    } else {
        Change::Changed
    }
}

fn same_mtime(entry: &Entry, reference: &fs::Metadata) -> bool {
    match (entry.modified, reference.modified()) {
        (Some(live), Ok(stored)) => live == stored,
        _ => false,
    }
}
