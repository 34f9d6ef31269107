//! Summary ledger: the `type.nt` file inside each backup directory.
//!
//! Line-oriented plain text:
//!
//! ```text
//! <full|incremental> <referenced-full-timestamp>
//!
//! <deleted-path-1>
//! <deleted-path-2>
//! ```
//!
//! A full backup references its own timestamp. Deleted paths are absolute
//! paths inside the referenced full backup's data tree, one per line, stored
//! as the raw bytes of the file name.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::chain::Timestamp;
use crate::error::EngineError;
use crate::model::BackupKind;

/// Parsed contents of a summary file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRecord {
    pub kind: BackupKind,
    pub referenced_full: Timestamp,
    pub deleted_paths: BTreeSet<PathBuf>,
}

impl SummaryRecord {
    /// Summary of a full backup taken at `timestamp`.
    pub fn full(timestamp: Timestamp) -> Self {
        SummaryRecord {
            kind: BackupKind::Full,
            referenced_full: timestamp,
            deleted_paths: BTreeSet::new(),
        }
    }

    /// Summary of an incremental backup against the full backup `reference`.
    pub fn incremental(reference: Timestamp, deleted_paths: BTreeSet<PathBuf>) -> Self {
        SummaryRecord {
            kind: BackupKind::Incremental,
            referenced_full: reference,
            deleted_paths,
        }
    }

    /// Render the on-disk representation. Paths are written byte for byte.
    pub fn render(&self) -> Vec<u8> {
        let mut out = format!("{} {}\n\n", self.kind.keyword(), self.referenced_full).into_bytes();
        for path in &self.deleted_paths {
            out.extend_from_slice(&path_to_bytes(path));
            out.push(b'\n');
        }
        out
    }

    /// Parse the on-disk representation. The error is a human-readable reason.
    pub fn parse(bytes: &[u8]) -> Result<Self, String> {
        let mut lines = bytes.split(|&b| b == b'\n');
        let header = lines
            .by_ref()
            .find(|line| !line.iter().all(u8::is_ascii_whitespace))
            .ok_or_else(|| "summary is empty".to_string())?;
        let header = std::str::from_utf8(header).map_err(|_| "header line is not valid text".to_string())?;

        let mut tokens = header.split_whitespace();
        let (kind_word, stamp) = match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(kind), Some(stamp), None) => (kind, stamp),
            _ => return Err(format!("malformed header line '{}'", header.trim())),
        };

        let kind = BackupKind::from_keyword(kind_word)
            .ok_or_else(|| format!("unknown backup type '{}'", kind_word))?;
        let referenced_full: Timestamp = stamp
            .parse()
            .map_err(|_| format!("timestamp '{}' is corrupted", stamp))?;

        let deleted_paths = lines
            .filter(|line| !line.is_empty())
            .map(path_from_bytes)
            .collect::<Result<BTreeSet<_>, String>>()?;

        Ok(SummaryRecord {
            kind,
            referenced_full,
            deleted_paths,
        })
    }

    /// Read and parse a summary file.
    ///
    /// # Errors
    /// `CorruptBackup` if the file is missing, empty or malformed.
    pub fn read(path: &Path) -> Result<Self, EngineError> {
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => EngineError::corrupt(path, "summary file is missing"),
            _ => EngineError::Summary {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        Self::parse(&bytes).map_err(|reason| EngineError::corrupt(path, reason))
    }

    /// Write this summary to `path`, replacing any existing file.
    pub fn write(&self, path: &Path) -> Result<(), EngineError> {
        fs::write(path, self.render()).map_err(|e| EngineError::Summary {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

#[cfg(unix)]
fn path_to_bytes(path: &Path) -> std::borrow::Cow<'_, [u8]> {
    use std::os::unix::ffi::OsStrExt;
    std::borrow::Cow::Borrowed(path.as_os_str().as_bytes())
}

#[cfg(not(unix))]
fn path_to_bytes(path: &Path) -> std::borrow::Cow<'_, [u8]> {
    std::borrow::Cow::Owned(path.to_string_lossy().into_owned().into_bytes())
}

#[cfg(unix)]
fn path_from_bytes(bytes: &[u8]) -> Result<PathBuf, String> {
    use std::os::unix::ffi::OsStrExt;
    Ok(PathBuf::from(std::ffi::OsStr::from_bytes(bytes)))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: &[u8]) -> Result<PathBuf, String> {
    std::str::from_utf8(bytes)
        .map(PathBuf::from)
        .map_err(|_| "deleted path is not valid text".to_string())
}
