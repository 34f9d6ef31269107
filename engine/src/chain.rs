//! Backup chain resolution.
//!
//! A chain is one full backup plus the incrementals that reference it. Every
//! incremental is taken against the newest valid full backup, so chains are
//! never more than one level deep.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{Local, NaiveDateTime};

use crate::error::EngineError;
use crate::model::{BackupKind, BackupLayout};
use crate::summary::SummaryRecord;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Backup directory name, `YYYY-MM-DD_HH-MM-SS`.
///
/// The fixed-width format makes lexicographic order equal chronological order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(String);

/// Returned when a string is not a well-formed timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTimestamp;

impl Timestamp {
    /// Current local time.
    pub fn now() -> Self {
        Timestamp(Local::now().format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Timestamp {
    type Err = InvalidTimestamp;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !has_timestamp_shape(s) {
            return Err(InvalidTimestamp);
        }
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).map_err(|_| InvalidTimestamp)?;
        Ok(Timestamp(s.to_string()))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Exact `dddd-dd-dd_dd-dd-dd` shape.
fn has_timestamp_shape(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 19
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 | 13 | 16 => *b == b'-',
            10 => *b == b'_',
            _ => b.is_ascii_digit(),
        })
}

/// A full backup usable as a chain reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFull {
    pub path: PathBuf,
    pub timestamp: Timestamp,
}

/// Scans a destination root for backup directories.
#[derive(Debug, Clone)]
pub struct ChainResolver<'a> {
    layout: &'a BackupLayout,
}

impl<'a> ChainResolver<'a> {
    pub fn new(layout: &'a BackupLayout) -> Self {
        ChainResolver { layout }
    }

    /// Most recent valid full backup under `dest_root`.
    ///
    /// Candidates are immediate subdirectories named by a timestamp, scanned
    /// newest first. The first whose summary says `full` and references its
    /// own timestamp wins.
    ///
    /// # Errors
    /// `NoValidFullBackup` if the root cannot be read or nothing qualifies.
    pub fn latest_full(&self, dest_root: &Path) -> Result<ResolvedFull, EngineError> {
        let not_found = || EngineError::NoValidFullBackup {
            root: dest_root.to_path_buf(),
        };

        let mut candidates: Vec<(Timestamp, PathBuf)> = fs::read_dir(dest_root)
            .map_err(|_| not_found())?
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let stamp = entry.file_name().to_str()?.parse::<Timestamp>().ok()?;
                Some((stamp, entry.path()))
            })
            .collect();
        candidates.sort();

        candidates
            .into_iter()
            .rev()
            .find(|(stamp, path)| self.is_valid_full(path, stamp))
            .map(|(timestamp, path)| {
                tracing::info!(backup = %path.display(), "resolved reference full backup");
                ResolvedFull { path, timestamp }
            })
            .ok_or_else(not_found)
    }

    /// The full backup named `timestamp` inside `store_root`.
    ///
    /// # Errors
    /// `NoValidFullBackup` if that directory is missing or is not a valid
    /// full backup.
    pub fn locate_full(&self, store_root: &Path, timestamp: &Timestamp) -> Result<ResolvedFull, EngineError> {
        let path = store_root.join(timestamp.as_str());
        if self.layout.data_root(&path).is_dir() && self.is_valid_full(&path, timestamp) {
            Ok(ResolvedFull {
                path,
                timestamp: timestamp.clone(),
            })
        } else {
            Err(EngineError::NoValidFullBackup { root: path })
        }
    }

    fn is_valid_full(&self, dir: &Path, stamp: &Timestamp) -> bool {
        match SummaryRecord::read(&self.layout.summary_path(dir)) {
            Ok(record) if record.kind == BackupKind::Full && &record.referenced_full == stamp => true,
            Ok(record) => {
                tracing::debug!(dir = %dir.display(), kind = %record.kind, "not a usable full backup");
                false
            }
            Err(e) => {
                tracing::debug!(dir = %dir.display(), error = %e, "skipping backup directory");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        s.parse().expect("valid timestamp")
    }

    fn make_backup(root: &Path, name: &str, summary: &str) {
        let dir = root.join(name);
        fs::create_dir_all(dir.join("data")).expect("Failed to create backup dir");
        fs::write(dir.join("type.nt"), summary).expect("Failed to write summary");
    }

    #[test]
    fn test_timestamp_shape() {
        assert!("2024-01-01_00-00-00".parse::<Timestamp>().is_ok());
        assert!("2024-01-01 00-00-00".parse::<Timestamp>().is_err());
        assert!("2024-1-01_00-00-00".parse::<Timestamp>().is_err());
        assert!("2024-01-01_00-00-00x".parse::<Timestamp>().is_err());
        assert!("2024-13-40_00-00-00".parse::<Timestamp>().is_err());
        assert!("notes".parse::<Timestamp>().is_err());
    }

    #[test]
    fn test_now_is_well_formed() {
        let now = Timestamp::now();
        assert_eq!(now.as_str().parse::<Timestamp>(), Ok(now.clone()));
    }

    #[test]
    fn test_timestamp_ordering_is_chronological() {
        assert!(ts("2023-12-31_23-59-59") < ts("2024-01-01_00-00-00"));
        assert!(ts("2024-01-01_00-00-01") > ts("2024-01-01_00-00-00"));
    }

    #[test]
    fn test_latest_full_picks_newest() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = temp_dir.path();
        make_backup(root, "2024-01-01_00-00-00", "full 2024-01-01_00-00-00\n\n");
        make_backup(root, "2024-03-01_00-00-00", "full 2024-03-01_00-00-00\n\n");
        make_backup(root, "2024-02-01_00-00-00", "full 2024-02-01_00-00-00\n\n");

        let layout = BackupLayout::default();
        let resolved = ChainResolver::new(&layout).latest_full(root).expect("Failed to resolve");
        assert_eq!(resolved.timestamp, ts("2024-03-01_00-00-00"));
        assert_eq!(resolved.path, root.join("2024-03-01_00-00-00"));
    }

    #[test]
    fn test_latest_full_skips_incrementals_and_corrupt() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = temp_dir.path();
        make_backup(root, "2024-01-01_00-00-00", "full 2024-01-01_00-00-00\n\n");
        make_backup(root, "2024-02-01_00-00-00", "incremental 2024-01-01_00-00-00\n\n");
        make_backup(root, "2024-03-01_00-00-00", "garbage");
        // Full summary that does not reference itself
        make_backup(root, "2024-04-01_00-00-00", "full 2024-01-01_00-00-00\n\n");
        make_backup(root, "not-a-backup", "full 2030-01-01_00-00-00\n\n");
        fs::create_dir(root.join("2024-05-01_00-00-00")).expect("Failed to create dir");

        let layout = BackupLayout::default();
        let resolved = ChainResolver::new(&layout).latest_full(root).expect("Failed to resolve");
        assert_eq!(resolved.timestamp, ts("2024-01-01_00-00-00"));
    }

    #[test]
    fn test_latest_full_none_qualifies() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        make_backup(temp_dir.path(), "2024-02-01_00-00-00", "incremental 2024-01-01_00-00-00\n\n");

        let layout = BackupLayout::default();
        let result = ChainResolver::new(&layout).latest_full(temp_dir.path());
        assert!(matches!(result, Err(EngineError::NoValidFullBackup { .. })));

        let missing = ChainResolver::new(&layout).latest_full(&temp_dir.path().join("nope"));
        assert!(matches!(missing, Err(EngineError::NoValidFullBackup { .. })));
    }

    #[test]
    fn test_locate_full() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = temp_dir.path();
        make_backup(root, "2024-01-01_00-00-00", "full 2024-01-01_00-00-00\n\n");
        make_backup(root, "2024-02-01_00-00-00", "incremental 2024-01-01_00-00-00\n\n");

        let layout = BackupLayout::default();
        let resolver = ChainResolver::new(&layout);

        let found = resolver
            .locate_full(root, &ts("2024-01-01_00-00-00"))
            .expect("Failed to locate full backup");
        assert_eq!(found.path, root.join("2024-01-01_00-00-00"));

        assert!(resolver.locate_full(root, &ts("2024-02-01_00-00-00")).is_err());
        assert!(resolver.locate_full(root, &ts("2024-09-09_00-00-00")).is_err());
    }
}
