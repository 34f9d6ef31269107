//! Full and incremental backup runs.
//!
//! A backup writes `<dest>/<timestamp>/data/...` plus a summary file. A full
//! backup copies everything; an incremental copies only entries the change
//! detector flags against the newest full backup, then records the entries
//! that disappeared from the source since that full backup.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::catalog::Catalog;
use crate::chain::{ChainResolver, ResolvedFull, Timestamp};
use crate::classify::{FailureOrigin, FsFailure};
use crate::detect::{Change, ChangeDetector};
use crate::error::EngineError;
use crate::fs_ops;
use crate::job::TransferRun;
use crate::model::{BackupKind, BackupLayout, Configuration, Operation, RunFlags};
use crate::summary::SummaryRecord;
use crate::transfer::TransferExecutor;

/// One backup run.
#[derive(Debug)]
pub struct BackupRun {
    kind: BackupKind,
    source: PathBuf,
    destination: PathBuf,
    flags: RunFlags,
    layout: BackupLayout,
    timestamp: Timestamp,
    reference: Option<ResolvedFull>,
    backup_dir: Option<PathBuf>,
}

impl BackupRun {
    /// Backup run stamped with the current local time.
    ///
    /// # Errors
    /// `InvalidConfiguration` if `config` does not describe a backup.
    pub fn new(config: &Configuration) -> Result<Self, EngineError> {
        let kind = match config.operation {
            Operation::Backup(kind) => kind,
            Operation::Restore => {
                return Err(EngineError::InvalidConfiguration(
                    "a restore configuration cannot drive a backup".to_string(),
                ))
            }
        };

        Ok(BackupRun {
            kind,
            source: config.source.clone(),
            destination: config.destination.clone(),
            flags: config.flags,
            layout: config.layout.clone(),
            timestamp: Timestamp::now(),
            reference: None,
            backup_dir: None,
        })
    }

    /// Replace the backup timestamp.
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    fn prepared_dir(&self) -> Result<&Path, EngineError> {
        self.backup_dir
            .as_deref()
            .ok_or_else(|| EngineError::InvalidConfiguration("backup run was not prepared".to_string()))
    }

    fn prepare_destination(&mut self) -> Result<(), EngineError> {
        match fs::metadata(&self.destination) {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => {
                return Err(EngineError::NotADirectory {
                    path: self.destination.clone(),
                })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if !self.flags.create_destination {
                    return Err(EngineError::DestinationMissing {
                        path: self.destination.clone(),
                    });
                }
                tracing::info!(destination = %self.destination.display(), "creating destination");
                fs_ops::create_directory(&self.destination).map_err(EngineError::Filesystem)?;
            }
            Err(e) => return Err(filesystem(e, &self.destination)),
        }

        self.destination = fs::canonicalize(&self.destination).map_err(|e| filesystem(e, &self.destination))?;
        if let Some(reference) = self.reference.as_mut() {
            reference.path = self.destination.join(reference.timestamp.as_str());
        }

        let backup_dir = self.destination.join(self.timestamp.as_str());
        if fs::symlink_metadata(&backup_dir).is_ok() {
            return Err(EngineError::BackupExists { path: backup_dir });
        }

        self.backup_dir = Some(backup_dir.clone());
        fs_ops::create_directory(&self.layout.data_root(&backup_dir)).map_err(EngineError::Filesystem)?;
        tracing::info!(backup = %backup_dir.display(), kind = %self.kind, "backup directory created");
        Ok(())
    }

    /// Record every entry of the reference full backup that no longer exists
    /// in the source. Nothing is deleted.
    fn scan_deletions(&self, executor: &mut TransferExecutor<'_>) -> Result<BTreeSet<PathBuf>, EngineError> {
        let mut deleted = BTreeSet::new();
        let Some(reference) = &self.reference else {
            return Ok(deleted);
        };

        let catalog = Catalog::open(&self.layout.data_root(&reference.path))?;
        for item in catalog.entries() {
            let entry = match item {
                Ok(entry) => entry,
                Err(e) => {
                    executor.walk_failed(e)?;
                    continue;
                }
            };

            let live = self.source.join(&entry.relative_path);
            match fs::symlink_metadata(&live) {
                Ok(_) => {}
                Err(e) if fs_ops::is_absent(&e) => {
                    executor.record_deleted(&live, entry.kind);
                    deleted.insert(entry.path);
                }
                Err(e) => tracing::warn!(path = %live.display(), error = %e, "cannot check source entry"),
            }
        }

        Ok(deleted)
    }
}

impl TransferRun for BackupRun {
    fn operation(&self) -> Operation {
        Operation::Backup(self.kind)
    }

    fn source(&self) -> &Path {
        &self.source
    }

    fn prepare(&mut self) -> Result<(), EngineError> {
        Catalog::open(&self.source)?;
        self.source = fs::canonicalize(&self.source).map_err(|e| filesystem(e, &self.source))?;

        if self.kind == BackupKind::Incremental {
            let resolver = ChainResolver::new(&self.layout);
            self.reference = Some(resolver.latest_full(&self.destination)?);
        }

        self.prepare_destination()
    }

    fn transfer(&mut self, executor: &mut TransferExecutor<'_>) -> Result<(), EngineError> {
        let data_root = self.layout.data_root(self.prepared_dir()?);
        let detector = match &self.reference {
            Some(reference) => ChangeDetector::against(self.layout.data_root(&reference.path)),
            None => ChangeDetector::full(),
        };

        let catalog = Catalog::open(&self.source)?;
        for item in catalog.entries() {
            match item {
                Ok(entry) => {
                    if detector.classify(&entry) == Change::Changed {
                        executor.transfer(&entry, &self.source, &data_root)?;
                    }
                }
                Err(e) => executor.walk_failed(e)?,
            }
        }
        Ok(())
    }

    fn finish(&mut self, executor: &mut TransferExecutor<'_>) -> Result<(), EngineError> {
        let backup_dir = self.prepared_dir()?;

        let record = match &self.reference {
            Some(reference) => {
                let deleted = self.scan_deletions(executor)?;
                tracing::info!(reference = %reference.timestamp, deleted = deleted.len(), "deletion scan done");
                SummaryRecord::incremental(reference.timestamp.clone(), deleted)
            }
            None => SummaryRecord::full(self.timestamp.clone()),
        };

        record.write(&self.layout.summary_path(backup_dir))
    }

    fn target(&self) -> Option<&Path> {
        self.backup_dir.as_deref()
    }

    fn timestamp(&self) -> Option<&Timestamp> {
        Some(&self.timestamp)
    }
}

fn filesystem(error: io::Error, path: &Path) -> EngineError {
    EngineError::Filesystem(FsFailure::classify(&error, FailureOrigin::Transfer, path, None))
}
