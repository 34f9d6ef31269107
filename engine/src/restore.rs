//! Restore runs.
//!
//! Restoring a backup directory merges it with the full backup its summary
//! references: the full backup's tree, minus the paths recorded as deleted,
//! overlaid with the backup's own tree. Restoring a full backup degenerates
//! to a plain copy because the summary references the backup itself.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::catalog::Catalog;
use crate::chain::{ChainResolver, ResolvedFull};
use crate::classify::{FailureOrigin, FsFailure};
use crate::error::EngineError;
use crate::fs_ops;
use crate::job::TransferRun;
use crate::model::{BackupKind, BackupLayout, Configuration, Operation, RunFlags};
use crate::summary::SummaryRecord;
use crate::transfer::TransferExecutor;

/// Deleted paths, relative to the referenced full backup's data root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionSet {
    relative: BTreeSet<PathBuf>,
}

impl DeletionSet {
    /// Normalize the absolute paths recorded in a summary.
    ///
    /// A path is first stripped of `<full>/data`. If the backup store was
    /// moved since the summary was written that prefix no longer matches, so
    /// everything up to and including the `<timestamp>/data` component pair
    /// is stripped instead. Paths matching neither are dropped.
    pub fn normalize(recorded: &BTreeSet<PathBuf>, full: &ResolvedFull, layout: &BackupLayout) -> Self {
        let data_root = layout.data_root(&full.path);
        let stamp = OsStr::new(full.timestamp.as_str());
        let data_dir = OsStr::new(layout.data_dir);

        let relative = recorded
            .iter()
            .filter_map(|path| {
                let rel = match path.strip_prefix(&data_root) {
                    Ok(rel) => Some(rel.to_path_buf()),
                    Err(_) => strip_through_pair(path, stamp, data_dir),
                };
                if rel.is_none() {
                    tracing::warn!(path = %path.display(), "ignoring deleted path outside the full backup");
                }
                rel
            })
            .filter(|rel| !rel.as_os_str().is_empty())
            .collect();

        DeletionSet { relative }
    }

    pub fn contains(&self, relative_path: &Path) -> bool {
        self.relative.contains(relative_path)
    }

    pub fn len(&self) -> usize {
        self.relative.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relative.is_empty()
    }
}

/// Components after the first `<first>/<second>` pair, if any.
fn strip_through_pair(path: &Path, first: &OsStr, second: &OsStr) -> Option<PathBuf> {
    let components: Vec<Component<'_>> = path.components().collect();
    let position = components.windows(2).position(|pair| {
        pair[0].as_os_str() == first && pair[1].as_os_str() == second
    })?;
    Some(components[position + 2..].iter().collect())
}

/// One restore run.
#[derive(Debug)]
pub struct RestoreRun {
    source: PathBuf,
    destination: PathBuf,
    flags: RunFlags,
    layout: BackupLayout,
    full: Option<ResolvedFull>,
    deleted: DeletionSet,
    prepared: Option<PathBuf>,
}

impl RestoreRun {
    /// # Errors
    /// `InvalidConfiguration` if `config` does not describe a restore.
    pub fn new(config: &Configuration) -> Result<Self, EngineError> {
        if config.operation != Operation::Restore {
            return Err(EngineError::InvalidConfiguration(
                "a backup configuration cannot drive a restore".to_string(),
            ));
        }

        Ok(RestoreRun {
            source: config.source.clone(),
            destination: config.destination.clone(),
            flags: config.flags,
            layout: config.layout.clone(),
            full: None,
            deleted: DeletionSet::default(),
            prepared: None,
        })
    }

    fn read_summary(&self) -> Result<SummaryRecord, EngineError> {
        let summary_path = self.layout.summary_path(&self.source);
        let record = SummaryRecord::read(&summary_path)?;

        if record.kind == BackupKind::Full {
            let own_name = self.source.file_name().and_then(OsStr::to_str);
            if own_name != Some(record.referenced_full.as_str()) {
                return Err(EngineError::corrupt(
                    summary_path,
                    "full backup summary does not reference its own directory",
                ));
            }
        }
        Ok(record)
    }

    fn prepare_destination(&mut self) -> Result<(), EngineError> {
        match fs::metadata(&self.destination) {
            Ok(metadata) if metadata.is_dir() => {
                let empty = fs_ops::is_empty_dir(&self.destination).map_err(EngineError::Filesystem)?;
                if !empty {
                    if !self.flags.override_destination {
                        return Err(EngineError::DestinationNotEmpty {
                            path: self.destination.clone(),
                        });
                    }
                    tracing::info!(destination = %self.destination.display(), "clearing destination");
                    fs_ops::clear_directory(&self.destination).map_err(EngineError::Filesystem)?;
                }
            }
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
        self.prepared = Some(self.destination.clone());
        Ok(())
    }

    fn prepared_full(&self) -> Result<&ResolvedFull, EngineError> {
        self.full
            .as_ref()
            .ok_or_else(|| EngineError::InvalidConfiguration("restore run was not prepared".to_string()))
    }
}

impl TransferRun for RestoreRun {
    fn operation(&self) -> Operation {
        Operation::Restore
    }

    fn source(&self) -> &Path {
        &self.source
    }

    fn prepare(&mut self) -> Result<(), EngineError> {
        if !self.layout.data_root(&self.source).is_dir() {
            return Err(EngineError::SourceNotFound {
                path: self.source.clone(),
            });
        }
        self.source = fs::canonicalize(&self.source).map_err(|e| filesystem(e, &self.source))?;

        let record = self.read_summary()?;
        let store_root = self.source.parent().ok_or_else(|| EngineError::NoValidFullBackup {
            root: self.source.clone(),
        })?;
        let full = ChainResolver::new(&self.layout).locate_full(store_root, &record.referenced_full)?;
        self.deleted = DeletionSet::normalize(&record.deleted_paths, &full, &self.layout);
        tracing::info!(
            full = %full.path.display(),
            deleted = self.deleted.len(),
            "resolved backup chain"
        );
        self.full = Some(full);

        self.prepare_destination()
    }

    fn transfer(&mut self, executor: &mut TransferExecutor<'_>) -> Result<(), EngineError> {
        let full_data = self.layout.data_root(&self.prepared_full()?.path);
        let own_data = self.layout.data_root(&self.source);
        let destination = self.destination.clone();

        // Pass 1: the full backup, minus what is newer or deleted
        for item in Catalog::open(&full_data)?.entries() {
            let entry = match item {
                Ok(entry) => entry,
                Err(e) => {
                    executor.walk_failed(e)?;
                    continue;
                }
            };
            // Present in the backup itself, or under a non-directory there
            match fs::symlink_metadata(own_data.join(&entry.relative_path)) {
                Ok(_) => continue,
                Err(e) if e.raw_os_error() == Some(libc::ENOTDIR) => continue,
                Err(_) => {}
            }
            if self.deleted.contains(&entry.relative_path) {
                tracing::debug!(path = %entry.relative_path.display(), "skipping deleted entry");
                continue;
            }
            executor.transfer(&entry, &full_data, &destination)?;
        }

        // Pass 2: everything in the restored backup itself
        for item in Catalog::open(&own_data)?.entries() {
            match item {
                Ok(entry) => executor.transfer(&entry, &own_data, &destination)?,
                Err(e) => executor.walk_failed(e)?,
            }
        }
        Ok(())
    }

    fn finish(&mut self, _executor: &mut TransferExecutor<'_>) -> Result<(), EngineError> {
        Ok(())
    }

    fn target(&self) -> Option<&Path> {
        self.prepared.as_deref()
    }
}

fn filesystem(error: io::Error, path: &Path) -> EngineError {
    EngineError::Filesystem(FsFailure::classify(&error, FailureOrigin::Transfer, path, None))
}
