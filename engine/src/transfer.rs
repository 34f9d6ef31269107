//! Transfer execution.
//!
//! The executor performs one filesystem mutation per changed entry and keeps
//! two ordered outcome lists. Metadata is preserved afterwards in a strict
//! second pass; entries whose metadata could not be preserved are then moved
//! from the success list to the error list by [`TransferLedger::reconcile`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::catalog::CatalogError;
use crate::classify::{ErrorPolicy, FailureOrigin, FsFailure};
use crate::error::EngineError;
use crate::fs_ops;
use crate::metadata;
use crate::model::{Entry, EntryKind, OutcomeResult, TransferOutcome};
use crate::progress::ProgressCallback;

/// Ordered outcomes of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferLedger {
    pub successes: Vec<TransferOutcome>,
    pub errors: Vec<TransferOutcome>,
}

impl TransferLedger {
    /// Move failed successes into the error list.
    ///
    /// `failures` holds `(index into successes, message)` pairs in ascending
    /// index order. Relative order is kept in both lists.
    pub fn reconcile(&mut self, failures: Vec<(usize, String)>) {
        if failures.is_empty() {
            return;
        }

        let mut failed = failures.into_iter().peekable();
        let successes = std::mem::take(&mut self.successes);
        for (index, mut outcome) in successes.into_iter().enumerate() {
            match failed.next_if(|(i, _)| *i == index) {
                Some((_, message)) => {
                    outcome.result = OutcomeResult::Error(message);
                    self.errors.push(outcome);
                }
                None => self.successes.push(outcome),
            }
        }
    }
}

/// Performs transfers and collects their outcomes.
pub struct TransferExecutor<'a> {
    policy: ErrorPolicy,
    progress: Option<&'a dyn ProgressCallback>,
    ledger: TransferLedger,
    // Implicitly created directories and their index in `ledger.successes`
    implicit: HashMap<PathBuf, usize>,
}

impl<'a> TransferExecutor<'a> {
    /// `progress` receives `on_entry` before every mutation; pass `None` when
    /// progress output is disabled.
    pub fn new(policy: ErrorPolicy, progress: Option<&'a dyn ProgressCallback>) -> Self {
        TransferExecutor {
            policy,
            progress,
            ledger: TransferLedger::default(),
            implicit: HashMap::new(),
        }
    }

    /// Transfer `entry` (walked under `source_root`) into `target_root`.
    ///
    /// Missing ancestors of the target are created and recorded as directory
    /// transfers of their source counterparts. A later explicit transfer of
    /// such a directory takes over that record instead of adding a second one.
    ///
    /// # Errors
    /// The classified failure, unless the policy ignores errors.
    pub fn transfer(&mut self, entry: &Entry, source_root: &Path, target_root: &Path) -> Result<(), EngineError> {
        let target = target_root.join(&entry.relative_path);

        match fs_ops::create_missing_ancestors(&target) {
            Ok(created) => {
                for dir in created {
                    if let Ok(rel) = dir.strip_prefix(target_root) {
                        let source = source_root.join(rel);
                        tracing::debug!(dir = %dir.display(), "created missing parent");
                        self.implicit.insert(dir.clone(), self.ledger.successes.len());
                        self.ledger
                            .successes
                            .push(TransferOutcome::success(source, dir, EntryKind::Directory));
                    }
                }
            }
            Err(failure) => return self.fail(entry, &target, failure),
        }

        if let Some(progress) = self.progress {
            progress.on_entry(&entry.path, &target);
        }

        let result = match entry.kind {
            EntryKind::Directory => fs_ops::create_directory(&target),
            EntryKind::File => fs_ops::copy_file_contents(&entry.path, &target).map(|_| ()),
            EntryKind::Symlink => fs_ops::copy_symlink(&entry.path, &target),
        };

        match result {
            Ok(()) => {
                tracing::debug!(
                    source = %entry.path.display(),
                    destination = %target.display(),
                    kind = ?entry.kind,
                    "transferred"
                );
                let earlier = match entry.kind {
                    EntryKind::Directory => self.implicit.remove(&target),
                    _ => None,
                };
                match earlier.and_then(|index| self.ledger.successes.get_mut(index)) {
                    Some(outcome) => outcome.source_path = entry.path.clone(),
                    None => self
                        .ledger
                        .successes
                        .push(TransferOutcome::success(entry.path.clone(), target, entry.kind)),
                }
                Ok(())
            }
            Err(failure) => self.fail(entry, &target, failure),
        }
    }

    /// Route a walk failure through the error policy.
    pub fn walk_failed(&mut self, error: CatalogError) -> Result<(), EngineError> {
        let failure = FsFailure::classify(&error.source, FailureOrigin::Transfer, &error.path, None);
        let message = self.policy.dispose(failure)?;
        self.ledger.errors.push(TransferOutcome::error(
            error.path.clone(),
            error.path,
            EntryKind::Directory,
            message,
        ));
        Ok(())
    }

    /// Record an informational deletion marker.
    pub fn record_deleted(&mut self, source_path: &Path, kind: EntryKind) {
        tracing::debug!(path = %source_path.display(), "deleted since reference backup");
        self.ledger
            .successes
            .push(TransferOutcome::deleted(source_path.to_path_buf(), kind));
    }

    /// Second pass: preserve metadata of every successful non-symlink transfer.
    ///
    /// # Errors
    /// The first preservation failure, unless the policy ignores errors.
    pub fn preserve_metadata(&mut self) -> Result<(), EngineError> {
        let mut failures = Vec::new();

        for (index, outcome) in self.ledger.successes.iter().enumerate() {
            if outcome.kind == EntryKind::Symlink || outcome.result != OutcomeResult::Success {
                continue;
            }
            if let Err(failure) = metadata::preserve(&outcome.source_path, &outcome.destination_path) {
                if !self.policy.ignore_errors {
                    return Err(EngineError::Filesystem(failure.into_primary()));
                }
                let message = failure.message();
                tracing::warn!(destination = %outcome.destination_path.display(), "{}", message);
                failures.push((index, message));
            }
        }

        self.ledger.reconcile(failures);
        Ok(())
    }

    pub fn ledger(&self) -> &TransferLedger {
        &self.ledger
    }

    pub fn into_ledger(self) -> TransferLedger {
        self.ledger
    }

    fn fail(&mut self, entry: &Entry, target: &Path, failure: FsFailure) -> Result<(), EngineError> {
        let message = self.policy.dispose(failure)?;
        self.ledger.errors.push(TransferOutcome::error(
            entry.path.clone(),
            target.to_path_buf(),
            entry.kind,
            message,
        ));
        Ok(())
    }
}
