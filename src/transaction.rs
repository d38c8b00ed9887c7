//! RAII rollback guard for the write phase of a synchronization.
//!
//! The two source documents are written one after the other. If the second
//! write fails after the first succeeded, the pair would be left half
//! synchronized. [`WriteTransaction`] snapshots every file before the write
//! phase and puts the snapshots back when dropped without `commit()`.
//!
//! Restores go through the same temp-file-and-rename path as normal writes.
//! Rollback continues past individual failures and reports them together.

use crate::error::SyncError;
use std::path::{Path, PathBuf};

/// RAII Transaction Guard - auto-rollback on drop if not committed.
///
/// # Usage
///
/// ```no_run
/// # use driversync::transaction::WriteTransaction;
/// # use std::path::Path;
/// # fn main() -> Result<(), driversync::SyncError> {
/// let a = Path::new("settings.dat");
/// let b = Path::new("iracing_reputations.json");
/// let txn = WriteTransaction::begin(&[a, b])?;
///
/// // write a, then b...
///
/// txn.commit();
/// # Ok(())
/// # }
/// ```
///
/// Callers that need to know whether restoring worked call
/// [`WriteTransaction::rollback`] themselves. If the function returns early
/// (error or panic) before `commit()` or `rollback()`, the `Drop`
/// implementation restores every file and logs any failure.
#[derive(Debug)]
pub struct WriteTransaction {
    /// `None` after rollback completes (prevents double-rollback).
    checkpoint: Option<Vec<Snapshot>>,
    /// Set to `true` by `commit()` to prevent rollback on drop.
    committed: bool,
}

/// Content of one file when the transaction began.
#[derive(Debug)]
struct Snapshot {
    path: PathBuf,
    /// `None` if the file did not exist; it is removed on rollback.
    content: Option<Vec<u8>>,
}

impl WriteTransaction {
    /// Begin a transaction, capturing the current bytes of every file.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Io`] if an existing file cannot be read.
    pub fn begin(paths: &[&Path]) -> Result<Self, SyncError> {
        let mut snapshots = Vec::with_capacity(paths.len());
        for path in paths {
            let content = if path.exists() {
                Some(std::fs::read(path).map_err(|e| SyncError::io(*path, e))?)
            } else {
                None
            };
            snapshots.push(Snapshot {
                path: path.to_path_buf(),
                content,
            });
        }
        Ok(Self {
            checkpoint: Some(snapshots),
            committed: false,
        })
    }

    /// Commit the transaction, preventing automatic rollback.
    pub fn commit(mut self) {
        self.committed = true;
        self.checkpoint = None;
    }

    /// Put every captured file back. A second call does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error listing every file that could not be restored.
    /// Later files are still attempted after an earlier one fails.
    pub fn rollback(&mut self) -> Result<(), SyncError> {
        let Some(snapshots) = self.checkpoint.take() else {
            return Ok(());
        };

        let mut errors = Vec::new();
        for snapshot in &snapshots {
            let result = match &snapshot.content {
                Some(bytes) => crate::store::write_atomic(&snapshot.path, bytes),
                None if snapshot.path.exists() => std::fs::remove_file(&snapshot.path)
                    .map_err(|e| SyncError::io(&snapshot.path, e)),
                None => Ok(()),
            };
            if let Err(e) = result {
                errors.push(e.to_string());
            }
        }

        if errors.is_empty() {
            tracing::info!(files = snapshots.len(), "Write transaction rolled back");
            Ok(())
        } else {
            Err(SyncError::Io {
                path: snapshots
                    .first()
                    .map(|s| s.path.clone())
                    .unwrap_or_default(),
                source: std::io::Error::other(format!("Rollback errors: {}", errors.join("; "))),
            })
        }
    }
}

impl Drop for WriteTransaction {
    fn drop(&mut self) {
        if !self.committed && self.checkpoint.is_some() {
            tracing::warn!("Write not completed, restoring original files");
            if let Err(e) = self.rollback() {
                tracing::error!(error = %e, "Rollback failed");
            }
        }
    }
}
