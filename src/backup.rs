//! Timestamped zip backups of the source documents.
//!
//! Each backup is a `backup_YYYYMMDD_HHMMSS.zip` archive holding the listed
//! files under their bare file names. After writing an archive, backups
//! older than the retention window (by modification time) are deleted.

use crate::config::DEFAULT_RETENTION_DAYS;
use crate::error::SyncError;
use chrono::Local;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;

/// File name prefix of backup archives.
pub const BACKUP_PREFIX: &str = "backup_";
/// File name extension of backup archives.
pub const BACKUP_EXTENSION: &str = "zip";

/// An archive found in the backup folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

/// Creates and prunes backup archives in one folder.
#[derive(Debug, Clone)]
pub struct BackupManager {
    folder: PathBuf,
    /// Configuration consulted for the retention window when none is given.
    config_path: Option<PathBuf>,
}

impl BackupManager {
    #[must_use]
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            config_path: None,
        }
    }

    /// Read the retention window from this configuration file when
    /// [`Self::create_backup`] is not given one.
    #[must_use]
    pub fn with_config_path(mut self, config_path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(config_path.into());
        self
    }

    #[must_use]
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Archive `files` and prune old backups.
    ///
    /// Missing files are skipped with a warning. A failure while pruning is
    /// logged and does not fail the backup.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Backup`] if the folder or the archive cannot be
    /// written.
    pub fn create_backup(
        &self,
        files: &[&Path],
        retention_days: Option<u32>,
    ) -> Result<PathBuf, SyncError> {
        let span = tracing::span!(tracing::Level::DEBUG, "backup", folder = %self.folder.display());
        let _enter = span.enter();

        fs::create_dir_all(&self.folder).map_err(|e| {
            SyncError::Backup(format!(
                "cannot create backup folder {}: {e}",
                self.folder.display()
            ))
        })?;

        let archive_path = self.next_archive_path();
        if let Err(e) = write_archive(&archive_path, files) {
            let _ = fs::remove_file(&archive_path);
            return Err(SyncError::Backup(e.to_string()));
        }
        info!(archive = %archive_path.display(), "Backup created");

        let retention = retention_days.unwrap_or_else(|| self.configured_retention_days());
        if let Err(e) = self.prune_backups(retention) {
            warn!(error = %e, "Failed to prune old backups");
        }

        Ok(archive_path)
    }

    /// Delete backup archives older than `retention_days`.
    ///
    /// Only files named like backup archives are considered.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Io`] if the folder cannot be listed. Individual
    /// files that cannot be deleted are logged and skipped.
    pub fn prune_backups(&self, retention_days: u32) -> Result<Vec<PathBuf>, SyncError> {
        let max_age = Duration::from_secs(u64::from(retention_days) * 86_400);
        let now = SystemTime::now();
        let mut removed = Vec::new();

        for backup in self.list_backups()? {
            let age = now.duration_since(backup.modified).unwrap_or_default();
            if age <= max_age {
                continue;
            }
            match fs::remove_file(&backup.path) {
                Ok(()) => {
                    info!(backup = %backup.path.display(), "Removed old backup");
                    removed.push(backup.path);
                }
                Err(e) => warn!(backup = %backup.path.display(), error = %e, "Failed to remove old backup"),
            }
        }
        Ok(removed)
    }

    /// Backup archives in the folder, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Io`] if the folder exists but cannot be listed.
    pub fn list_backups(&self) -> Result<Vec<BackupEntry>, SyncError> {
        if !self.folder.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.folder).map_err(|e| SyncError::io(&self.folder, e))?;

        let mut backups: Vec<BackupEntry> = entries
            .flatten()
            .filter(|entry| is_backup_name(&entry.file_name().to_string_lossy()))
            .filter_map(|entry| {
                let metadata = entry.metadata().ok()?;
                metadata.is_file().then(|| BackupEntry {
                    path: entry.path(),
                    size: metadata.len(),
                    modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                })
            })
            .collect();
        backups.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
        Ok(backups)
    }

    /// Retention from the configuration file, or the default when it is
    /// missing or unreadable.
    fn configured_retention_days(&self) -> u32 {
        let Some(path) = &self.config_path else {
            return DEFAULT_RETENTION_DAYS;
        };
        let days = fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str::<serde_json::Value>(&content).ok())
            .and_then(|config| config.get("backup_retention_days")?.as_u64())
            .and_then(|days| u32::try_from(days).ok());
        days.unwrap_or_else(|| {
            warn!(
                config = %path.display(),
                "Could not read backup_retention_days; defaulting to {DEFAULT_RETENTION_DAYS} days"
            );
            DEFAULT_RETENTION_DAYS
        })
    }

    /// Timestamped archive path that does not exist yet.
    fn next_archive_path(&self) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let base = self
            .folder
            .join(format!("{BACKUP_PREFIX}{stamp}.{BACKUP_EXTENSION}"));
        if !base.exists() {
            return base;
        }
        (1..)
            .map(|n| {
                self.folder
                    .join(format!("{BACKUP_PREFIX}{stamp}_{n}.{BACKUP_EXTENSION}"))
            })
            .find(|candidate| !candidate.exists())
            .unwrap_or(base)
    }
}

/// Whether `name` looks like an archive written by [`BackupManager`].
fn is_backup_name(name: &str) -> bool {
    name.starts_with(BACKUP_PREFIX)
        && Path::new(name)
            .extension()
            .is_some_and(|ext| ext == BACKUP_EXTENSION)
}

fn write_archive(archive_path: &Path, files: &[&Path]) -> anyhow::Result<()> {
    let file = File::create(archive_path)?;
    let mut zip = zip::ZipWriter::new(BufWriter::new(file));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for path in files {
        if !path.exists() {
            warn!(file = %path.display(), "File not found; skipped in backup");
            continue;
        }
        let Some(name) = path.file_name() else {
            warn!(file = %path.display(), "File has no name; skipped in backup");
            continue;
        };
        let content = fs::read(path)?;
        zip.start_file(name.to_string_lossy().into_owned(), options)?;
        zip.write_all(&content)?;
        debug!(file = %path.display(), bytes = content.len(), "Added to backup");
    }

    let mut writer = zip.finish()?;
    writer.flush()?;
    Ok(())
}
