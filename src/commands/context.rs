use anyhow::Result;

use crate::SyncContext;
use crate::analytics::AnalyticsRecorder;
use crate::backup::BackupManager;
use crate::engine::{EngineContext, ReconciliationEngine};

/// Trait providing common operations for command modules
pub trait CommandContext {
    /// Ensures the configuration points at usable source files before a
    /// command touches them
    ///
    /// # Errors
    ///
    /// Returns an error if the iOverlay file is missing or the CrewChief file
    /// is missing and cannot be created
    fn ensure_sources(&self) -> Result<()>;

    /// Creates a reconciliation engine with locking and analytics enabled
    fn create_engine(&self) -> ReconciliationEngine;

    /// Creates a `BackupManager` for the data directory's backup folder
    fn backup_manager(&self) -> BackupManager;

    /// Creates an `AnalyticsRecorder` for the data directory's history file
    fn analytics_recorder(&self) -> AnalyticsRecorder;

    /// Backs up both source files when `backup_files` is enabled.
    ///
    /// A failed backup is reported and does not stop the caller.
    fn backup_if_enabled(&self);
}

impl CommandContext for SyncContext {
    fn ensure_sources(&self) -> Result<()> {
        self.check_sources()
    }

    fn create_engine(&self) -> ReconciliationEngine {
        let ctx = EngineContext::new(self.config.clone())
            .with_locks_dir(self.locks_dir())
            .with_analytics(self.analytics_recorder());
        ReconciliationEngine::new(ctx)
    }

    fn backup_manager(&self) -> BackupManager {
        BackupManager::new(self.backup_dir()).with_config_path(&self.config_path)
    }

    fn analytics_recorder(&self) -> AnalyticsRecorder {
        AnalyticsRecorder::new(self.analytics_path())
    }

    fn backup_if_enabled(&self) {
        if !self.config.backup_files {
            return;
        }
        let files = [self.overlay_path(), self.reputations_path()];
        match self
            .backup_manager()
            .create_backup(&files, Some(self.config.backup_retention_days))
        {
            Ok(path) => crate::output::info(&format!("Backup created: {}", path.display())),
            Err(e) => crate::output::warning(&format!("Backup failed: {e}")),
        }
    }
}
