//! History of completed apply-mode synchronizations.
//!
//! Stored as a JSON array in `<data_dir>/analytics.json`, one record per run.

use crate::engine::SyncStats;
use crate::error::SyncError;
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Timestamp format used in the history file.
pub const TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H:%M";

/// One completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsRecord {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub added_to_ioverlay: usize,
    #[serde(default)]
    pub added_to_crewchief: usize,
    #[serde(default)]
    pub total_ioverlay: usize,
    #[serde(default)]
    pub total_crewchief: usize,
}

impl AnalyticsRecord {
    /// A record for `stats` stamped with `at`.
    #[must_use]
    pub fn new(stats: &SyncStats, at: NaiveDateTime) -> Self {
        Self {
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
            added_to_ioverlay: stats.added_to_ioverlay,
            added_to_crewchief: stats.added_to_crewchief,
            total_ioverlay: stats.total_ioverlay,
            total_crewchief: stats.total_crewchief,
        }
    }
}

/// Aggregate view over the whole history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyticsSummary {
    pub runs: usize,
    pub total_added_to_ioverlay: usize,
    pub total_added_to_crewchief: usize,
    /// Largest iOverlay driver count seen in any run
    pub total_ioverlay: usize,
    /// Largest CrewChief driver count seen in any run
    pub total_crewchief: usize,
    pub latest: Option<AnalyticsRecord>,
}

/// Appends and reads the history file.
#[derive(Debug, Clone)]
pub struct AnalyticsRecorder {
    path: PathBuf,
}

impl AnalyticsRecorder {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record for `stats` stamped with the current local time.
    ///
    /// Returns `false` when the record was skipped because it equals the
    /// last one stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the history cannot be read or written.
    pub fn record(&self, stats: &SyncStats) -> Result<bool, SyncError> {
        self.record_at(stats, Local::now().naive_local())
    }

    /// Append a record for `stats` stamped with `at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the history cannot be read or written.
    pub fn record_at(&self, stats: &SyncStats, at: NaiveDateTime) -> Result<bool, SyncError> {
        let record = AnalyticsRecord::new(stats, at);
        let mut history = self.load()?;
        if history.last() == Some(&record) {
            tracing::debug!("Duplicate analytics record; skipped");
            return Ok(false);
        }
        history.push(record);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
        }
        let value = serde_json::to_value(&history).map_err(|source| SyncError::Encode {
            path: self.path.clone(),
            source,
        })?;
        crate::store::write_json(&self.path, Some(&value))?;
        tracing::info!(runs = history.len(), "Analytics record added");
        Ok(true)
    }

    /// Every stored record, oldest first. A missing file is an empty history.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Parse`] if the file is not a JSON array of records.
    pub fn load(&self) -> Result<Vec<AnalyticsRecord>, SyncError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let value = crate::store::read_json(&self.path)?;
        serde_json::from_value(value).map_err(|source| SyncError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Aggregates the history.
    ///
    /// # Errors
    ///
    /// Returns an error if the history cannot be loaded.
    pub fn summary(&self) -> Result<AnalyticsSummary, SyncError> {
        Ok(summarize(&self.load()?))
    }

    /// Deletes the history. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Io`] if the file exists but cannot be removed.
    pub fn reset(&self) -> Result<(), SyncError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "Analytics history reset");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::io(&self.path, e)),
        }
    }
}

/// Sums additions, takes the maximum totals and keeps the last record.
#[must_use]
pub fn summarize(history: &[AnalyticsRecord]) -> AnalyticsSummary {
    AnalyticsSummary {
        runs: history.len(),
        total_added_to_ioverlay: history.iter().map(|r| r.added_to_ioverlay).sum(),
        total_added_to_crewchief: history.iter().map(|r| r.added_to_crewchief).sum(),
        total_ioverlay: history.iter().map(|r| r.total_ioverlay).max().unwrap_or(0),
        total_crewchief: history.iter().map(|r| r.total_crewchief).max().unwrap_or(0),
        latest: history.last().cloned(),
    }
}
