//! Structured events emitted by the reconciliation engine.
//!
//! The engine never prints. It hands [`SyncEvent`]s to an [`EventSink`], and
//! presentation layers decide what to show: the CLI forwards them to
//! `tracing`, a UI can subscribe through an `mpsc` channel.

use crate::config::SyncBehavior;
use crate::engine::SyncStats;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use tracing::{debug, info, warn};

/// The two documents being reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// iOverlay `settings.dat`.
    Overlay,
    /// CrewChief `iracing_reputations.json`.
    CrewChief,
}

impl Source {
    /// Display name of the owning application.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Overlay => "iOverlay",
            Self::CrewChief => "CrewChief",
        }
    }
}

/// Something that happened during a synchronization call.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A synchronization call began.
    Started {
        /// Configured sync behaviour.
        behavior: SyncBehavior,
        /// Whether this is a preview run.
        dry_run: bool,
    },
    /// A source document was read and validated.
    SourceLoaded {
        /// Which document.
        source: Source,
        /// Where it was read from.
        path: PathBuf,
        /// Number of driver entries it holds.
        entries: usize,
    },
    /// The reserved category was missing and has been added in memory.
    ReservedCategoryCreated {
        /// Id assigned to the new category.
        id: i64,
    },
    /// Enabled category names were resolved to tag ids.
    CategoriesResolved {
        /// Tag ids participating in matching.
        enabled_ids: Vec<i64>,
    },
    /// A driver was not mirrored because its key is already present on the
    /// target side.
    DuplicateSkipped {
        /// Cross-source key.
        identifier: String,
        /// Side that already holds it.
        target: Source,
    },
    /// The synchronization plan was computed.
    Planned {
        /// Drivers to add to iOverlay.
        to_overlay: usize,
        /// Drivers to add to CrewChief.
        to_crewchief: usize,
    },
    /// A source document was rewritten.
    FileWritten {
        /// Which document.
        source: Source,
        /// Where it was written.
        path: PathBuf,
    },
    /// A write failed and both documents were restored to their content
    /// before the write phase.
    RolledBack {
        /// Error that interrupted the write phase.
        message: String,
    },
    /// A write failed and at least one document could not be restored.
    RollbackFailed {
        /// Restore errors.
        message: String,
    },
    /// The analytics recorder could not store the run.
    AnalyticsFailed {
        /// Error description.
        message: String,
    },
    /// The call completed successfully.
    Completed {
        /// Final counts.
        stats: SyncStats,
        /// Whether this was a preview run.
        dry_run: bool,
    },
    /// The call failed. Both documents are unchanged unless a
    /// [`SyncEvent::RollbackFailed`] preceded it.
    Failed {
        /// Error description.
        message: String,
        /// True when the failure is the "no categories enabled" guard.
        policy_guard: bool,
    },
}

/// Receiver for engine events.
pub trait EventSink: Send + Sync {
    /// Handles one event.
    fn emit(&self, event: &SyncEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &SyncEvent) {
        match event {
            SyncEvent::Started { behavior, dry_run } => {
                info!(mode = %behavior, dry_run, "Starting synchronization");
            }
            SyncEvent::SourceLoaded {
                source,
                path,
                entries,
            } => {
                debug!(source = source.label(), path = %path.display(), entries, "Source loaded");
            }
            SyncEvent::ReservedCategoryCreated { id } => {
                info!(id, "Added 'CrewChief' category to iOverlay settings");
            }
            SyncEvent::CategoriesResolved { enabled_ids } => {
                debug!(?enabled_ids, "Enabled tag ids");
            }
            SyncEvent::DuplicateSkipped { identifier, target } => {
                warn!(
                    identifier = %identifier,
                    target = target.label(),
                    "Driver already present on target side; not added"
                );
            }
            SyncEvent::Planned {
                to_overlay,
                to_crewchief,
            } => {
                debug!(to_overlay, to_crewchief, "Synchronization plan computed");
            }
            SyncEvent::FileWritten { source, path } => {
                info!(source = source.label(), path = %path.display(), "File written");
            }
            SyncEvent::RolledBack { message } => {
                warn!(error = %message, "Write not completed; original files restored");
            }
            SyncEvent::RollbackFailed { message } => {
                tracing::error!(error = %message, "Could not restore original files");
            }
            SyncEvent::AnalyticsFailed { message } => {
                warn!(error = %message, "Failed to record analytics");
            }
            SyncEvent::Completed { stats, dry_run } => {
                info!(
                    dry_run,
                    added_to_ioverlay = stats.added_to_ioverlay,
                    added_to_crewchief = stats.added_to_crewchief,
                    total_ioverlay = stats.total_ioverlay,
                    total_crewchief = stats.total_crewchief,
                    "Synchronization completed"
                );
            }
            SyncEvent::Failed {
                message,
                policy_guard,
            } => {
                if *policy_guard {
                    warn!("{message}");
                } else {
                    tracing::error!(error = %message, "Synchronization failed");
                }
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &SyncEvent) {}
}

impl EventSink for Sender<SyncEvent> {
    fn emit(&self, event: &SyncEvent) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_channel_sink_delivers_events() {
        let (tx, rx) = mpsc::channel();
        tx.emit(&SyncEvent::ReservedCategoryCreated { id: 4 });
        assert_eq!(
            rx.recv().unwrap(),
            SyncEvent::ReservedCategoryCreated { id: 4 }
        );
    }

    #[test]
    fn test_channel_sink_ignores_closed_receiver() {
        let (tx, rx) = mpsc::channel::<SyncEvent>();
        drop(rx);
        tx.emit(&SyncEvent::ReservedCategoryCreated { id: 1 });
    }
}
