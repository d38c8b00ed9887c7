//! The reconciliation engine.
//!
//! [`ReconciliationEngine::synchronize`] loads both sources, plans the
//! additions each side is missing and, outside dry-run, writes both
//! documents back and records the run. Every failure is caught at this
//! boundary and reported in the returned [`SyncReport`].

pub mod plan;

pub use plan::{PlanAction, PlanItem, SyncPlan};

use crate::analytics::AnalyticsRecorder;
use crate::config::Config;
use crate::error::SyncError;
use crate::events::{EventSink, Source, SyncEvent, TracingSink};
use crate::lock::SyncLock;
use crate::store::{OverlaySettings, Reputations};
use crate::transaction::WriteTransaction;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, span};

/// Counts produced by one synchronization call.
///
/// Deletion counters exist for reporting compatibility and are always zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub added_to_ioverlay: usize,
    pub added_to_crewchief: usize,
    pub deleted_from_ioverlay: usize,
    pub deleted_from_crewchief: usize,
    pub total_ioverlay: usize,
    pub total_crewchief: usize,
}

impl SyncStats {
    /// Multi-line summary of the run.
    #[must_use]
    pub fn report(&self) -> String {
        let mut out = String::from("Synchronization Report:\n");
        let _ = writeln!(out, "  Drivers added to iOverlay: {}", self.added_to_ioverlay);
        let _ = writeln!(out, "  Drivers added to CrewChief: {}", self.added_to_crewchief);
        let _ = writeln!(out, "  Total drivers in iOverlay: {}", self.total_ioverlay);
        let _ = writeln!(out, "  Total drivers in CrewChief: {}", self.total_crewchief);
        out
    }
}

/// Outcome of [`ReconciliationEngine::synchronize`].
#[derive(Debug)]
pub struct SyncReport {
    pub success: bool,
    /// Zeroed when the call failed
    pub stats: SyncStats,
    pub error: Option<SyncError>,
    /// Planned additions; filled in dry-run only
    pub preview: Vec<PlanItem>,
}

impl SyncReport {
    /// Whether the call was stopped by the "no categories enabled" guard.
    #[must_use]
    pub fn is_policy_guard(&self) -> bool {
        self.error.as_ref().is_some_and(SyncError::is_policy_guard)
    }

    /// The error message, if the call failed.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

/// Locations of the two source documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnginePaths {
    pub overlay: PathBuf,
    pub reputations: PathBuf,
}

/// Everything the engine needs, passed in explicitly.
#[derive(Clone)]
pub struct EngineContext {
    pub config: Config,
    pub paths: EnginePaths,
    /// Lock directory; `None` disables locking
    pub locks_dir: Option<PathBuf>,
    /// History recorder for apply-mode runs; `None` records nothing
    pub analytics: Option<AnalyticsRecorder>,
    pub events: Arc<dyn EventSink>,
}

impl EngineContext {
    /// Context with paths taken from `config`, events sent to `tracing`,
    /// and no locking or analytics.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let paths = EnginePaths {
            overlay: config.ioverlay_settings_path.clone(),
            reputations: config.crewchief_reputations_path.clone(),
        };
        Self {
            config,
            paths,
            locks_dir: None,
            analytics: None,
            events: Arc::new(TracingSink),
        }
    }

    #[must_use]
    pub fn with_locks_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.locks_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_analytics(mut self, recorder: AnalyticsRecorder) -> Self {
        self.analytics = Some(recorder);
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("paths", &self.paths)
            .field("locks_dir", &self.locks_dir)
            .field("analytics", &self.analytics)
            .finish_non_exhaustive()
    }
}

/// Reconciles the iOverlay and CrewChief driver lists.
#[derive(Debug)]
pub struct ReconciliationEngine {
    ctx: EngineContext,
}

impl ReconciliationEngine {
    #[must_use]
    pub const fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    #[must_use]
    pub const fn context(&self) -> &EngineContext {
        &self.ctx
    }

    /// Runs one synchronization. Never returns an error: failures are
    /// reported in the [`SyncReport`].
    ///
    /// In dry-run nothing is written and the report's `preview` lists the
    /// planned additions.
    pub fn synchronize(&self, dry_run: bool) -> SyncReport {
        let span = span!(Level::INFO, "synchronize", dry_run);
        let _enter = span.enter();

        self.ctx.events.emit(&SyncEvent::Started {
            behavior: self.ctx.config.sync_behavior,
            dry_run,
        });

        match self.try_synchronize(dry_run) {
            Ok((stats, preview)) => {
                self.ctx
                    .events
                    .emit(&SyncEvent::Completed { stats, dry_run });
                SyncReport {
                    success: true,
                    stats,
                    error: None,
                    preview,
                }
            }
            Err(error) => {
                self.ctx.events.emit(&SyncEvent::Failed {
                    message: error.to_string(),
                    policy_guard: error.is_policy_guard(),
                });
                SyncReport {
                    success: false,
                    stats: SyncStats::default(),
                    error: Some(error),
                    preview: Vec::new(),
                }
            }
        }
    }

    fn try_synchronize(&self, dry_run: bool) -> Result<(SyncStats, Vec<PlanItem>), SyncError> {
        let ctx = &self.ctx;
        if !ctx.config.has_enabled_categories() {
            return Err(SyncError::NoCategoriesEnabled);
        }

        let _lock = ctx
            .locks_dir
            .as_deref()
            .map(|dir| SyncLock::acquire(dir, &ctx.paths.overlay, &ctx.paths.reputations))
            .transpose()?;

        let mut overlay = OverlaySettings::load(&ctx.paths.overlay)?;
        ctx.events.emit(&SyncEvent::SourceLoaded {
            source: Source::Overlay,
            path: ctx.paths.overlay.clone(),
            entries: overlay.drivers.len(),
        });
        let mut reputations = Reputations::load(&ctx.paths.reputations)?;
        ctx.events.emit(&SyncEvent::SourceLoaded {
            source: Source::CrewChief,
            path: ctx.paths.reputations.clone(),
            entries: reputations.len(),
        });

        if let Some(id) = overlay.ensure_reserved_category() {
            ctx.events.emit(&SyncEvent::ReservedCategoryCreated { id });
        }
        let reserved_id = overlay.reserved_category_id().ok_or_else(|| {
            SyncError::Validation("reserved 'CrewChief' category is missing".to_string())
        })?;

        let enabled = overlay.enabled_tag_ids(&ctx.config.enabled_categories);
        ctx.events.emit(&SyncEvent::CategoriesResolved {
            enabled_ids: enabled.iter().copied().collect(),
        });

        let plan = plan::build_plan(&overlay, &reputations, &enabled, ctx.events.as_ref());
        ctx.events.emit(&SyncEvent::Planned {
            to_overlay: plan.to_overlay.len(),
            to_crewchief: plan.to_crewchief.len(),
        });

        if dry_run {
            let stats = SyncStats {
                total_ioverlay: overlay.drivers.len(),
                total_crewchief: reputations.len(),
                ..SyncStats::default()
            };
            return Ok((stats, plan.into_items()));
        }

        let today = chrono::Local::now().date_naive();
        plan::apply(&plan, &mut overlay, &mut reputations, reserved_id, today);

        let mut txn = WriteTransaction::begin(&[ctx.paths.overlay.as_path(), ctx.paths.reputations.as_path()])?;
        if let Err(error) = self.write_sources(&overlay, &reputations) {
            return Err(match txn.rollback() {
                Ok(()) => {
                    ctx.events.emit(&SyncEvent::RolledBack {
                        message: error.to_string(),
                    });
                    error
                }
                Err(rollback) => {
                    ctx.events.emit(&SyncEvent::RollbackFailed {
                        message: rollback.to_string(),
                    });
                    SyncError::RollbackFailed {
                        write: Box::new(error),
                        rollback: Box::new(rollback),
                    }
                }
            });
        }
        txn.commit();

        let stats = SyncStats {
            added_to_ioverlay: plan.to_overlay.len(),
            added_to_crewchief: plan.to_crewchief.len(),
            deleted_from_ioverlay: 0,
            deleted_from_crewchief: 0,
            total_ioverlay: overlay.drivers.len(),
            total_crewchief: reputations.len(),
        };

        if let Some(recorder) = &ctx.analytics
            && let Err(e) = recorder.record(&stats)
        {
            ctx.events.emit(&SyncEvent::AnalyticsFailed {
                message: e.to_string(),
            });
        }

        Ok((stats, Vec::new()))
    }

    /// Writes iOverlay, then CrewChief.
    fn write_sources(&self, overlay: &OverlaySettings, reputations: &Reputations) -> Result<(), SyncError> {
        let ctx = &self.ctx;
        overlay.save(&ctx.paths.overlay)?;
        ctx.events.emit(&SyncEvent::FileWritten {
            source: Source::Overlay,
            path: ctx.paths.overlay.clone(),
        });
        reputations.save(&ctx.paths.reputations)?;
        ctx.events.emit(&SyncEvent::FileWritten {
            source: Source::CrewChief,
            path: ctx.paths.reputations.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::mpsc;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        ctx: EngineContext,
    }

    fn fixture(overlay: serde_json::Value, reputations: serde_json::Value) -> Fixture {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("settings.dat");
        let b = temp.path().join("iracing_reputations.json");
        std::fs::write(&a, serde_json::to_vec(&overlay).unwrap()).unwrap();
        std::fs::write(&b, serde_json::to_vec(&reputations).unwrap()).unwrap();

        let mut config = Config::default();
        config.ioverlay_settings_path = a;
        config.crewchief_reputations_path = b;
        config.set_category_enabled("Friends", true);
        let ctx = EngineContext::new(config)
            .with_locks_dir(temp.path().join("locks"))
            .with_analytics(AnalyticsRecorder::new(temp.path().join("analytics.json")));
        Fixture { _temp: temp, ctx }
    }

    fn overlay_doc(drivers: serde_json::Value) -> serde_json::Value {
        json!({"modules": {"drivertagging": {
            "tagcategory": [{"id": 1, "name": "Friends", "color": "#0000FF"}],
            "drivertag": drivers
        }}})
    }

    #[test]
    fn test_report_format() {
        let stats = SyncStats {
            added_to_ioverlay: 2,
            added_to_crewchief: 1,
            total_ioverlay: 10,
            total_crewchief: 9,
            ..SyncStats::default()
        };
        assert_eq!(
            stats.report(),
            "Synchronization Report:\n  Drivers added to iOverlay: 2\n  Drivers added to CrewChief: 1\n  Total drivers in iOverlay: 10\n  Total drivers in CrewChief: 9\n"
        );
    }

    #[test]
    fn test_dry_run_reports_preview_and_totals() {
        let f = fixture(
            overlay_doc(json!([{"id": 1, "identifier": "123456", "name": "Alice", "tagId": 1}])),
            json!([{"customer_id": 789_012, "name": "Bob"}]),
        );
        let report = ReconciliationEngine::new(f.ctx.clone()).synchronize(true);
        assert!(report.success);
        assert_eq!(report.stats.added_to_ioverlay, 0);
        assert_eq!(report.stats.total_ioverlay, 1);
        assert_eq!(report.stats.total_crewchief, 1);
        let details: Vec<String> = report.preview.iter().map(PlanItem::details).collect();
        assert_eq!(
            details,
            vec![
                "Add driver 'Bob' to iOverlay".to_string(),
                "Add driver 'Alice' to CrewChief".to_string()
            ]
        );
        assert!(!f.ctx.analytics.as_ref().unwrap().path().exists());
    }

    #[test]
    fn test_apply_records_analytics_and_empties_preview() {
        let f = fixture(
            overlay_doc(json!([{"id": 1, "identifier": "123456", "name": "Alice", "tagId": 1}])),
            json!([]),
        );
        let report = ReconciliationEngine::new(f.ctx.clone()).synchronize(false);
        assert!(report.success, "{:?}", report.error);
        assert!(report.preview.is_empty());
        assert_eq!(report.stats.added_to_crewchief, 1);
        assert_eq!(report.stats.total_crewchief, 1);

        let history = f.ctx.analytics.as_ref().unwrap().load().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].added_to_crewchief, 1);
    }

    #[test]
    fn test_policy_guard_emits_failed_event() {
        let mut f = fixture(overlay_doc(json!([])), json!([]));
        f.ctx.config.enabled_categories.clear();
        let (tx, rx) = mpsc::channel();
        let ctx = f.ctx.clone().with_events(Arc::new(tx));

        let report = ReconciliationEngine::new(ctx).synchronize(false);
        assert!(!report.success);
        assert!(report.is_policy_guard());

        let events: Vec<SyncEvent> = rx.try_iter().collect();
        assert!(events.contains(&SyncEvent::Failed {
            message: SyncError::NoCategoriesEnabled.to_string(),
            policy_guard: true
        }));
    }

    #[test]
    fn test_missing_overlay_is_not_found() {
        let f = fixture(overlay_doc(json!([])), json!([]));
        std::fs::remove_file(&f.ctx.paths.overlay).unwrap();
        let report = ReconciliationEngine::new(f.ctx.clone()).synchronize(false);
        assert!(!report.success);
        assert!(matches!(report.error, Some(SyncError::NotFound(_))));
        assert_eq!(report.stats, SyncStats::default());
    }

    #[test]
    fn test_held_lock_fails_the_call() {
        let f = fixture(overlay_doc(json!([])), json!([]));
        let _held = SyncLock::acquire(
            f.ctx.locks_dir.as_deref().unwrap(),
            &f.ctx.paths.overlay,
            &f.ctx.paths.reputations,
        )
        .unwrap();
        let report = ReconciliationEngine::new(f.ctx.clone()).synchronize(true);
        assert!(matches!(report.error, Some(SyncError::Locked(_))));
    }

    #[test]
    fn test_reserved_category_event_on_creation() {
        let f = fixture(overlay_doc(json!([])), json!([]));
        let (tx, rx) = mpsc::channel();
        let ctx = f.ctx.clone().with_events(Arc::new(tx));
        let report = ReconciliationEngine::new(ctx).synchronize(true);
        assert!(report.success);
        assert!(
            rx.try_iter()
                .any(|e| e == SyncEvent::ReservedCategoryCreated { id: 2 })
        );
    }
}
