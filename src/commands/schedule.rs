use crate::SyncContext;
use crate::commands::context::CommandContext;
use crate::config::Config;
use crate::error::SyncError;
use crate::output;
use crate::scheduler::{self, Scheduler};
use anyhow::Result;

/// Execute the run-scheduled command
///
/// Runs backup (when enabled) and synchronization every `interval` hours,
/// falling back to `scheduler_interval` from the configuration. With
/// `background`, a detached copy of driversync runs the loop instead.
///
/// # Errors
///
/// Returns an error if:
/// - No interval is given or configured, or it is outside 1-24 hours
/// - The source files are not usable
/// - The background process cannot be spawned
pub fn execute(ctx: &SyncContext, interval: Option<u32>, background: bool) -> Result<()> {
    let hours = interval.or(ctx.config.scheduler_interval).ok_or_else(|| {
        SyncError::Configuration(
            "no scheduler interval given; pass --interval or set 'scheduler_interval'".to_string(),
        )
    })?;
    let scheduler = Scheduler::new(hours)?;
    ctx.ensure_sources()?;

    if background {
        let args = vec![
            "--quiet".to_string(),
            "run-scheduled".to_string(),
            "--interval".to_string(),
            hours.to_string(),
        ];
        let pid = scheduler::spawn_background(&args)?;
        output::success(&format!(
            "DriverSync is running in the background (pid {pid}), every {hours} hour(s)."
        ));
        return Ok(());
    }

    output::info(&format!(
        "Starting scheduler with an interval of {hours} hour(s)."
    ));
    scheduler.run(|| run_once(ctx), None);
    output::info("Scheduler stopped.");
    Ok(())
}

/// One scheduled run: reload the configuration, back up, synchronize.
///
/// The configuration is re-read so edits made while the scheduler waits
/// take effect on the next run. If it cannot be read, the previous one is
/// used. With no category enabled the run is skipped before any file is
/// touched.
///
/// # Errors
///
/// Returns an error if the synchronization fails. The "no categories
/// enabled" guard is only a warning.
pub fn run_once(ctx: &SyncContext) -> Result<()> {
    output::info("Running scheduled synchronization...");
    let mut run_ctx = ctx.clone();
    match Config::load(&ctx.config_path) {
        Ok(config) => run_ctx.config = config,
        Err(e) => output::warning(&format!("Using previous configuration: {e:#}")),
    }

    if !run_ctx.config.has_enabled_categories() {
        output::warning(&SyncError::NoCategoriesEnabled.to_string());
        return Ok(());
    }

    run_ctx.ensure_sources()?;
    run_ctx.backup_if_enabled();

    let report = run_ctx.create_engine().synchronize(false);
    match report.error {
        None => {
            output::success(&format!(
                "Scheduled synchronization completed: {} added to iOverlay, {} added to CrewChief",
                report.stats.added_to_ioverlay, report.stats.added_to_crewchief
            ));
            Ok(())
        }
        Some(error) if error.is_policy_guard() => {
            output::warning(&error.to_string());
            Ok(())
        }
        Some(error) => Err(anyhow::Error::new(error).context("Scheduled synchronization failed")),
    }
}
