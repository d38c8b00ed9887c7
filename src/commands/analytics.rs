use crate::SyncContext;
use crate::commands::context::CommandContext;
use crate::output;
use anyhow::Result;
use colored::Colorize;

/// Execute the analytics command
///
/// Shows cumulative additions, the largest totals seen and the latest run,
/// followed by every recorded run. With `reset`, the history is deleted.
///
/// # Errors
///
/// Returns an error if the history file cannot be read or removed
pub fn execute(ctx: &SyncContext, reset: bool) -> Result<()> {
    let recorder = ctx.analytics_recorder();

    if reset {
        recorder.reset()?;
        output::success("Analytics history cleared");
        return Ok(());
    }

    let history = recorder.load()?;
    if history.is_empty() {
        output::info("No analytics data found.");
        return Ok(());
    }
    let summary = crate::analytics::summarize(&history);

    output::print(&format!("{}", "Synchronization Analytics:".bold()));
    output::print(&format!("  Runs recorded: {}", summary.runs));
    output::print(&format!(
        "  Drivers added to iOverlay: {}",
        summary.total_added_to_ioverlay
    ));
    output::print(&format!(
        "  Drivers added to CrewChief: {}",
        summary.total_added_to_crewchief
    ));
    output::print(&format!("  Total Drivers in iOverlay: {}", summary.total_ioverlay));
    output::print(&format!("  Total Drivers in CrewChief: {}", summary.total_crewchief));

    if let Some(latest) = &summary.latest {
        output::print("");
        output::print(&format!("{}", "Latest Synchronization:".bold()));
        output::print(&format!("  Time: {}", latest.timestamp));
        output::print(&format!(
            "  Added: {} to iOverlay, {} to CrewChief",
            latest.added_to_ioverlay, latest.added_to_crewchief
        ));
        output::print(&format!(
            "  Totals: {} in iOverlay, {} in CrewChief",
            latest.total_ioverlay, latest.total_crewchief
        ));
    }

    output::print("");
    let widths = [16, 9, 10, 9];
    output::row(&["Time", "+iOverlay", "+CrewChief", "iOverlay", "CrewChief"], &widths);
    for record in &history {
        output::row(
            &[
                &record.timestamp,
                &record.added_to_ioverlay.to_string(),
                &record.added_to_crewchief.to_string(),
                &record.total_ioverlay.to_string(),
                &record.total_crewchief.to_string(),
            ],
            &widths,
        );
    }
    Ok(())
}
