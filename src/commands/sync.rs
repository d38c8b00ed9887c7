use crate::SyncContext;
use crate::commands::context::CommandContext;
use crate::engine::{PlanItem, SyncReport};
use crate::error::SyncError;
use crate::output;
use anyhow::Result;
use colored::Colorize;

/// Execute the sync command
///
/// In preview mode nothing is written and the planned additions are listed.
/// Otherwise both sources are backed up first (when `backup_files` is set),
/// then synchronized, and the report is printed.
///
/// # Errors
///
/// Returns an error if:
/// - No category is enabled (checked before any file is touched)
/// - The iOverlay file is missing
/// - The synchronization fails
pub fn execute(ctx: &SyncContext, preview: bool) -> Result<()> {
    // Nothing may be created or backed up when the run would be skipped
    if !ctx.config.has_enabled_categories() {
        return Err(SyncError::NoCategoriesEnabled.into());
    }

    ctx.ensure_sources()?;
    if !preview {
        ctx.backup_if_enabled();
    }

    output::info(&format!(
        "Synchronizing ({}){}",
        ctx.config.sync_behavior,
        if preview { ", preview only" } else { "" }
    ));

    let report = ctx.create_engine().synchronize(preview);
    finish(report, preview)
}

/// Prints a finished report, turning a failure into an error.
fn finish(report: SyncReport, preview: bool) -> Result<()> {
    if let Some(error) = report.error {
        if error.is_policy_guard() {
            return Err(error.into());
        }
        return Err(anyhow::Error::new(error).context("Synchronization failed"));
    }

    if preview {
        print_preview(&report.preview);
    } else {
        output::success("Synchronization completed successfully.");
    }
    output::print(report.stats.report().trim_end());
    Ok(())
}

/// Lists the planned additions as aligned columns.
fn print_preview(items: &[PlanItem]) {
    if items.is_empty() {
        output::success("Both sources are already in sync. Nothing to add.");
        return;
    }

    let id_width = items
        .iter()
        .map(|item| item.identifier.as_str().len())
        .max()
        .unwrap_or(0)
        .max("Identifier".len());
    let widths = [6, id_width, 9];

    output::print(&format!("{}", "Planned changes:".bold()));
    output::row(&["Action", "Identifier", "Source", "Details"], &widths);
    for item in items {
        output::row(
            &[
                item.action_label(),
                item.identifier.as_str(),
                item.source().label(),
                &item.details(),
            ],
            &widths,
        );
    }
    output::print("");
}
