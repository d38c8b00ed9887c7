use crate::SyncContext;
use crate::commands::context::CommandContext;
use crate::output;
use crate::utils::format_size;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use colored::Colorize;

/// Execute the backup command
///
/// Creates a zip archive of both source files, or lists the existing
/// archives when `list` is set.
///
/// # Errors
///
/// Returns an error if the archive cannot be written or the backup folder
/// cannot be read
pub fn execute(ctx: &SyncContext, list: bool) -> Result<()> {
    if list {
        return list_backups(ctx);
    }

    output::info("Creating backup...");
    let files = [ctx.overlay_path(), ctx.reputations_path()];
    let path = ctx
        .backup_manager()
        .create_backup(&files, Some(ctx.config.backup_retention_days))
        .context("Error creating backup")?;
    output::success(&format!("Backup created successfully: {}", path.display()));
    Ok(())
}

fn list_backups(ctx: &SyncContext) -> Result<()> {
    let manager = ctx.backup_manager();
    let backups = manager.list_backups()?;
    if backups.is_empty() {
        output::info(&format!("No backups found in {}", manager.folder().display()));
        return Ok(());
    }

    output::print(&format!("{}", format!("Backups in {}:", manager.folder().display()).bold()));
    for backup in &backups {
        let modified: DateTime<Local> = backup.modified.into();
        let name = backup
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        output::row(
            &[
                &modified.format("%Y-%m-%d %H:%M:%S").to_string(),
                &format_size(backup.size),
                &name,
            ],
            &[19, 10],
        );
    }
    output::info(&format!(
        "{} backup(s), kept for {} day(s)",
        backups.len(),
        ctx.config.backup_retention_days
    ));
    Ok(())
}
