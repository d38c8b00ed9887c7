use crate::SyncContext;
use crate::commands::context::CommandContext;
use crate::error::SyncError;
use crate::lock::SyncLock;
use crate::output;
use crate::store::{OverlaySettings, table};
use crate::transaction::WriteTransaction;
use anyhow::{Context, Result, bail};
use colored::Colorize;
use std::fs::File;
use std::io;
use std::path::Path;

/// Execute the export command
///
/// Writes the iOverlay driver list as CSV to `path`, or to stdout when the
/// path is `-`. With `category`, only drivers in that category are written.
///
/// # Errors
///
/// Returns an error if the iOverlay file cannot be loaded, the category does
/// not exist, or the CSV cannot be written
pub fn export(ctx: &SyncContext, path: &Path, category: Option<&str>) -> Result<()> {
    let overlay = OverlaySettings::load(ctx.overlay_path())?;
    let tag_id = match category {
        Some(name) => match overlay.category_id(name) {
            Some(id) => Some(id),
            None => bail!("Category '{name}' does not exist in iOverlay"),
        },
        None => None,
    };
    let drivers = overlay
        .drivers
        .iter()
        .filter(|tag| tag_id.is_none_or(|id| tag.tag_id == id));

    let csv_error = |source| SyncError::Csv {
        path: path.to_path_buf(),
        source,
    };
    if path.as_os_str() == "-" {
        table::export_drivers(drivers, io::stdout().lock()).map_err(csv_error)?;
        return Ok(());
    }

    let file = File::create(path).map_err(|e| SyncError::io(path, e))?;
    let count = table::export_drivers(drivers, file).map_err(csv_error)?;
    output::success(&format!("Exported {count} driver(s) to {}", path.display()));
    Ok(())
}

/// Execute the import command
///
/// Adds the drivers listed in a CSV file to iOverlay. Drivers already tagged
/// are left as they are and repeated rows are ignored. The file is checked
/// completely before anything is written: one bad row rejects the import.
/// CrewChief picks the new drivers up on the next sync.
///
/// # Errors
///
/// Returns an error if:
/// - The CSV file cannot be read or has invalid rows
/// - A row names a category iOverlay does not have
/// - Another synchronization holds the lock for the same pair of files
/// - Writing iOverlay fails (the original file is restored)
pub fn import(ctx: &SyncContext, path: &Path, preview: bool) -> Result<()> {
    ctx.ensure_sources()?;

    let file = File::open(path).map_err(|e| SyncError::io(path, e))?;
    let parsed = table::import_drivers(file);
    if !parsed.errors.is_empty() {
        report_rows(&parsed.errors);
        bail!(
            "{} has {} invalid row(s); nothing was imported",
            path.display(),
            parsed.errors.len()
        );
    }

    let _lock = SyncLock::acquire(&ctx.locks_dir(), ctx.overlay_path(), ctx.reputations_path())?;

    let mut overlay = OverlaySettings::load(ctx.overlay_path())?;
    let plan = match overlay.plan_import(&parsed.drivers) {
        Ok(plan) => plan,
        Err(errors) => {
            report_rows(&errors);
            bail!("{} refers to unknown categories; nothing was imported", path.display());
        }
    };

    if plan.already_tagged + plan.repeated > 0 {
        output::info(&format!(
            "Skipping {} driver(s) already in iOverlay and {} repeated row(s)",
            plan.already_tagged, plan.repeated
        ));
    }
    if plan.additions.is_empty() {
        output::info("No new drivers to import");
        return Ok(());
    }

    if preview {
        output::print(&format!("{}", "Would add to iOverlay:".bold()));
        for tag in &plan.additions {
            output::row(&[tag.identifier.as_str(), tag.name.as_str()], &[10]);
        }
        output::info(&format!("{} driver(s) would be added", plan.additions.len()));
        return Ok(());
    }

    ctx.backup_if_enabled();

    let added = plan.additions.len();
    overlay.append_drivers(plan.additions);
    let txn = WriteTransaction::begin(&[ctx.overlay_path()])?;
    overlay
        .save(ctx.overlay_path())
        .context("Import failed; iOverlay was left unchanged")?;
    txn.commit();

    output::success(&format!("Imported {added} driver(s) into iOverlay"));
    Ok(())
}

fn report_rows(errors: &[(usize, String)]) {
    for (line, message) in errors {
        output::error(&format!("line {line}: {message}"));
    }
}
