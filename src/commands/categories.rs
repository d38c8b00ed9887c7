use crate::SyncContext;
use crate::output;
use crate::store::OverlaySettings;
use anyhow::{Context, Result};
use colored::Colorize;

/// List iOverlay categories with their enabled flag and driver count
///
/// Names enabled in the configuration but absent from iOverlay are listed
/// after the table.
///
/// # Errors
///
/// Returns an error if the iOverlay file cannot be loaded
pub fn list(ctx: &SyncContext) -> Result<()> {
    let overlay = OverlaySettings::load(ctx.overlay_path())
        .context("Failed to load iOverlay categories")?;
    let counts = overlay.drivers_per_category();
    let status = overlay.category_status(&ctx.config.enabled_categories);

    if status.is_empty() {
        output::info("iOverlay has no tag categories");
        return Ok(());
    }

    let name_width = status
        .iter()
        .map(|(category, _)| category.name.len())
        .max()
        .unwrap_or(0)
        .max("Name".len());
    let widths = [4, name_width, 7, 7];

    output::row(&["Id", "Name", "Color", "Drivers", "Enabled"], &widths);
    for (category, enabled) in status {
        let id = category.id.to_string();
        let drivers = counts.get(&category.id).copied().unwrap_or(0).to_string();
        let flag = if enabled {
            "yes".green().to_string()
        } else {
            "no".dimmed().to_string()
        };
        output::row(
            &[
                &id,
                &category.name,
                category.color.as_deref().unwrap_or("-"),
                &drivers,
                &flag,
            ],
            &widths,
        );
    }

    let stale: Vec<&str> = ctx
        .config
        .enabled_categories
        .iter()
        .filter(|(name, enabled)| **enabled && overlay.category_id(name).is_none())
        .map(|(name, _)| name.as_str())
        .collect();
    if !stale.is_empty() {
        output::warning(&format!(
            "Enabled but not found in iOverlay: {}",
            stale.join(", ")
        ));
    }
    Ok(())
}

/// Enable or disable a category by name and save the configuration
///
/// # Errors
///
/// Returns an error if the configuration cannot be saved
pub fn set_enabled(ctx: &mut SyncContext, name: &str, enabled: bool) -> Result<()> {
    if name.trim().is_empty() {
        anyhow::bail!("Category name cannot be empty");
    }

    match OverlaySettings::load(ctx.overlay_path()) {
        Ok(overlay) if overlay.category_id(name).is_none() => output::warning(&format!(
            "Category '{name}' does not exist in iOverlay (names are case-sensitive)"
        )),
        Ok(_) => {}
        Err(e) => output::verbose(&format!("Could not check iOverlay categories: {e}")),
    }

    ctx.config.set_category_enabled(name, enabled);
    ctx.save_config()?;

    let state = if enabled { "Enabled" } else { "Disabled" };
    output::success(&format!("{state} category '{name}'"));
    if !ctx.config.has_enabled_categories() {
        output::warning("No categories are enabled; synchronization will be skipped");
    }
    Ok(())
}
