use crate::SyncContext;
use crate::config::parser::EXPECTED_KEYS;
use crate::output;
use anyhow::Result;
use colored::Colorize;

/// Execute config command to get/set configuration values
///
/// Category flags are addressed as `enabled_categories.<name>`.
///
/// # Errors
///
/// Returns an error if:
/// - Failed to set or unset configuration value
/// - Failed to save configuration
pub fn execute(
    ctx: &mut SyncContext,
    key: Option<&str>,
    value: Option<String>,
    unset: bool,
    list: bool,
) -> Result<()> {
    // If --list flag is set or no key is provided, show all configuration
    if list || key.is_none() {
        show_all_config(ctx);
        return Ok(());
    }

    let key =
        key.ok_or_else(|| anyhow::anyhow!("Key must be provided when not using --list flag"))?;

    if unset {
        ctx.config.unset(key)?;
        ctx.save_config()?;
        output::success(&format!("Unset {key}"));
    } else if let Some(val) = value {
        ctx.config.set(key, val.clone())?;
        ctx.save_config()?;
        output::success(&format!("Set {key} = {val}"));
    } else if let Some(val) = ctx.config.get(key) {
        output::print(&val);
    } else {
        output::warning(&format!("Configuration key '{key}' is not set"));
    }

    Ok(())
}

/// Show all configuration values
fn show_all_config(ctx: &SyncContext) {
    output::print(&format!("{}", format!("# {}", ctx.config_path.display()).dimmed()));
    for key in EXPECTED_KEYS {
        if *key == "enabled_categories" {
            continue;
        }
        let value = ctx.config.get(key).unwrap_or_else(|| "null".to_string());
        output::print(&format!("{key} = {value}"));
    }

    output::print(&format!("\n{}", "[enabled_categories]".bold()));
    if ctx.config.enabled_categories.is_empty() {
        output::print("  (none)");
    }
    for (name, enabled) in &ctx.config.enabled_categories {
        output::print(&format!("  {name} = {enabled}"));
    }

    if !ctx.config.extra.is_empty() {
        output::print(&format!("\n{}", "[unrecognized]".bold()));
        for (key, value) in &ctx.config.extra {
            output::print(&format!("  {key} = {value}"));
        }
    }
}
