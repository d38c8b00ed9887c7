use crate::SyncContext;
use crate::config::Config;
use crate::output;
use crate::utils::paths;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Create the configuration file
///
/// Paths not given on the command line are resolved from the usual
/// Documents locations.
///
/// # Errors
///
/// Returns an error if:
/// - A configuration already exists and `force` is not set
/// - The configuration or data directories cannot be created
pub fn execute(ioverlay: Option<PathBuf>, crewchief: Option<PathBuf>, force: bool) -> Result<()> {
    let config_path = SyncContext::default_config_path()?;
    let data_dir = SyncContext::default_data_dir()?;
    init_at(&config_path, &data_dir, ioverlay, crewchief, force)
}

/// [`execute`] with explicit locations.
///
/// # Errors
///
/// See [`execute`].
pub fn init_at(
    config_path: &Path,
    data_dir: &Path,
    ioverlay: Option<PathBuf>,
    crewchief: Option<PathBuf>,
    force: bool,
) -> Result<()> {
    if config_path.exists() && !force {
        return Err(anyhow::anyhow!(
            "Configuration already exists at {} (use --force to overwrite)",
            config_path.display()
        ));
    }

    let mut config = Config::default();
    if let Some(path) = ioverlay {
        config.ioverlay_settings_path = paths::make_absolute(&path)?;
    }
    if let Some(path) = crewchief {
        config.crewchief_reputations_path = paths::make_absolute(&path)?;
    }
    config.normalize();
    config
        .save(config_path)
        .context("Failed to save default configuration")?;

    let ctx = SyncContext {
        config_path: config_path.to_path_buf(),
        data_dir: data_dir.to_path_buf(),
        config,
    };
    ctx.ensure_data_dirs()?;

    output::success(&format!(
        "Created configuration at {}",
        config_path.display()
    ));
    for (label, path) in [
        ("iOverlay", ctx.overlay_path()),
        ("CrewChief", ctx.reputations_path()),
    ] {
        let state = if path.exists() {
            "found".green()
        } else {
            "missing".yellow()
        };
        output::print(&format!("  {label:<9} {} ({state})", path.display()));
    }

    output::print(&format!("\n{}", "Next steps:".bold()));
    output::print("  driversync categories              # See iOverlay categories");
    output::print("  driversync categories enable NAME  # Choose what to share with CrewChief");
    output::print("  driversync sync --preview          # Check what would change");
    output::print("  driversync sync                    # Synchronize");
    Ok(())
}
