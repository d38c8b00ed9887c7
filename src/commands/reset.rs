use crate::output;
use anyhow::{Context, Result};
use std::path::Path;

/// Delete the configuration file
///
/// A missing file is not an error.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be removed
pub fn execute(config_path: &Path) -> Result<()> {
    output::info("Resetting configuration...");
    match std::fs::remove_file(config_path) {
        Ok(()) => {
            tracing::info!(path = %config_path.display(), "Configuration deleted");
            output::success(&format!(
                "Configuration reset successfully ({} deleted).",
                config_path.display()
            ));
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            output::info("Configuration file not found. No reset needed.");
        }
        Err(e) => {
            return Err(e).with_context(|| {
                format!("Failed to delete configuration: {}", config_path.display())
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reset_deletes_file() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("config.json");
        std::fs::write(&path, "{}")?;
        execute(&path)?;
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn test_reset_missing_file_is_ok() -> Result<()> {
        let temp = TempDir::new()?;
        execute(&temp.path().join("config.json"))
    }
}
