use super::{
    Config, MAX_RETENTION_DAYS, MAX_SCHEDULER_HOURS, MIN_RETENTION_DAYS, MIN_SCHEDULER_HOURS,
};
use crate::error::SyncError;
use anyhow::Result;
use serde_json::Value;
use std::path::Path;

/// Keys every configuration file is expected to carry.
pub const EXPECTED_KEYS: &[&str] = &[
    "ioverlay_settings_path",
    "crewchief_reputations_path",
    "backup_files",
    "backup_retention_days",
    "minimize_to_tray",
    "update_existing_entries",
    "sync_behavior",
    "scheduler_interval",
    "enabled_categories",
];

/// Keys a configuration file must carry to be loaded strictly.
pub const REQUIRED_KEYS: &[&str] = &["ioverlay_settings_path", "crewchief_reputations_path"];

/// A parsed configuration plus the expected keys the file did not contain.
#[derive(Debug)]
pub struct ParsedConfig {
    pub config: Config,
    pub missing_keys: Vec<&'static str>,
}

pub fn parse_config_file(path: &Path) -> Result<ParsedConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SyncError::io(path, e))?;
    parse_config_str(&content).map_err(|e| {
        SyncError::Configuration(format!("{}: {e}", path.display())).into()
    })
}

pub fn parse_config_str(content: &str) -> Result<ParsedConfig> {
    let raw: Value = serde_json::from_str(content)
        .map_err(|e| anyhow::anyhow!("Failed to parse JSON config: {e}"))?;

    let Value::Object(map) = &raw else {
        anyhow::bail!("Configuration must be a JSON object");
    };
    let missing_keys = EXPECTED_KEYS
        .iter()
        .copied()
        .filter(|key| !map.contains_key(*key))
        .collect();

    let config: Config = serde_json::from_value(raw)
        .map_err(|e| anyhow::anyhow!("Invalid configuration value: {e}"))?;

    validate_config(&config)?;
    Ok(ParsedConfig {
        config,
        missing_keys,
    })
}

fn validate_config(config: &Config) -> Result<()> {
    if !(MIN_RETENTION_DAYS..=MAX_RETENTION_DAYS).contains(&config.backup_retention_days) {
        anyhow::bail!(
            "Backup retention must be between {MIN_RETENTION_DAYS} and {MAX_RETENTION_DAYS} days"
        );
    }

    if let Some(hours) = config.scheduler_interval {
        if !(MIN_SCHEDULER_HOURS..=MAX_SCHEDULER_HOURS).contains(&hours) {
            anyhow::bail!(
                "Scheduler interval must be between {MIN_SCHEDULER_HOURS} and {MAX_SCHEDULER_HOURS} hours"
            );
        }
    }

    if config.enabled_categories.keys().any(String::is_empty) {
        anyhow::bail!("Category names in enabled_categories cannot be empty");
    }

    Ok(())
}
