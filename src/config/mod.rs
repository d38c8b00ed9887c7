pub mod parser;
pub mod validator;

use crate::error::SyncError;
use crate::store::overlay::RESERVED_CATEGORY;
use crate::utils::paths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Smallest accepted backup retention, in days.
pub const MIN_RETENTION_DAYS: u32 = 1;
/// Largest accepted backup retention, in days.
pub const MAX_RETENTION_DAYS: u32 = 30;
/// Retention used when none is configured or the configuration is unreadable.
pub const DEFAULT_RETENTION_DAYS: u32 = 5;
/// Smallest accepted scheduler interval, in hours.
pub const MIN_SCHEDULER_HOURS: u32 = 1;
/// Largest accepted scheduler interval, in hours.
pub const MAX_SCHEDULER_HOURS: u32 = 24;

/// Persisted DriverSync settings.
///
/// Keys are the flat JSON keys of `config.json`. Keys this version does not
/// know about are kept in `extra` and written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ioverlay_settings_path: PathBuf,

    #[serde(default)]
    pub crewchief_reputations_path: PathBuf,

    /// Whether a backup is taken before each mutating run
    #[serde(default = "default_backup_files")]
    pub backup_files: bool,

    #[serde(default = "default_retention_days")]
    pub backup_retention_days: u32,

    /// Only meaningful to desktop front-ends
    #[serde(default)]
    pub minimize_to_tray: bool,

    /// Reserved: matched records are never updated
    #[serde(default)]
    pub update_existing_entries: bool,

    #[serde(default)]
    pub sync_behavior: SyncBehavior,

    /// Hours between automatic runs; `None` disables the scheduler
    #[serde(default)]
    pub scheduler_interval: Option<u32>,

    /// iOverlay category name -> participates in matching
    #[serde(default)]
    pub enabled_categories: BTreeMap<String, bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// How the two sources are reconciled.
///
/// Both behaviours currently run the same add-only algorithm; nothing is
/// ever deleted from either side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SyncBehavior {
    #[default]
    #[serde(rename = "Additive Only")]
    AdditiveOnly,
    #[serde(rename = "Bidirectional")]
    Bidirectional,
}

impl SyncBehavior {
    /// Name as stored in the configuration file.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AdditiveOnly => "Additive Only",
            Self::Bidirectional => "Bidirectional",
        }
    }
}

impl fmt::Display for SyncBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncBehavior {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace(['-', '_'], " ").as_str() {
            "additive only" | "additive" => Ok(Self::AdditiveOnly),
            "bidirectional" => Ok(Self::Bidirectional),
            _ => Err(anyhow::anyhow!(
                "Invalid sync behavior: {s} (expected 'Additive Only' or 'Bidirectional')"
            )),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut enabled_categories = BTreeMap::new();
        enabled_categories.insert(RESERVED_CATEGORY.to_string(), true);
        Self {
            ioverlay_settings_path: PathBuf::new(),
            crewchief_reputations_path: PathBuf::new(),
            backup_files: true,
            backup_retention_days: DEFAULT_RETENTION_DAYS,
            minimize_to_tray: false,
            update_existing_entries: false,
            sync_behavior: SyncBehavior::AdditiveOnly,
            scheduler_interval: None,
            enabled_categories,
            extra: Map::new(),
        }
    }
}

impl Config {
    /// Default configuration with both source paths resolved for this machine.
    #[must_use]
    pub fn with_default_paths() -> Self {
        let mut config = Self::default();
        config.fill_missing_paths();
        config
    }

    /// Load configuration from an existing file.
    ///
    /// Both source path keys must be present. Empty paths are replaced with
    /// the resolved defaults, the reserved category is enabled when absent,
    /// and other missing keys get defaults. If anything had to be filled in,
    /// the file is rewritten.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file does not exist
    /// - `ioverlay_settings_path` or `crewchief_reputations_path` is absent
    /// - The file is not valid JSON or has values of the wrong type
    /// - A value is out of its accepted range
    /// - The normalized configuration cannot be saved
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_checked(path, true)
    }

    /// Load configuration, creating a default one if the file does not exist.
    ///
    /// Unlike [`Config::load`], absent source path keys are filled with the
    /// resolved defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be loaded, or if the
    /// default configuration cannot be written.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load_checked(path, false);
        }
        tracing::info!(path = %path.display(), "Config file not found. Creating with default values");
        let config = Self::with_default_paths();
        config.save(path)?;
        Ok(config)
    }

    fn load_checked(path: &Path, require_paths: bool) -> Result<Self> {
        if !path.exists() {
            return Err(SyncError::Configuration(format!(
                "configuration file not found at {}. Run 'driversync init' to create it.",
                path.display()
            ))
            .into());
        }

        let parser::ParsedConfig {
            mut config,
            missing_keys,
        } = parser::parse_config_file(path)?;

        if require_paths {
            let missing_required: Vec<&str> = missing_keys
                .iter()
                .copied()
                .filter(|key| parser::REQUIRED_KEYS.contains(key))
                .collect();
            if !missing_required.is_empty() {
                return Err(SyncError::Configuration(format!(
                    "{} is missing required key(s): {}. Set them with 'driversync config <key> <path>' \
                     or recreate the file with 'driversync init --force'.",
                    path.display(),
                    missing_required.join(", ")
                ))
                .into());
            }
        }

        let mut updated = !missing_keys.is_empty();
        for key in &missing_keys {
            tracing::info!(key = %key, "Adding missing configuration key with default value");
        }
        updated |= config.normalize();

        if updated {
            config.save(path)?;
            tracing::info!("Configuration updated with default values where necessary");
        }
        Ok(config)
    }

    /// Save configuration to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Cannot create parent directories
    /// - Cannot write to the file
    /// - JSON serialization fails
    pub fn save(&self, path: &Path) -> Result<()> {
        let value = serde_json::to_value(self).context("Failed to serialize configuration")?;
        paths::ensure_parent_dirs(path)?;
        crate::store::write_json(path, Some(&value))
            .with_context(|| format!("Failed to save configuration to {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Fills empty paths and enables the reserved category when it has no
    /// entry. Returns whether anything changed.
    pub fn normalize(&mut self) -> bool {
        let mut changed = self.fill_missing_paths();
        if !self.enabled_categories.contains_key(RESERVED_CATEGORY) {
            self.enabled_categories
                .insert(RESERVED_CATEGORY.to_string(), true);
            changed = true;
        }
        changed
    }

    /// Replaces empty source paths with platform defaults.
    fn fill_missing_paths(&mut self) -> bool {
        let needs_overlay = self.ioverlay_settings_path.as_os_str().is_empty();
        let needs_crewchief = self.crewchief_reputations_path.as_os_str().is_empty();
        if !needs_overlay && !needs_crewchief {
            return false;
        }

        let defaults = paths::default_paths();
        if needs_overlay {
            tracing::warn!(default = %defaults.ioverlay.display(), "ioverlay_settings_path is empty. Using default");
            self.ioverlay_settings_path = defaults.ioverlay;
        }
        if needs_crewchief {
            tracing::warn!(default = %defaults.crewchief.display(), "crewchief_reputations_path is empty. Using default");
            self.crewchief_reputations_path = defaults.crewchief;
        }
        true
    }

    /// Whether at least one category is enabled.
    #[must_use]
    pub fn has_enabled_categories(&self) -> bool {
        self.enabled_categories.values().any(|enabled| *enabled)
    }

    /// Whether the named category is enabled. Unknown names are disabled.
    #[must_use]
    pub fn is_category_enabled(&self, name: &str) -> bool {
        self.enabled_categories.get(name).copied().unwrap_or(false)
    }

    /// Enable or disable a category by name.
    pub fn set_category_enabled(&mut self, name: &str, enabled: bool) {
        self.enabled_categories.insert(name.to_string(), enabled);
    }

    /// Get a configuration value by key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(name) = key.strip_prefix("enabled_categories.") {
            return self.enabled_categories.get(name).map(ToString::to_string);
        }

        match key {
            "ioverlay_settings_path" => Some(self.ioverlay_settings_path.display().to_string()),
            "crewchief_reputations_path" => {
                Some(self.crewchief_reputations_path.display().to_string())
            }
            "backup_files" => Some(self.backup_files.to_string()),
            "backup_retention_days" => Some(self.backup_retention_days.to_string()),
            "minimize_to_tray" => Some(self.minimize_to_tray.to_string()),
            "update_existing_entries" => Some(self.update_existing_entries.to_string()),
            "sync_behavior" => Some(self.sync_behavior.to_string()),
            "scheduler_interval" => self.scheduler_interval.map(|h| h.to_string()),
            _ => None,
        }
    }

    /// Set a configuration value by key
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The key is unknown
    /// - The value is invalid for the key (e.g., out of range)
    pub fn set(&mut self, key: &str, value: String) -> Result<()> {
        if let Some(name) = key.strip_prefix("enabled_categories.") {
            if name.is_empty() {
                return Err(anyhow::anyhow!("Category name cannot be empty"));
            }
            let enabled = parse_bool(&value)?;
            self.set_category_enabled(name, enabled);
            return Ok(());
        }

        match key {
            "ioverlay_settings_path" => {
                self.ioverlay_settings_path = crate::utils::expand_tilde(&value)?;
            }
            "crewchief_reputations_path" => {
                self.crewchief_reputations_path = crate::utils::expand_tilde(&value)?;
            }
            "backup_files" => self.backup_files = parse_bool(&value)?,
            "backup_retention_days" => {
                let days: u32 = value
                    .parse()
                    .with_context(|| format!("Invalid number: {value}"))?;
                if !(MIN_RETENTION_DAYS..=MAX_RETENTION_DAYS).contains(&days) {
                    return Err(anyhow::anyhow!(
                        "Backup retention must be between {MIN_RETENTION_DAYS} and {MAX_RETENTION_DAYS} days"
                    ));
                }
                self.backup_retention_days = days;
            }
            "minimize_to_tray" => self.minimize_to_tray = parse_bool(&value)?,
            "update_existing_entries" => self.update_existing_entries = parse_bool(&value)?,
            "sync_behavior" => self.sync_behavior = value.parse()?,
            "scheduler_interval" => {
                let hours: u32 = value
                    .parse()
                    .with_context(|| format!("Invalid number: {value}"))?;
                if !(MIN_SCHEDULER_HOURS..=MAX_SCHEDULER_HOURS).contains(&hours) {
                    return Err(anyhow::anyhow!(
                        "Scheduler interval must be between {MIN_SCHEDULER_HOURS} and {MAX_SCHEDULER_HOURS} hours"
                    ));
                }
                self.scheduler_interval = Some(hours);
            }
            _ => return Err(anyhow::anyhow!("Unknown configuration key: {key}")),
        }
        Ok(())
    }

    /// Unset a configuration value by key
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or cannot be unset
    pub fn unset(&mut self, key: &str) -> Result<()> {
        if let Some(name) = key.strip_prefix("enabled_categories.") {
            if self.enabled_categories.remove(name).is_none() {
                return Err(anyhow::anyhow!("Category '{name}' is not configured"));
            }
            return Ok(());
        }

        match key {
            "scheduler_interval" => self.scheduler_interval = None,
            _ => return Err(anyhow::anyhow!("Cannot unset configuration key: {key}")),
        }
        Ok(())
    }
}

/// Parses the boolean spellings accepted on the command line.
fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(anyhow::anyhow!("Invalid boolean: {value}")),
    }
}

const fn default_backup_files() -> bool {
    true
}

const fn default_retention_days() -> u32 {
    DEFAULT_RETENTION_DAYS
}
