use super::parser::{EXPECTED_KEYS, REQUIRED_KEYS};
use super::{MAX_RETENTION_DAYS, MAX_SCHEDULER_HOURS, MIN_RETENTION_DAYS, MIN_SCHEDULER_HOURS};
use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;

/// Checks a configuration file for keys and values that will not behave as
/// the user expects.
pub struct ConfigValidator {
    /// Keys recognized by driversync
    known_fields: HashSet<&'static str>,
    /// Keys accepted for compatibility that have no effect
    deprecated_fields: HashSet<&'static str>,
    /// Keys without which no synchronization can run
    required_fields: HashSet<&'static str>,
}

/// Findings from one validation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Problems that make the file unusable as-is.
    pub errors: Vec<String>,
    /// Suspicious but tolerated content.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// True when neither errors nor warnings were found.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

impl ConfigValidator {
    /// Create a new validator with known configuration fields
    #[must_use]
    pub fn new() -> Self {
        let known_fields = EXPECTED_KEYS.iter().copied().collect();

        let mut deprecated_fields = HashSet::new();
        deprecated_fields.insert("minimize_to_tray");
        deprecated_fields.insert("update_existing_entries");

        let required_fields = REQUIRED_KEYS.iter().copied().collect();

        Self {
            known_fields,
            deprecated_fields,
            required_fields,
        }
    }

    /// Validate a configuration file and print warnings about issues
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub fn validate_config_file(&self, config_path: &Path) -> Result<()> {
        if !config_path.exists() {
            return Ok(());
        }

        let report = self.inspect_file(config_path)?;
        let mut lines = report.errors;
        lines.extend(report.warnings);

        if !lines.is_empty() {
            eprintln!("{}", "Configuration warnings:".yellow().bold());
            for line in lines {
                eprintln!("  {line}");
            }
            eprintln!();
        }

        Ok(())
    }

    /// Inspect a configuration file without printing anything
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or is not JSON
    pub fn inspect_file(&self, config_path: &Path) -> Result<ValidationReport> {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let parsed: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;
        Ok(self.inspect(&parsed))
    }

    /// Inspect an already parsed configuration document
    #[must_use]
    pub fn inspect(&self, document: &Value) -> ValidationReport {
        let mut report = ValidationReport::default();
        let Value::Object(map) = document else {
            report
                .errors
                .push("Configuration must be a JSON object".to_string());
            return report;
        };

        self.check_required(map, &mut report);
        self.check_fields(map, &mut report);
        Self::check_ranges(map, &mut report);
        Self::check_categories(map.get("enabled_categories"), &mut report);
        report
    }

    /// Required path keys must be present and non-empty strings
    fn check_required(&self, map: &Map<String, Value>, report: &mut ValidationReport) {
        let mut required: Vec<_> = self.required_fields.iter().copied().collect();
        required.sort_unstable();
        for key in required {
            match map.get(key) {
                None => report
                    .errors
                    .push(format!("Missing required field: {}", key.yellow())),
                Some(Value::String(s)) if s.trim().is_empty() => report.warnings.push(format!(
                    "Field {} is empty; the default location will be used",
                    key.yellow()
                )),
                Some(Value::String(_)) => {}
                Some(_) => report
                    .errors
                    .push(format!("Field {} must be a path string", key.yellow())),
            }
        }
    }

    /// Flags unknown and deprecated keys
    fn check_fields(&self, map: &Map<String, Value>, report: &mut ValidationReport) {
        for key in map.keys() {
            if !self.known_fields.contains(key.as_str()) {
                report
                    .warnings
                    .push(format!("Unknown configuration field: {}", key.yellow()));
                continue;
            }

            if self.deprecated_fields.contains(key.as_str()) {
                let suggestion = match key.as_str() {
                    "minimize_to_tray" => {
                        "This field only applies to desktop front-ends and is ignored by the CLI."
                    }
                    "update_existing_entries" => {
                        "This field is reserved; existing entries are never modified."
                    }
                    _ => "This field has no effect.",
                };
                if map.get(key) == Some(&Value::Bool(true)) {
                    report.warnings.push(format!(
                        "Field '{}': {}",
                        key.yellow(),
                        suggestion.dimmed()
                    ));
                }
            }
        }
    }

    /// Numeric settings must fall inside their accepted ranges
    fn check_ranges(map: &Map<String, Value>, report: &mut ValidationReport) {
        if let Some(value) = map.get("backup_retention_days") {
            match value.as_u64() {
                Some(days)
                    if (u64::from(MIN_RETENTION_DAYS)..=u64::from(MAX_RETENTION_DAYS))
                        .contains(&days) => {}
                _ => report.errors.push(format!(
                    "{} must be an integer between {MIN_RETENTION_DAYS} and {MAX_RETENTION_DAYS}",
                    "backup_retention_days".yellow()
                )),
            }
        }

        match map.get("scheduler_interval") {
            None | Some(Value::Null) => {}
            Some(value) => match value.as_u64() {
                Some(hours)
                    if (u64::from(MIN_SCHEDULER_HOURS)..=u64::from(MAX_SCHEDULER_HOURS))
                        .contains(&hours) => {}
                _ => report.errors.push(format!(
                    "{} must be null or an integer between {MIN_SCHEDULER_HOURS} and {MAX_SCHEDULER_HOURS}",
                    "scheduler_interval".yellow()
                )),
            },
        }
    }

    /// `enabled_categories` must map names to booleans with at least one enabled
    fn check_categories(categories: Option<&Value>, report: &mut ValidationReport) {
        let Some(categories) = categories else {
            return;
        };
        let Value::Object(map) = categories else {
            report.errors.push(format!(
                "{} must be an object of name -> bool",
                "enabled_categories".yellow()
            ));
            return;
        };

        let mut any_enabled = false;
        for (name, enabled) in map {
            match enabled {
                Value::Bool(flag) => any_enabled |= *flag,
                _ => report.errors.push(format!(
                    "Category {} must be true or false",
                    name.yellow()
                )),
            }
        }
        if !any_enabled {
            report.warnings.push(
                "No categories are enabled; synchronization will be skipped".to_string(),
            );
        }
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}
