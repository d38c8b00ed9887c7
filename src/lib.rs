#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]
#![allow(clippy::arithmetic_side_effects)] // Counters over in-memory lists cannot overflow

//! # DriverSync - iOverlay / CrewChief driver list reconciliation
//!
//! DriverSync keeps two driver lists maintained by unrelated sim-racing tools
//! consistent:
//!
//! - **iOverlay** `settings.dat`: a JSON document with tag categories and
//!   tagged drivers under `modules.drivertagging`.
//! - **CrewChief** `iracing_reputations.json`: a flat JSON array of driver
//!   reputation records.
//!
//! Drivers in user-enabled iOverlay categories are mirrored into CrewChief,
//! and every CrewChief driver is mirrored back into iOverlay under the
//! reserved `CrewChief` category. Both files are keyed by the iRacing
//! customer id.
//!
//! ## Architecture
//!
//! - [`config`]: JSON configuration file, defaults and validation
//! - [`store`]: typed reading, validation and atomic writing of both sources
//! - [`engine`]: the reconciliation engine and its pure planning step
//! - [`backup`]: timestamped zip backups with retention pruning
//! - [`analytics`]: append-only history of completed synchronizations
//! - [`scheduler`]: periodic runner for unattended synchronization
//! - [`commands`]: CLI command implementations
//!
//! ## Example Usage
//!
//! ```no_run
//! use driversync::SyncContext;
//! use driversync::commands::context::CommandContext;
//!
//! # fn main() -> anyhow::Result<()> {
//! let ctx = SyncContext::new()?;
//! let report = ctx.create_engine().synchronize(true);
//! for item in &report.preview {
//!     println!("{}", item.details());
//! }
//! # Ok(())
//! # }
//! ```

/// Synchronization history recording and aggregation.
pub mod analytics;

/// Timestamped zip backups of the source files.
pub mod backup;

/// Command-line interface definitions (argument parsing structures).
pub mod cli;

/// Commands module containing all CLI command implementations.
pub mod commands;

/// Configuration parsing, validation, and management.
pub mod config;

/// The reconciliation engine.
pub mod engine;

/// Error taxonomy shared by the engine and its collaborators.
pub mod error;

/// Structured events emitted by the engine.
pub mod events;

/// Locking so only one synchronization runs per pair of source files.
pub mod lock;

/// Tracing subscriber setup for the binary.
pub mod logging;

/// Output formatting for the CLI.
pub mod output;

/// Periodic synchronization runner.
pub mod scheduler;

/// Source document access: reading, validation and writing.
pub mod store;

/// Rollback guard for the two-file write phase.
pub mod transaction;

/// Utility functions and helpers.
pub mod utils;

pub use error::SyncError;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Current version of the driversync binary.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Configuration file path relative to the user configuration directory.
pub const DEFAULT_CONFIG_PATH: &str = "driversync/config.json";

/// Data directory name relative to the user's local data directory.
pub const DEFAULT_DATA_DIR: &str = "driversync";

/// Directory (inside the data directory) holding backup archives.
pub const BACKUP_DIR: &str = "backups";

/// Directory (inside the data directory) holding log files.
pub const LOGS_DIR: &str = "logs";

/// Directory (inside the data directory) holding lock files.
pub const LOCKS_DIR: &str = "locks";

/// Name of the analytics history file inside the data directory.
pub const ANALYTICS_FILE: &str = "analytics.json";

/// Central context for all DriverSync operations.
///
/// Holds the configuration file location, the loaded configuration and the
/// data directory where backups, logs, locks and analytics live.
///
/// # Examples
///
/// ```no_run
/// use driversync::SyncContext;
///
/// # fn main() -> anyhow::Result<()> {
/// // Default locations (honours DRIVERSYNC_CONFIG_PATH / DRIVERSYNC_DATA_DIR)
/// let ctx = SyncContext::new()?;
///
/// // Explicit locations (for testing)
/// let ctx = SyncContext::new_explicit(
///     "/tmp/driversync/config.json".into(),
///     "/tmp/driversync/data".into(),
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SyncContext {
    /// Path to the configuration file.
    pub config_path: PathBuf,

    /// Directory holding backups, logs, locks and analytics.
    pub data_dir: PathBuf,

    /// Loaded configuration settings.
    pub config: config::Config,
}

impl SyncContext {
    /// Creates a new `SyncContext` by loading the configuration from the default path.
    ///
    /// # Errors
    /// Returns an error if the configuration or data directory cannot be determined,
    /// or if the configuration file cannot be read, parsed or created.
    pub fn new() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        let data_dir = Self::default_data_dir()?;

        let config = config::Config::load(&config_path)?;

        let validator = config::validator::ConfigValidator::new();
        if let Err(e) = validator.validate_config_file(&config_path) {
            output::warning(&format!("Configuration validation failed: {e}"));
        }

        Ok(Self {
            config_path,
            data_dir,
            config,
        })
    }

    /// Creates a `SyncContext` with explicit paths.
    ///
    /// A missing configuration file is created with defaults.
    ///
    /// # Errors
    /// Returns an error if the configuration cannot be loaded or created.
    pub fn new_explicit(config_path: PathBuf, data_dir: PathBuf) -> Result<Self> {
        let config = config::Config::load_or_create(&config_path)?;
        Ok(Self {
            config_path,
            data_dir,
            config,
        })
    }

    /// Resolves the configuration file path, honouring `DRIVERSYNC_CONFIG_PATH`.
    ///
    /// # Errors
    /// Returns an error if the user configuration directory cannot be determined.
    pub fn default_config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("DRIVERSYNC_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }
        let base = dirs::config_dir().context("Could not find configuration directory")?;
        Ok(base.join(DEFAULT_CONFIG_PATH))
    }

    /// Resolves the data directory, honouring `DRIVERSYNC_DATA_DIR`.
    ///
    /// # Errors
    /// Returns an error if the user data directory cannot be determined.
    pub fn default_data_dir() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("DRIVERSYNC_DATA_DIR") {
            return Ok(PathBuf::from(path));
        }
        let base = dirs::data_local_dir().context("Could not find data directory")?;
        Ok(base.join(DEFAULT_DATA_DIR))
    }

    /// Path to the iOverlay `settings.dat` document.
    #[must_use]
    pub fn overlay_path(&self) -> &Path {
        &self.config.ioverlay_settings_path
    }

    /// Path to the CrewChief reputations document.
    #[must_use]
    pub fn reputations_path(&self) -> &Path {
        &self.config.crewchief_reputations_path
    }

    /// Directory holding backup archives.
    #[must_use]
    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join(BACKUP_DIR)
    }

    /// Directory holding log files.
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join(LOGS_DIR)
    }

    /// Directory holding lock files.
    #[must_use]
    pub fn locks_dir(&self) -> PathBuf {
        self.data_dir.join(LOCKS_DIR)
    }

    /// Path to the analytics history file.
    #[must_use]
    pub fn analytics_path(&self) -> PathBuf {
        self.data_dir.join(ANALYTICS_FILE)
    }

    /// Persists the in-memory configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration file cannot be written.
    pub fn save_config(&self) -> Result<()> {
        self.config.save(&self.config_path)
    }

    /// Ensures that the data directory and its subdirectories exist.
    ///
    /// # Errors
    /// Returns an error if the directories cannot be created.
    pub fn ensure_data_dirs(&self) -> Result<()> {
        for dir in [self.backup_dir(), self.logs_dir(), self.locks_dir()] {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }

    /// Checks that both source files are usable, creating an empty CrewChief
    /// file when only the file (not its folder) is missing.
    ///
    /// # Errors
    /// Returns an error if the iOverlay file does not exist or the CrewChief
    /// file is missing and cannot be created.
    pub fn check_sources(&self) -> Result<()> {
        if !self.overlay_path().exists() {
            return Err(SyncError::NotFound(self.overlay_path().to_path_buf())).context(
                "iOverlay settings.dat not found; set 'ioverlay_settings_path' with 'driversync config'",
            );
        }
        if store::ensure_reputations_file(self.reputations_path())? {
            output::info(&format!(
                "Created empty CrewChief reputations file at {}",
                self.reputations_path().display()
            ));
        }
        Ok(())
    }
}
