//! Command-line interface definitions for driversync.
//!
//! This module contains all CLI argument parsing structures using clap's derive macros.
//! The CLI definitions are shared between the main binary and build tools (like xtask)
//! for man page generation.
//!
//! Note: Field-level documentation is provided via clap attributes (#[arg(help = "...")]),
//! so we allow missing_docs for this module to avoid redundant documentation.

#![allow(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Main CLI structure for driversync.
#[derive(Parser)]
#[command(
    name = "driversync",
    version = crate::VERSION,
    about = "Keeps iOverlay driver tags and CrewChief reputations in sync",
    long_about = "Reconciles the iOverlay settings.dat driver tags with the CrewChief \
                  iracing_reputations.json list. Drivers are only ever added, never removed."
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress informational messages
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// All available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Synchronize both driver lists
    Sync {
        /// Show what would be added without writing anything
        #[arg(short = 'n', long, alias = "dry-run")]
        preview: bool,
    },

    /// Back up both source files into a timestamped zip archive
    Backup {
        /// List existing backups instead of creating one
        #[arg(short, long)]
        list: bool,
    },

    /// Validate configuration and both source files
    Check {
        /// Remove duplicate drivers, keeping the first occurrence
        #[arg(long)]
        fix_duplicates: bool,
    },

    /// Write the iOverlay driver list to a CSV file
    Export {
        /// Destination file, or '-' for stdout
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Only export drivers in this category
        #[arg(short, long, value_name = "NAME")]
        category: Option<String>,
    },

    /// Add drivers from a CSV file (identifier,name,tagId) to iOverlay
    Import {
        /// CSV file to read
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Show what would be added without writing anything
        #[arg(short = 'n', long, alias = "dry-run")]
        preview: bool,
    },

    /// List iOverlay categories or choose which ones are synchronized
    Categories {
        #[command(subcommand)]
        action: Option<CategoryAction>,
    },

    /// Show the synchronization history
    Analytics {
        /// Delete the recorded history
        #[arg(long)]
        reset: bool,
    },

    /// Get and set configuration options
    Config {
        /// Configuration key
        key: Option<String>,

        /// Configuration value to set
        value: Option<String>,

        /// Unset the configuration key
        #[arg(long)]
        unset: bool,

        /// List all configuration values
        #[arg(short, long)]
        list: bool,
    },

    /// Create the configuration file
    Init {
        /// Path to iOverlay settings.dat
        #[arg(long, value_name = "PATH")]
        ioverlay: Option<PathBuf>,

        /// Path to CrewChief iracing_reputations.json
        #[arg(long, value_name = "PATH")]
        crewchief: Option<PathBuf>,

        /// Overwrite an existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Synchronize periodically
    RunScheduled {
        /// Hours between runs (1-24); defaults to scheduler_interval
        #[arg(short, long, value_name = "HOURS")]
        interval: Option<u32>,

        /// Detach and keep running in the background
        #[arg(short, long)]
        background: bool,
    },

    /// Delete the configuration file
    ResetConfig,

    /// Show version and project information
    About,

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Category subcommands.
#[derive(Subcommand)]
pub enum CategoryAction {
    /// List categories with their enabled state (default)
    List,

    /// Include a category in synchronization
    Enable {
        /// Category name (case-sensitive)
        name: String,
    },

    /// Exclude a category from synchronization
    Disable {
        /// Category name (case-sensitive)
        name: String,
    },
}
