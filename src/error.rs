//! Error taxonomy for synchronization and its collaborators.
//!
//! Every failure inside the engine is converted into a [`SyncError`] at the
//! engine boundary and reported through a [`crate::engine::SyncReport`]
//! instead of being propagated to the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, validating, reconciling or writing sources.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration file missing, malformed or missing required keys.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A source document failed structural validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A configured path does not exist on disk.
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A document is not valid JSON, or not of the expected shape.
    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        /// File being parsed.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A document could not be serialized.
    #[error("Failed to encode {}: {source}", path.display())]
    Encode {
        /// File being written.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A CSV file could not be read or written.
    #[error("CSV error on {}: {source}", path.display())]
    Csv {
        /// File being read or written.
        path: PathBuf,
        /// Underlying CSV error.
        #[source]
        source: csv::Error,
    },

    /// Filesystem error while reading or writing.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Another synchronization holds the lock for the same pair of files.
    #[error("{0}")]
    Locked(String),

    /// No iOverlay category is enabled; nothing to synchronize.
    #[error("No iOverlay categories are selected. Synchronization skipped.")]
    NoCategoriesEnabled,

    /// The write phase failed and restoring the original documents failed
    /// too, so the pair may be half synchronized.
    #[error("{write}; restoring the original files also failed: {rollback}")]
    RollbackFailed {
        /// Error that interrupted the write phase.
        write: Box<SyncError>,
        /// Error raised while restoring.
        rollback: Box<SyncError>,
    },

    /// Creating a backup archive failed.
    #[error("Error creating backup zip: {0}")]
    Backup(String),
}

impl SyncError {
    /// Builds an [`SyncError::Io`] for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this is the "no categories enabled" guard, which callers
    /// should present as a warning rather than an error.
    #[must_use]
    pub const fn is_policy_guard(&self) -> bool {
        matches!(self, Self::NoCategoriesEnabled)
    }

    /// Short label for the error class.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not-found",
            Self::Parse { .. } => "parse",
            Self::Encode { .. } => "encode",
            Self::Csv { .. } => "csv",
            Self::Io { .. } => "io",
            Self::Locked(_) => "locked",
            Self::NoCategoriesEnabled => "no-categories",
            Self::RollbackFailed { .. } => "rollback",
            Self::Backup(_) => "backup",
        }
    }
}
