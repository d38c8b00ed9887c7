use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// iOverlay settings file relative to the roaming application data folder.
pub const IOVERLAY_SUBPATH: &str = "iOverlay/settings.dat";

/// CrewChief reputations file relative to a documents folder.
pub const CREWCHIEF_SUBPATH: &str = "CrewChiefV4/iracing_reputations.json";

/// Default locations of the two source documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultPaths {
    /// iOverlay `settings.dat`
    pub ioverlay: PathBuf,
    /// CrewChief `iracing_reputations.json`
    pub crewchief: PathBuf,
}

/// The environment the default locations are derived from.
#[derive(Debug, Clone, Default)]
pub struct PathEnv {
    /// User profile (home) directory
    pub profile: PathBuf,
    /// Root of the cloud-synced folder, when the user has one
    pub onedrive: Option<PathBuf>,
    /// Roaming application data folder; `<profile>/AppData/Roaming` when unset
    pub roaming: Option<PathBuf>,
}

impl PathEnv {
    /// Reads the environment of the current process.
    ///
    /// `USERPROFILE` wins over the platform home directory so the Windows
    /// layout is reproduced exactly; `OneDrive` names the cloud folder.
    #[must_use]
    pub fn from_process() -> Self {
        let profile = std::env::var_os("USERPROFILE")
            .map(PathBuf::from)
            .or_else(dirs::home_dir)
            .unwrap_or_default();
        let onedrive = std::env::var_os("OneDrive")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let roaming = if cfg!(windows) {
            dirs::config_dir()
        } else {
            None
        };
        Self {
            profile,
            onedrive,
            roaming,
        }
    }
}

/// Default source locations for the current process environment.
#[must_use]
pub fn default_paths() -> DefaultPaths {
    resolve_default_paths(&PathEnv::from_process())
}

/// Computes default source locations from `env`.
///
/// The documents folder is chosen in order: a documents folder inside the
/// cloud-synced root, the profile's `Documents`, and finally the profile's
/// `Documents` path even when it does not exist yet.
#[must_use]
pub fn resolve_default_paths(env: &PathEnv) -> DefaultPaths {
    let roaming = env
        .roaming
        .clone()
        .unwrap_or_else(|| env.profile.join("AppData").join("Roaming"));
    let ioverlay = roaming.join(IOVERLAY_SUBPATH);

    let local_documents = env.profile.join("Documents");
    let documents = env
        .onedrive
        .as_deref()
        .and_then(find_documents_dir)
        .or_else(|| local_documents.is_dir().then(|| local_documents.clone()))
        .unwrap_or(local_documents);

    let crewchief = documents.join(CREWCHIEF_SUBPATH);
    tracing::debug!(
        ioverlay = %ioverlay.display(),
        crewchief = %crewchief.display(),
        "Resolved default source paths"
    );
    DefaultPaths {
        ioverlay,
        crewchief,
    }
}

/// Finds a child directory of `root` whose name contains "document",
/// matching localized names such as `Documents` or `Dokumente`.
fn find_documents_dir(root: &Path) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = fs::read_dir(root)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .to_lowercase()
                .contains("document")
        })
        .map(|entry| entry.path())
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

/// Ensures parent directories exist for a given path
///
/// # Errors
///
/// Returns an error if the parent directories cannot be created
pub fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create parent directories for {}", path.display())
        })?;
    }
    Ok(())
}

/// Makes a path absolute, resolving relative paths from current directory
///
/// # Errors
///
/// Returns an error if the current directory cannot be determined
pub fn make_absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        let current_dir = std::env::current_dir()?;
        Ok(current_dir.join(path))
    }
}
