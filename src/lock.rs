//! Per file-pair locking so only one synchronization touches the same two
//! documents at a time.
//!
//! The lock file name is derived from both source paths, so runs against
//! different file pairs never block each other. Locks are released when
//! dropped.

use crate::error::SyncError;
use fs4::fs_std::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use xxhash_rust::xxh3::xxh3_64;

/// Holds an exclusive lock on one (iOverlay, CrewChief) file pair
///
/// The lock is automatically released when this struct is dropped.
#[derive(Debug)]
pub struct SyncLock {
    /// Lock file handle
    lock_file: File,
    /// Path to the lock file (for error messages)
    lock_path: PathBuf,
}

impl SyncLock {
    /// Acquire the lock for the pair `overlay` / `reputations`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Cannot create locks directory ([`SyncError::Io`])
    /// - Another synchronization holds the lock past the timeout
    ///   ([`SyncError::Locked`])
    pub fn acquire(locks_dir: &Path, overlay: &Path, reputations: &Path) -> Result<Self, SyncError> {
        fs::create_dir_all(locks_dir).map_err(|e| SyncError::io(locks_dir, e))?;

        Self::cleanup_stale_locks(locks_dir);

        let lock_path = locks_dir.join(lock_file_name(overlay, reputations));
        let lock_file = Self::try_acquire_lock(&lock_path, overlay, reputations)?;
        tracing::debug!(lock = %lock_path.display(), "Synchronization lock acquired");

        Ok(Self {
            lock_file,
            lock_path,
        })
    }

    /// Path of the held lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.lock_path
    }

    /// Try to acquire the lock file
    fn try_acquire_lock(lock_path: &Path, overlay: &Path, reputations: &Path) -> Result<File, SyncError> {
        // Use shorter timeouts in test mode for faster test execution
        let lock_timeout = if cfg!(test) {
            Duration::from_millis(100)
        } else {
            Duration::from_secs(10)
        };
        let retry_interval = if cfg!(test) {
            Duration::from_millis(10)
        } else {
            Duration::from_millis(100)
        };

        let start = Instant::now();

        loop {
            let file = File::create(lock_path).map_err(|e| SyncError::io(lock_path, e))?;

            match file.try_lock_exclusive() {
                Ok(true) => {
                    // Debug info for whoever finds a leftover lock
                    use std::io::Write;
                    let mut file_ref = &file;
                    let _ = writeln!(
                        file_ref,
                        "ioverlay={}\ncrewchief={}\npid={}\ntime={}",
                        overlay.display(),
                        reputations.display(),
                        std::process::id(),
                        humantime::format_rfc3339(SystemTime::now())
                    );
                    return Ok(file);
                }
                Ok(false) | Err(_) if start.elapsed() < lock_timeout => {
                    std::thread::sleep(retry_interval);
                }
                Ok(false) | Err(_) => {
                    return Err(SyncError::Locked(format!(
                        "Another synchronization of these files is already in progress. \
                         Please wait for it to complete or remove stale lock at: {}",
                        lock_path.display()
                    )));
                }
            }
        }
    }

    /// Clean up stale lock files (older than 5 minutes)
    ///
    /// This handles cases where a process crashed without releasing its lock.
    fn cleanup_stale_locks(locks_dir: &Path) {
        const STALE_THRESHOLD: Duration = Duration::from_secs(300);

        let Ok(entries) = fs::read_dir(locks_dir) else {
            return;
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "lock") {
                continue;
            }

            if let Ok(metadata) = entry.metadata()
                && let Ok(modified) = metadata.modified()
                && let Ok(elapsed) = modified.elapsed()
                && elapsed > STALE_THRESHOLD
            {
                match fs::remove_file(&path) {
                    Ok(()) => tracing::info!(lock = %path.display(), "Removed stale lock"),
                    Err(e) => {
                        tracing::warn!(lock = %path.display(), error = %e, "Failed to remove stale lock");
                    }
                }
            }
        }
    }

    /// Release the lock explicitly (normally handled by Drop)
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be unlocked
    pub fn release(self) -> Result<(), SyncError> {
        self.lock_file
            .unlock()
            .map_err(|e| SyncError::io(&self.lock_path, e))
        // Drop removes the file
    }
}

impl Drop for SyncLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();

        if let Err(e) = fs::remove_file(&self.lock_path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(
                lock = %self.lock_path.display(),
                error = %e,
                "Failed to remove lock file during cleanup"
            );
        }
    }
}

/// Lock file name for a pair of source paths.
fn lock_file_name(overlay: &Path, reputations: &Path) -> String {
    let mut bytes = overlay.as_os_str().as_encoded_bytes().to_vec();
    bytes.push(0);
    bytes.extend_from_slice(reputations.as_os_str().as_encoded_bytes());
    format!("{:016x}.lock", xxh3_64(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_and_release() {
        let temp = TempDir::new().unwrap();
        let lock = SyncLock::acquire(temp.path(), Path::new("/a"), Path::new("/b")).unwrap();
        let path = lock.path().to_path_buf();
        assert!(path.exists());
        lock.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_concurrent_locks_fail() {
        let temp = TempDir::new().unwrap();
        let _lock1 = SyncLock::acquire(temp.path(), Path::new("/a"), Path::new("/b")).unwrap();

        let start = Instant::now();
        let result = SyncLock::acquire(temp.path(), Path::new("/a"), Path::new("/b"));
        let elapsed = start.elapsed();

        assert!(matches!(result, Err(SyncError::Locked(_))));
        assert!(
            elapsed < Duration::from_millis(500),
            "Lock should fail quickly in test mode (took {elapsed:?})"
        );
    }

    #[test]
    fn test_different_pairs_allowed() {
        let temp = TempDir::new().unwrap();
        let _lock1 = SyncLock::acquire(temp.path(), Path::new("/a"), Path::new("/b")).unwrap();
        let lock2 = SyncLock::acquire(temp.path(), Path::new("/a"), Path::new("/c"));
        assert!(lock2.is_ok());
    }

    #[test]
    fn test_lock_name_depends_on_order() {
        assert_ne!(
            lock_file_name(Path::new("/a"), Path::new("/b")),
            lock_file_name(Path::new("/b"), Path::new("/a"))
        );
    }
}
