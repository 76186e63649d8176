//! Scoped backup and restore around an in-place file mutation.

use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use crate::copy::CopyBuffer;
use crate::copy::copy_file_exclusive;
use crate::error::DocumentError;
use crate::locks::PathLockGuard;
use crate::locks::PathLocks;

/// Suffix appended to the original file name for the backup copy.
pub const BACKUP_SUFFIX: &str = ".bak";

/// Returns the backup path for `path` (`deck.pptx` → `deck.pptx.bak`).
///
/// # Examples
///
/// ```
/// use deckprep_core::document::backup_path;
/// use std::path::Path;
///
/// assert_eq!(backup_path(Path::new("a/deck.pptx")), Path::new("a/deck.pptx.bak"));
/// ```
#[must_use]
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Byte-identical backup of a file that is about to be mutated in place.
///
/// While the guard lives it holds the path lock for the original, so no
/// other unit can touch the same file. Exactly one of [`commit`] or
/// [`rollback`] ends the guard; if neither runs (the protected code
/// panicked), dropping the guard restores the original on a best-effort
/// basis.
///
/// [`commit`]: BackupGuard::commit
/// [`rollback`]: BackupGuard::rollback
pub struct BackupGuard {
    original: PathBuf,
    backup: PathBuf,
    armed: bool,
    _lock: PathLockGuard,
}

impl std::fmt::Debug for BackupGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupGuard")
            .field("original", &self.original)
            .field("backup", &self.backup)
            .field("armed", &self.armed)
            .finish_non_exhaustive()
    }
}

impl BackupGuard {
    /// Locks `path` and copies it to its backup path.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::BackupExists`] if a backup from an earlier run
    /// is still present, or [`DocumentError::BackupFailed`] if the copy could
    /// not be written and synced. No partial backup is left behind.
    pub fn acquire(path: &Path, locks: &PathLocks) -> Result<Self, DocumentError> {
        let lock = locks.acquire(path);
        let backup = backup_path(path);

        match copy_file_exclusive(path, &backup, &mut CopyBuffer::new()) {
            Ok(bytes) => log::debug!("backed up {} ({bytes} bytes)", path.display()),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(DocumentError::BackupExists { path: backup });
            }
            Err(source) => {
                return Err(DocumentError::BackupFailed {
                    path: backup,
                    source,
                });
            }
        }

        Ok(Self {
            original: path.to_path_buf(),
            backup,
            armed: true,
            _lock: lock,
        })
    }

    /// Path of the backup copy.
    #[must_use]
    pub fn backup(&self) -> &Path {
        &self.backup
    }

    /// Keeps the mutation and deletes the backup.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the backup could not be deleted. The mutation
    /// itself stands either way.
    pub fn commit(mut self) -> io::Result<()> {
        self.armed = false;
        std::fs::remove_file(&self.backup)
    }

    /// Restores the original from the backup and hands back `cause`.
    ///
    /// If the restore itself fails the backup is kept and the returned error
    /// is [`DocumentError::RestoreFailed`], naming both failures.
    #[must_use]
    pub fn rollback(mut self, cause: DocumentError) -> DocumentError {
        self.armed = false;
        match restore(&self.backup, &self.original) {
            Ok(()) => {
                log::warn!(
                    "restored {} after failure: {cause}",
                    self.original.display()
                );
                cause
            }
            Err(restore) => DocumentError::RestoreFailed {
                original: Box::new(cause),
                restore,
                backup: self.backup.clone(),
            },
        }
    }

    /// Runs `action` on `path` under a backup.
    ///
    /// On success the backup is removed (a removal failure is logged). On
    /// failure the original is restored and the action's error returned.
    ///
    /// # Errors
    ///
    /// Returns the backup error, the action's error, or
    /// [`DocumentError::RestoreFailed`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use deckprep_core::document::BackupGuard;
    /// use deckprep_core::locks::PathLocks;
    /// use std::path::Path;
    ///
    /// # fn main() -> Result<(), deckprep_core::DocumentError> {
    /// let locks = PathLocks::new();
    /// BackupGuard::protect(Path::new("deck.pptx"), &locks, |path| {
    ///     std::fs::write(path, b"new contents")?;
    ///     Ok(())
    /// })?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn protect<T>(
        path: &Path,
        locks: &PathLocks,
        action: impl FnOnce(&Path) -> Result<T, DocumentError>,
    ) -> Result<T, DocumentError> {
        let guard = Self::acquire(path, locks)?;
        match action(path) {
            Ok(value) => {
                let backup = guard.backup.clone();
                if let Err(err) = guard.commit() {
                    log::warn!("failed to remove backup {}: {err}", backup.display());
                }
                Ok(value)
            }
            Err(err) => Err(guard.rollback(err)),
        }
    }
}

impl Drop for BackupGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        log::error!(
            "mutation of {} did not finish; restoring from backup",
            self.original.display()
        );
        if let Err(err) = restore(&self.backup, &self.original) {
            log::error!(
                "restore of {} failed: {err}; backup kept at {}",
                self.original.display(),
                self.backup.display()
            );
        }
    }
}

/// Moves the backup over the original in one rename.
fn restore(backup: &Path, original: &Path) -> io::Result<()> {
    std::fs::rename(backup, original)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup(content: &str) -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("deck.pptx");
        std::fs::write(&path, content).unwrap();
        (temp, path)
    }

    #[test]
    fn test_commit_removes_backup() {
        let (_temp, path) = setup("original");
        let locks = PathLocks::new();
        let guard = BackupGuard::acquire(&path, &locks).unwrap();
        assert_eq!(std::fs::read_to_string(guard.backup()).unwrap(), "original");

        std::fs::write(&path, "mutated").unwrap();
        guard.commit().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "mutated");
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn test_rollback_restores_original() {
        let (_temp, path) = setup("original");
        let locks = PathLocks::new();
        let result: Result<(), _> = BackupGuard::protect(&path, &locks, |p| {
            std::fs::write(p, "half written").unwrap();
            Err(DocumentError::InvalidDocument("boom".into()))
        });

        assert!(matches!(result, Err(DocumentError::InvalidDocument(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "original");
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn test_existing_backup_is_never_clobbered() {
        let (_temp, path) = setup("original");
        std::fs::write(backup_path(&path), "precious").unwrap();
        let locks = PathLocks::new();

        let err = BackupGuard::acquire(&path, &locks).unwrap_err();
        assert!(matches!(err, DocumentError::BackupExists { .. }));
        assert_eq!(
            std::fs::read_to_string(backup_path(&path)).unwrap(),
            "precious"
        );
    }

    #[test]
    fn test_missing_original_fails_without_backup() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("gone.pptx");
        let locks = PathLocks::new();
        let err = BackupGuard::acquire(&path, &locks).unwrap_err();
        assert!(matches!(err, DocumentError::BackupFailed { .. }));
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn test_failed_restore_keeps_backup_and_is_critical() {
        let (temp, path) = setup("original");
        let locks = PathLocks::new();
        let guard = BackupGuard::acquire(&path, &locks).unwrap();

        // move the backup away so the restore rename cannot succeed
        let moved = temp.path().join("elsewhere");
        std::fs::rename(guard.backup(), &moved).unwrap();

        let err = guard.rollback(DocumentError::InvalidDocument("boom".into()));
        assert!(err.needs_manual_recovery());
        assert!(err.to_string().contains("boom"));
        assert!(err.to_string().contains("deck.pptx.bak"));
    }

    #[test]
    fn test_drop_restores_after_panic() {
        let (_temp, path) = setup("original");
        let locks = PathLocks::new();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = BackupGuard::acquire(&path, &locks).unwrap();
            std::fs::write(&path, "corrupt").unwrap();
            panic!("mutation blew up");
        }));

        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "original");
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn test_lock_held_while_guard_lives() {
        let (_temp, path) = setup("original");
        let locks = PathLocks::new();
        let guard = BackupGuard::acquire(&path, &locks).unwrap();
        assert!(locks.try_acquire(&path).is_none());
        guard.commit().unwrap();
        assert!(locks.try_acquire(&path).is_some());
    }
}
