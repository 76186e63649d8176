//! Path-keyed mutual exclusion.
//!
//! Extraction serializes on the target directory and document mutation on
//! the document path. Two units keyed on different paths never block each
//! other.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::ArcMutexGuard;
use parking_lot::Mutex;
use parking_lot::RawMutex;

/// Held lock for one path. Released on drop.
pub type PathLockGuard = ArcMutexGuard<RawMutex, ()>;

/// Table of per-path mutexes shared by every worker of a run.
///
/// # Examples
///
/// ```
/// use deckprep_core::locks::PathLocks;
///
/// let locks = PathLocks::new();
/// let guard = locks.acquire("/data/deck.pptx");
/// assert!(locks.try_acquire("/data/deck.pptx").is_none());
/// drop(guard);
/// assert!(locks.try_acquire("/data/deck.pptx").is_some());
/// ```
#[derive(Debug, Default)]
pub struct PathLocks {
    slots: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl PathLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the lock for `path` is held.
    pub fn acquire(&self, path: impl AsRef<Path>) -> PathLockGuard {
        self.slot(path.as_ref()).lock_arc()
    }

    /// Takes the lock for `path` if nobody holds it.
    pub fn try_acquire(&self, path: impl AsRef<Path>) -> Option<PathLockGuard> {
        self.slot(path.as_ref()).try_lock_arc()
    }

    fn slot(&self, path: &Path) -> Arc<Mutex<()>> {
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        Arc::clone(self.slots.lock().entry(key).or_default())
    }
}
