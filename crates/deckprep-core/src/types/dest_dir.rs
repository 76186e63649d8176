//! Validated extraction target directory.

use std::io;
use std::path::Path;
use std::path::PathBuf;

use super::SafePath;

/// A validated directory that archive contents are written into.
///
/// Once constructed, the target is guaranteed to have existed as a directory
/// and is stored as an absolute canonical path, so every joined
/// [`SafePath`] stays underneath it lexically.
///
/// Several archives may share one target; callers serialize writes per
/// target through [`crate::locks::PathLocks`].
///
/// # Examples
///
/// ```no_run
/// use deckprep_core::types::ExtractionTarget;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let target = ExtractionTarget::new("/tmp/extraction")?;
/// println!("Extracting to: {}", target.as_path().display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExtractionTarget(PathBuf);

impl ExtractionTarget {
    /// Creates a new `ExtractionTarget` after validating the path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The path does not exist
    /// - The path exists but is not a directory
    /// - The path cannot be canonicalized
    pub fn new(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let metadata = std::fs::metadata(&path).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("extraction target {} is not accessible: {e}", path.display()),
            )
        })?;

        if !metadata.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path is not a directory: {}", path.display()),
            ));
        }

        let canonical = path.canonicalize().map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("failed to canonicalize path {}: {e}", path.display()),
            )
        })?;

        Ok(Self(canonical))
    }

    /// Returns the path as a `&Path`.
    #[inline]
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Joins a validated entry path to this target.
    #[inline]
    #[must_use]
    pub fn join(&self, safe_path: &SafePath) -> PathBuf {
        self.0.join(safe_path.as_path())
    }

    /// Converts into the inner `PathBuf`.
    #[inline]
    #[must_use]
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for ExtractionTarget {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}
