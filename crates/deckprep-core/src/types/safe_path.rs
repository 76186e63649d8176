//! Validated entry path relative to an extraction target.

use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use crate::error::ArchiveError;

/// A normalized relative path that cannot leave its extraction target.
///
/// `SafePath` represents an archive entry path that:
/// - is relative (no root, no drive prefix)
/// - contains no null bytes
/// - contains no `.` components
/// - never climbs above the target when its `..` components are applied
///
/// `..` components that stay inside the target (`a/../b`) are folded away
/// during normalization; only paths that escape are rejected.
///
/// # Security Properties
///
/// - Can ONLY be constructed through validation
/// - NO `From<PathBuf>` implementation
/// - Joining to an [`ExtractionTarget`](super::ExtractionTarget) always
///   yields a path underneath it lexically
///
/// # Examples
///
/// ```
/// use deckprep_core::types::SafePath;
/// use std::path::Path;
///
/// let safe = SafePath::validate(Path::new("x/./y/../1.txt")).unwrap();
/// assert_eq!(safe.as_path(), Path::new("x/1.txt"));
///
/// assert!(SafePath::validate(Path::new("../etc/passwd")).is_err());
/// assert!(SafePath::validate(Path::new("a/../../b")).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SafePath(PathBuf);

impl SafePath {
    /// Validates and normalizes an entry path.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::PathTraversal` when the path is empty, absolute,
    /// contains null bytes, escapes the target after normalization, or names
    /// the target itself.
    pub fn validate(path: &Path) -> Result<Self, ArchiveError> {
        match normalize(path) {
            Some(normalized) if !normalized.as_os_str().is_empty() => Ok(Self(normalized)),
            _ => Err(ArchiveError::PathTraversal {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Returns `true` when `path` normalizes to the target directory itself
    /// (`./`, `a/..`) without ever leaving it.
    ///
    /// # Examples
    ///
    /// ```
    /// use deckprep_core::types::SafePath;
    /// use std::path::Path;
    ///
    /// assert!(SafePath::is_target_root(Path::new("./")));
    /// assert!(SafePath::is_target_root(Path::new("a/..")));
    /// assert!(!SafePath::is_target_root(Path::new("a")));
    /// assert!(!SafePath::is_target_root(Path::new("../a/..")));
    /// ```
    #[must_use]
    pub fn is_target_root(path: &Path) -> bool {
        normalize(path).is_some_and(|normalized| normalized.as_os_str().is_empty())
    }

    /// Returns the path as a `&Path`.
    #[inline]
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Proper ancestors, shallowest first (`a`, `a/b` for `a/b/c`).
    pub fn ancestors(&self) -> impl Iterator<Item = &Path> {
        let mut ancestors: Vec<&Path> = self
            .0
            .ancestors()
            .skip(1)
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
        ancestors.reverse();
        ancestors.into_iter()
    }

    /// Converts into the inner `PathBuf`.
    #[inline]
    #[must_use]
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl std::fmt::Display for SafePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.display().fmt(f)
    }
}

/// Folds `.` and inner `..` components; `None` if the path is absolute,
/// contains null bytes, or climbs above its start.
fn normalize(path: &Path) -> Option<PathBuf> {
    if has_null_bytes(path) {
        return None;
    }

    let mut normalized = PathBuf::new();
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::Normal(part) => {
                normalized.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                depth = depth.checked_sub(1)?;
                normalized.pop();
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(normalized)
}

#[cfg(unix)]
fn has_null_bytes(path: &Path) -> bool {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().contains(&b'\0')
}

#[cfg(not(unix))]
fn has_null_bytes(path: &Path) -> bool {
    path.to_str().is_none_or(|s| s.contains('\0'))
}
