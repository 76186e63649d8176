//! Discovered archive identity.

use std::ffi::OsStr;
use std::path::Path;
use std::path::PathBuf;

/// Supported archive kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    /// ZIP archive, streamed entry by entry.
    Zip,
    /// RAR archive, decoded through a staging directory.
    Rar,
}

impl ArchiveKind {
    /// Classifies a path by its extension, case-insensitively.
    ///
    /// # Examples
    ///
    /// ```
    /// use deckprep_core::types::ArchiveKind;
    /// use std::path::Path;
    ///
    /// assert_eq!(ArchiveKind::from_path(Path::new("a.ZIP")), Some(ArchiveKind::Zip));
    /// assert_eq!(ArchiveKind::from_path(Path::new("b.rar")), Some(ArchiveKind::Rar));
    /// assert_eq!(ArchiveKind::from_path(Path::new("c.tar")), None);
    /// ```
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("zip") {
            Some(Self::Zip)
        } else if ext.eq_ignore_ascii_case("rar") {
            Some(Self::Rar)
        } else {
            None
        }
    }

    /// Short lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Rar => "rar",
        }
    }
}

impl std::fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An archive found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchiveFile {
    path: PathBuf,
    kind: ArchiveKind,
}

impl ArchiveFile {
    /// Creates an `ArchiveFile` when the path has a supported extension.
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let kind = ArchiveKind::from_path(&path)?;
        Some(Self { path, kind })
    }

    /// Path to the archive.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Kind of the archive.
    #[must_use]
    pub const fn kind(&self) -> ArchiveKind {
        self.kind
    }

    /// Directory an archive extracts into by default.
    #[must_use]
    pub fn parent_dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    /// File name without its archive extension (`notes.zip` → `notes`).
    #[must_use]
    pub fn stem(&self) -> &OsStr {
        self.path
            .file_stem()
            .unwrap_or_else(|| self.path.as_os_str())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_case_extension() {
        let archive = ArchiveFile::from_path("/data/Pack.RaR").expect("rar");
        assert_eq!(archive.kind(), ArchiveKind::Rar);
        assert_eq!(archive.parent_dir(), Path::new("/data"));
    }

    #[test]
    fn test_stem_drops_only_last_extension() {
        let archive = ArchiveFile::from_path("/data/q3.notes.zip").expect("zip");
        assert_eq!(archive.stem(), OsStr::new("q3.notes"));
    }

    #[test]
    fn test_no_extension() {
        assert!(ArchiveFile::from_path("/data/zip").is_none());
        assert!(ArchiveFile::from_path("/data/archive.zip.part").is_none());
    }
}
