//! Write-path conflict decisions.
//!
//! The resolver inspects what already exists at a proposed write path and
//! decides how the incoming entry is applied. It never touches the
//! filesystem beyond reading metadata, and never follows symlinks.

use std::io;
use std::path::Path;
use std::path::PathBuf;

use crate::types::EntryType;

/// What already occupies a write path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExistingKind {
    /// A regular file.
    File,
    /// A directory.
    Directory,
    /// A symlink or special file; never written through.
    Other,
}

impl ExistingKind {
    /// Classifies metadata obtained without following symlinks.
    #[must_use]
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        let file_type = metadata.file_type();
        if file_type.is_symlink() {
            Self::Other
        } else if file_type.is_dir() {
            Self::Directory
        } else if file_type.is_file() {
            Self::File
        } else {
            Self::Other
        }
    }
}

impl std::fmt::Display for ExistingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "existing file"),
            Self::Directory => write!(f, "existing directory"),
            Self::Other => write!(f, "existing symlink or special file"),
        }
    }
}

/// Decision for one write path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Nothing exists; write normally.
    ProceedFresh,
    /// A file exists and the incoming file replaces it.
    Overwrite,
    /// A directory exists and the incoming directory merges into it.
    MergeInto(PathBuf),
    /// Types differ; the entry is not applied.
    Skip(ExistingKind),
}

/// Recorded outcome of a conflict, as surfaced in the run report.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConflictRecord {
    /// Entry path relative to the extraction target.
    pub entry_path: PathBuf,
    /// What was found at the write path.
    pub existing: ExistingKind,
    /// How the conflict was handled.
    pub resolution: ConflictResolution,
}

/// Conflict handling recorded in a [`ConflictRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictResolution {
    /// The existing file was replaced.
    Overwrite,
    /// The incoming directory merged into the existing one.
    Merge,
    /// The entry was not applied.
    Skip,
}

impl std::fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overwrite => write!(f, "overwrite"),
            Self::Merge => write!(f, "merge"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

impl std::fmt::Display for ConflictRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} over {}",
            self.entry_path.display(),
            self.resolution,
            self.existing
        )
    }
}

impl Resolution {
    /// Converts the decision into a report record, if it is a conflict.
    #[must_use]
    pub fn to_record(&self, entry_path: &Path) -> Option<ConflictRecord> {
        let (existing, resolution) = match self {
            Self::ProceedFresh => return None,
            Self::Overwrite => (ExistingKind::File, ConflictResolution::Overwrite),
            Self::MergeInto(_) => (ExistingKind::Directory, ConflictResolution::Merge),
            Self::Skip(existing) => (*existing, ConflictResolution::Skip),
        };
        Some(ConflictRecord {
            entry_path: entry_path.to_path_buf(),
            existing,
            resolution,
        })
    }
}

/// Decides how an entry of type `entry` is applied at `target_path`.
///
/// | existing  | incoming dir   | incoming file |
/// |-----------|----------------|---------------|
/// | nothing   | `ProceedFresh` | `ProceedFresh`|
/// | directory | `MergeInto`    | `Skip`        |
/// | file      | `Skip`         | `Overwrite`   |
/// | other     | `Skip`         | `Skip`        |
///
/// # Errors
///
/// Returns an I/O error when metadata cannot be read for a reason other than
/// the path not existing.
///
/// # Examples
///
/// ```
/// use deckprep_core::extraction::conflict::{resolve, Resolution};
/// use deckprep_core::types::EntryType;
/// use std::path::Path;
///
/// let decision = resolve(Path::new("/nonexistent/path/x"), EntryType::File).unwrap();
/// assert_eq!(decision, Resolution::ProceedFresh);
/// ```
pub fn resolve(target_path: &Path, entry: EntryType) -> io::Result<Resolution> {
    let metadata = match std::fs::symlink_metadata(target_path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Resolution::ProceedFresh),
        Err(e) => return Err(e),
    };

    let existing = ExistingKind::from_metadata(&metadata);
    Ok(match (existing, entry) {
        (ExistingKind::Directory, EntryType::Directory) => {
            Resolution::MergeInto(target_path.to_path_buf())
        }
        (ExistingKind::File, EntryType::File) => Resolution::Overwrite,
        (existing, _) => Resolution::Skip(existing),
    })
}
