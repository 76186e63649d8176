//! Error types for batch extraction and slide-deck editing.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the umbrella [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// How urgently a failed unit needs attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// The unit failed but the filesystem is consistent.
    Error,
    /// The unit failed and left state that needs manual recovery.
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Fatal errors raised before any unit is processed.
#[derive(Error, Debug)]
pub enum SetupError {
    /// The root directory does not exist.
    #[error("root directory does not exist: {path}")]
    RootNotFound {
        /// The requested root.
        path: PathBuf,
    },

    /// The root path exists but is not a directory.
    #[error("root path is not a directory: {path}")]
    NotADirectory {
        /// The requested root.
        path: PathBuf,
    },

    /// The explicit extraction target is unusable.
    #[error("invalid extraction target {path}: {reason}")]
    InvalidTarget {
        /// The requested target.
        path: PathBuf,
        /// Why it was rejected.
        reason: String,
    },

    /// The worker pool could not be started.
    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),

    /// The root could not be resolved.
    #[error("I/O error while preparing run: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors isolated to a single archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The archive uses a feature the decoder cannot reproduce.
    #[error("unsupported archive {path}: {reason}")]
    UnsupportedFormat {
        /// The archive path.
        path: PathBuf,
        /// The unsupported feature.
        reason: String,
    },

    /// Archive is corrupted or could not be decoded.
    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    /// An entry path resolves outside the extraction target.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending entry path as listed in the archive.
        path: PathBuf,
    },

    /// Strict conflict policy refused to overwrite an existing file.
    #[error("refusing to overwrite existing file: {path}")]
    ConflictRefused {
        /// The entry path relative to the target.
        path: PathBuf,
    },

    /// An entry would replace the archive it is being extracted from.
    #[error("refusing to overwrite the archive being extracted: {path}")]
    OverwritesSource {
        /// The entry path relative to the target.
        path: PathBuf,
    },
}

impl ArchiveError {
    /// Returns `true` if this error was raised by the path-safety checks.
    ///
    /// # Examples
    ///
    /// ```
    /// use deckprep_core::ArchiveError;
    /// use std::path::PathBuf;
    ///
    /// let err = ArchiveError::PathTraversal {
    ///     path: PathBuf::from("../etc/passwd"),
    /// };
    /// assert!(err.is_security_violation());
    ///
    /// let err = ArchiveError::InvalidArchive("bad header".into());
    /// assert!(!err.is_security_violation());
    /// ```
    #[must_use]
    pub const fn is_security_violation(&self) -> bool {
        matches!(self, Self::PathTraversal { .. })
    }

    /// Returns `true` if the error affects a single entry rather than the
    /// whole archive.
    #[must_use]
    pub const fn is_entry_level(&self) -> bool {
        matches!(
            self,
            Self::PathTraversal { .. }
                | Self::ConflictRefused { .. }
                | Self::OverwritesSource { .. }
        )
    }
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => Self::Io(io),
            other => Self::InvalidArchive(other.to_string()),
        }
    }
}

/// Errors isolated to a single slide-deck document.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The container could not be opened or is structurally invalid.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// An XML part could not be parsed or rewritten.
    #[error("XML error in {part}: {message}")]
    Xml {
        /// Package part being processed.
        part: String,
        /// Parser message.
        message: String,
    },

    /// A backup file from an earlier run is still present.
    #[error("backup file already exists: {path}")]
    BackupExists {
        /// The leftover backup path.
        path: PathBuf,
    },

    /// The pre-mutation backup could not be written.
    #[error("failed to create backup {path}: {source}")]
    BackupFailed {
        /// The backup path.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// Mutation failed and the original could not be restored.
    #[error(
        "{original}; restoring from {} also failed: {restore}. Recover the document manually from the backup",
        backup.display()
    )]
    RestoreFailed {
        /// Failure that triggered the restore.
        original: Box<DocumentError>,
        /// Failure of the restore itself.
        restore: std::io::Error,
        /// Backup file kept on disk.
        backup: PathBuf,
    },
}

impl DocumentError {
    /// Returns `true` when the backup was left on disk for manual recovery.
    ///
    /// # Examples
    ///
    /// ```
    /// use deckprep_core::DocumentError;
    /// use std::io;
    /// use std::path::PathBuf;
    ///
    /// let err = DocumentError::RestoreFailed {
    ///     original: Box::new(DocumentError::InvalidDocument("truncated".into())),
    ///     restore: io::Error::other("disk full"),
    ///     backup: PathBuf::from("deck.pptx.bak"),
    /// };
    /// assert!(err.needs_manual_recovery());
    /// ```
    #[must_use]
    pub const fn needs_manual_recovery(&self) -> bool {
        matches!(self, Self::RestoreFailed { .. })
    }

    /// Severity used when reporting this failure.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        if self.needs_manual_recovery() {
            Severity::Critical
        } else {
            Severity::Error
        }
    }

    pub(crate) fn xml(part: &str, err: impl std::fmt::Display) -> Self {
        Self::Xml {
            part: part.to_string(),
            message: err.to_string(),
        }
    }
}

impl From<zip::result::ZipError> for DocumentError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => Self::Io(io),
            other => Self::InvalidDocument(other.to_string()),
        }
    }
}

/// Umbrella error for callers that handle every failure kind uniformly.
#[derive(Error, Debug)]
pub enum Error {
    /// Fatal setup failure.
    #[error(transparent)]
    Setup(#[from] SetupError),

    /// Archive-level failure.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Document-level failure.
    #[error(transparent)]
    Document(#[from] DocumentError),
}
