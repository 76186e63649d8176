//! Error conversion utilities for CLI.
//!
//! Converts deckprep-core's typed errors (thiserror) into user-friendly
//! contextual errors (anyhow) with actionable guidance.

use deckprep_core::SetupError;

/// Converts `SetupError` to a user-friendly anyhow error with a hint.
pub fn convert_setup_error(err: SetupError) -> anyhow::Error {
    match err {
        SetupError::RootNotFound { path } => {
            anyhow::anyhow!(
                "Directory not found: {}\n\
                 HINT: Check the path, or pass an absolute path.",
                path.display()
            )
        }
        SetupError::NotADirectory { path } => {
            anyhow::anyhow!(
                "Not a directory: {}\n\
                 HINT: deckprep processes whole directories. Move the file into a directory and pass that.",
                path.display()
            )
        }
        SetupError::InvalidTarget { path, reason } => {
            anyhow::anyhow!(
                "Invalid --target directory '{}': {reason}\n\
                 HINT: The target must be an existing directory.",
                path.display()
            )
        }
        SetupError::WorkerPool(reason) => {
            anyhow::anyhow!(
                "Failed to start worker threads: {reason}\n\
                 HINT: Retry with a smaller --jobs value."
            )
        }
        SetupError::Io(io_err) => anyhow::Error::from(io_err).context("I/O error while preparing run"),
    }
}

/// Hint shown next to failed units that need manual recovery.
pub const MANUAL_RECOVERY_HINT: &str =
    "HINT: A document could not be restored. Its '.bak' file holds the original; rename it back by hand.";

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_convert_root_not_found() {
        let err = SetupError::RootNotFound {
            path: PathBuf::from("/nowhere/inbox"),
        };
        let msg = format!("{:?}", convert_setup_error(err));
        assert!(msg.contains("/nowhere/inbox"));
        assert!(msg.contains("HINT"));
    }

    #[test]
    fn test_convert_invalid_target() {
        let err = SetupError::InvalidTarget {
            path: PathBuf::from("out"),
            reason: "not a directory".into(),
        };
        let msg = format!("{:?}", convert_setup_error(err));
        assert!(msg.contains("--target"));
        assert!(msg.contains("not a directory"));
    }

    #[test]
    fn test_convert_io_error() {
        let err = SetupError::Io(std::io::Error::other("denied"));
        let msg = format!("{:?}", convert_setup_error(err));
        assert!(msg.contains("I/O error"));
        assert!(msg.contains("denied"));
    }
}
