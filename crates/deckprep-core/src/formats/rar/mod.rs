//! RAR archive format handler.
//!
//! The RAR decoder only extracts whole archives to a directory and trusts
//! the names stored in the archive. Block headers are therefore listed
//! first and every name is validated with [`SafePath`]: a single bad name
//! refuses the archive before anything is decoded. Entries are then decoded
//! into a private staging directory beside the archive and handed out from
//! there in archive order.
//!
//! The staging directory is a [`tempfile::TempDir`]; it is removed when
//! iteration finishes, fails, or unwinds.

mod headers;

use std::fs::File;
use std::path::Path;
use std::path::PathBuf;

use tempfile::TempDir;

use crate::error::ArchiveError;
use crate::types::EntryType;
use crate::types::SafePath;

use super::traits::ArchiveFormat;
use super::traits::EntryVisitor;
use super::traits::RawEntry;

use headers::RarRecord;
use headers::RecordKind;

/// Name prefix of the staging directories created next to RAR archives.
pub const STAGING_PREFIX: &str = ".deckprep-rar-";

/// RAR archive handler.
#[derive(Debug)]
pub struct RarArchive {
    path: PathBuf,
    warnings: Vec<String>,
}

impl RarArchive {
    /// Prepares a RAR archive for extraction.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive file cannot be read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let path = path.as_ref();
        if !std::fs::metadata(path)?.is_file() {
            return Err(ArchiveError::InvalidArchive(format!(
                "not a regular file: {}",
                path.display()
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
            warnings: Vec::new(),
        })
    }

    fn staging_dir(&self) -> Result<TempDir, ArchiveError> {
        let parent = self
            .path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Ok(tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(parent)?)
    }

    /// Decodes the whole archive into `staging`.
    ///
    /// Parent directories of every record must already exist; the decoder
    /// only creates files.
    fn decode_into(&self, staging: &Path) -> Result<(), ArchiveError> {
        let archive = self.path.to_str().ok_or_else(|| {
            ArchiveError::InvalidArchive("RAR path contains invalid UTF-8".to_string())
        })?;
        let dest = staging.to_str().ok_or_else(|| {
            ArchiveError::InvalidArchive("staging path contains invalid UTF-8".to_string())
        })?;

        rar::Archive::extract_all(archive, dest, "")
            .map_err(|e| ArchiveError::InvalidArchive(format!("failed to decode RAR: {e}")))?;
        Ok(())
    }
}

impl ArchiveFormat for RarArchive {
    fn for_each_entry(&mut self, visit: &mut EntryVisitor<'_>) -> Result<(), ArchiveError> {
        let records = headers::list_records(&self.path)?;
        for record in &records {
            SafePath::validate(&record.name)?;
        }

        let staging = self.staging_dir()?;
        log::debug!(
            "decoding {} ({} records) into staging {}",
            self.path.display(),
            records.len(),
            staging.path().display()
        );
        for record in &records {
            if let Some(parent) = staging.path().join(&record.name).parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
        self.decode_into(staging.path())?;
        self.visit_staged(staging.path(), &records, visit)
    }

    fn format_name(&self) -> &str {
        "rar"
    }

    fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }
}

impl RarArchive {
    /// Hands out staged file records in archive order.
    fn visit_staged(
        &mut self,
        staging: &Path,
        records: &[RarRecord],
        visit: &mut EntryVisitor<'_>,
    ) -> Result<(), ArchiveError> {
        for record in records {
            match record.kind {
                RecordKind::File => {
                    let mut file = File::open(staging.join(&record.name))?;
                    visit(RawEntry {
                        path: record.name.clone(),
                        entry_type: EntryType::File,
                        reader: &mut file,
                    })?;
                }
                RecordKind::Link => {
                    let message = format!("skipped link entry {}", record.name.display());
                    log::warn!("{}: {message}", self.path.display());
                    self.warnings.push(message);
                }
                RecordKind::Service => {
                    log::debug!("ignoring service record {}", record.name.display());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::RarTestBuilder;

    fn staging_dirs(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(STAGING_PREFIX))
            })
            .collect()
    }

    fn write_rar(dir: &Path, bytes: &[u8]) -> PathBuf {
        let path = dir.join("bundle.rar");
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_open_missing_file() {
        let temp = TempDir::new().unwrap();
        let result = RarArchive::open(temp.path().join("missing.rar"));
        assert!(matches!(result, Err(ArchiveError::Io(_))));
    }

    #[test]
    fn test_open_directory_rejected() {
        let temp = TempDir::new().unwrap();
        let result = RarArchive::open(temp.path());
        assert!(matches!(result, Err(ArchiveError::InvalidArchive(_))));
    }

    #[test]
    fn test_stored_entries_visited_in_order() {
        let temp = TempDir::new().unwrap();
        let bytes = RarTestBuilder::new()
            .add_file("b.txt", b"bee")
            .add_file("x/y/1.txt", b"one")
            .build();
        let mut archive = RarArchive::open(write_rar(temp.path(), &bytes)).unwrap();

        let mut seen = Vec::new();
        archive
            .for_each_entry(&mut |entry| {
                let mut content = Vec::new();
                entry.reader.read_to_end(&mut content)?;
                seen.push((entry.path, entry.entry_type, content));
                Ok(())
            })
            .unwrap();

        assert_eq!(
            seen,
            vec![
                (PathBuf::from("b.txt"), EntryType::File, b"bee".to_vec()),
                (PathBuf::from("x/y/1.txt"), EntryType::File, b"one".to_vec()),
            ]
        );
        assert!(staging_dirs(temp.path()).is_empty());
    }

    #[test]
    fn test_traversal_name_refuses_archive_before_decoding() {
        let temp = TempDir::new().unwrap();
        let inner = temp.path().join("inbox");
        std::fs::create_dir(&inner).unwrap();
        let bytes = RarTestBuilder::new()
            .add_file("ok.txt", b"ok")
            .add_file("../../escaped.txt", b"evil")
            .build();
        let mut archive = RarArchive::open(write_rar(&inner, &bytes)).unwrap();

        let mut visited = 0;
        let result = archive.for_each_entry(&mut |_| {
            visited += 1;
            Ok(())
        });

        assert!(matches!(result, Err(ArchiveError::PathTraversal { .. })));
        assert_eq!(visited, 0);
        assert!(!temp.path().join("escaped.txt").exists());
        assert!(!temp.path().parent().unwrap().join("escaped.txt").exists());
        assert!(staging_dirs(&inner).is_empty());
    }

    #[test]
    fn test_visitor_error_removes_staging() {
        let temp = TempDir::new().unwrap();
        let bytes = RarTestBuilder::new().add_file("a.txt", b"a").build();
        let mut archive = RarArchive::open(write_rar(temp.path(), &bytes)).unwrap();

        let result =
            archive.for_each_entry(&mut |_| Err(ArchiveError::InvalidArchive("stop".into())));
        assert!(result.is_err());
        assert!(staging_dirs(temp.path()).is_empty());
    }

    #[test]
    fn test_link_records_skipped_with_warning() {
        let temp = TempDir::new().unwrap();
        let bytes = RarTestBuilder::new()
            .add_symlink("link", "/etc/passwd")
            .add_file("a.txt", b"a")
            .build();
        let mut archive = RarArchive::open(write_rar(temp.path(), &bytes)).unwrap();

        let mut paths = Vec::new();
        archive
            .for_each_entry(&mut |entry| {
                paths.push(entry.path);
                Ok(())
            })
            .unwrap();

        assert_eq!(paths, vec![PathBuf::from("a.txt")]);
        let warnings = archive.take_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("link"));
    }

    #[test]
    fn test_unsupported_archive_creates_no_staging() {
        let temp = TempDir::new().unwrap();
        let bytes = RarTestBuilder::new()
            .compression_method(5)
            .add_file("a.txt", b"packed")
            .build();
        let mut archive = RarArchive::open(write_rar(temp.path(), &bytes)).unwrap();

        let result = archive.for_each_entry(&mut |_| Ok(()));
        assert!(matches!(result, Err(ArchiveError::UnsupportedFormat { .. })));
        assert!(staging_dirs(temp.path()).is_empty());
    }
}
