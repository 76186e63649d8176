//! ZIP archive format handler.
//!
//! ZIP supports random access, so entries are streamed straight from the
//! archive into their final location without staging. Symbolic links are
//! skipped with a warning.

use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::path::Path;
use std::path::PathBuf;

use crate::error::ArchiveError;
use crate::types::EntryType;

use super::traits::ArchiveFormat;
use super::traits::EntryVisitor;
use super::traits::RawEntry;

/// ZIP archive handler.
///
/// # Examples
///
/// ```no_run
/// use deckprep_core::formats::ArchiveFormat;
/// use deckprep_core::formats::ZipArchive;
///
/// # fn main() -> Result<(), deckprep_core::ArchiveError> {
/// let mut archive = ZipArchive::open("bundle.zip")?;
/// archive.for_each_entry(&mut |entry| {
///     println!("{}", entry.path.display());
///     Ok(())
/// })?;
/// # Ok(())
/// # }
/// ```
pub struct ZipArchive<R: Read + Seek> {
    inner: zip::ZipArchive<R>,
    warnings: Vec<String>,
}

impl ZipArchive<BufReader<File>> {
    /// Opens a ZIP archive from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or has no valid central
    /// directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let file = File::open(path.as_ref())?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> ZipArchive<R> {
    /// Creates a ZIP handler over any seekable reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not a valid ZIP archive.
    pub fn new(reader: R) -> Result<Self, ArchiveError> {
        Ok(Self {
            inner: zip::ZipArchive::new(reader)?,
            warnings: Vec::new(),
        })
    }
}

/// Normalizes separators; some Windows tools store `\` in entry names.
fn entry_path(name: &str) -> PathBuf {
    PathBuf::from(name.replace('\\', "/"))
}

impl<R: Read + Seek> ArchiveFormat for ZipArchive<R> {
    fn for_each_entry(&mut self, visit: &mut EntryVisitor<'_>) -> Result<(), ArchiveError> {
        for index in 0..self.inner.len() {
            let mut file = self.inner.by_index(index)?;
            let path = entry_path(file.name());
            if file.is_symlink() {
                let message = format!("skipped symlink entry {}", path.display());
                log::warn!("{message}");
                self.warnings.push(message);
                continue;
            }
            let entry_type = EntryType::from_is_dir(file.is_dir());

            visit(RawEntry {
                path,
                entry_type,
                reader: &mut file,
            })?;
        }
        Ok(())
    }

    fn format_name(&self) -> &str {
        "zip"
    }

    fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }
}
