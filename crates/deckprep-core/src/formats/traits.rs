//! Common traits for archive format handlers.

use std::io::Read;
use std::path::PathBuf;

use crate::error::ArchiveError;
use crate::types::EntryType;

/// One entry handed out by an archive format, in listing order.
pub struct RawEntry<'a> {
    /// Path exactly as listed in the archive (not yet validated).
    pub path: PathBuf,
    /// File or directory.
    pub entry_type: EntryType,
    /// Entry contents; empty for directories.
    pub reader: &'a mut dyn Read,
}

/// Callback receiving each archive entry. Returning an error stops iteration.
pub type EntryVisitor<'v> = dyn for<'e> FnMut(RawEntry<'e>) -> Result<(), ArchiveError> + 'v;

/// Trait for archive format handlers.
///
/// Implementations decode the archive and hand every entry to the visitor
/// in the archive's listed order. Path validation and writing are left to
/// the caller.
pub trait ArchiveFormat {
    /// Visits every entry of the archive.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive cannot be decoded, or the first error
    /// returned by `visit`.
    fn for_each_entry(&mut self, visit: &mut EntryVisitor<'_>) -> Result<(), ArchiveError>;

    /// Returns the archive format name.
    fn format_name(&self) -> &str;

    /// Drains warnings produced while decoding.
    fn take_warnings(&mut self) -> Vec<String> {
        Vec::new()
    }
}
