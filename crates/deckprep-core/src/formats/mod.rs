//! Archive format handlers.
//!
//! Each supported [`ArchiveKind`] has a handler implementing
//! [`ArchiveFormat`]. Handlers only decode; validation and writing happen in
//! [`crate::extraction`].

pub mod rar;
pub mod traits;
pub mod zip;

pub use rar::RarArchive;
pub use traits::ArchiveFormat;
pub use traits::EntryVisitor;
pub use traits::RawEntry;
pub use zip::ZipArchive;

use crate::error::ArchiveError;
use crate::types::ArchiveFile;
use crate::types::ArchiveKind;

/// Opens the handler matching the archive's kind.
///
/// # Errors
///
/// Returns an error if the archive cannot be opened.
pub fn open(archive: &ArchiveFile) -> Result<Box<dyn ArchiveFormat>, ArchiveError> {
    let handler: Box<dyn ArchiveFormat> = match archive.kind() {
        ArchiveKind::Zip => Box::new(ZipArchive::open(archive.path())?),
        ArchiveKind::Rar => Box::new(RarArchive::open(archive.path())?),
    };
    Ok(handler)
}
