//! Removal of the final slide from a deck file.

use std::io::Write;
use std::path::Path;

use crate::error::DocumentError;

use super::codec::DeckCodec;
use super::codec::SlideRef;

/// Result of a removal attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalOutcome {
    /// The slide was removed and the file replaced.
    Removed(SlideRef),
    /// The deck has no slides; the file was not touched.
    Empty,
}

/// Removes the last slide of the deck at `path`.
///
/// The slide list is read once and the slide at its final position is
/// removed by identity. The new document is written to a temporary file in
/// the same directory and renamed over the original, so the file on disk is
/// always either the old or the new document.
///
/// # Errors
///
/// Returns an error if the file cannot be read, decoded, re-encoded, or
/// replaced. On error the original file is unchanged.
///
/// # Examples
///
/// ```no_run
/// use deckprep_core::document::{remove_last_slide, PptxCodec, RemovalOutcome};
/// use std::path::Path;
///
/// # fn main() -> Result<(), deckprep_core::DocumentError> {
/// match remove_last_slide(Path::new("deck.pptx"), &PptxCodec)? {
///     RemovalOutcome::Removed(slide) => println!("removed {slide}"),
///     RemovalOutcome::Empty => println!("nothing to remove"),
/// }
/// # Ok(())
/// # }
/// ```
pub fn remove_last_slide(
    path: &Path,
    codec: &dyn DeckCodec,
) -> Result<RemovalOutcome, DocumentError> {
    let bytes = std::fs::read(path)?;
    let mut deck = codec.open(bytes)?;

    let Some(last) = deck.slides().last().cloned() else {
        return Ok(RemovalOutcome::Empty);
    };
    deck.remove(&last)?;
    let updated = deck.to_bytes()?;
    replace_file(path, &updated)?;

    Ok(RemovalOutcome::Removed(last))
}

/// Atomically replaces `path` with `contents`, keeping its permissions.
fn replace_file(path: &Path, contents: &[u8]) -> Result<(), DocumentError> {
    let parent = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let permissions = std::fs::metadata(path)?.permissions();

    let mut temp = tempfile::Builder::new()
        .prefix(".deckprep-")
        .suffix(".tmp")
        .tempfile_in(parent)?;
    temp.write_all(contents)?;
    temp.as_file().set_permissions(permissions)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| DocumentError::Io(err.error))?;
    Ok(())
}
