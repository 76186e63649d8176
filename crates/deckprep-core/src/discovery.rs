//! Enumeration of archives and slide decks under a root directory.
//!
//! Discovery is lazy and one-shot: the returned iterator walks the tree as
//! it is consumed and cannot be restarted. Each directory listing is read
//! and sorted in full before any of its children are yielded, so the order
//! is deterministic for a given tree. Symlinks are never followed.

use std::cmp::Ordering;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;

use walkdir::DirEntry;
use walkdir::WalkDir;

use crate::config::DiscoveryOrder;
use crate::config::RunConfig;
use crate::types::ArchiveFile;

/// Extension of the slide decks the mutator understands.
pub const DOCUMENT_EXTENSION: &str = "pptx";

/// Prefix of the lock files office suites leave next to open documents.
const OFFICE_LOCK_PREFIX: &str = "~$";

/// How the tree is walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Listing order within each directory.
    pub order: DiscoveryOrder,
    /// Descend into subdirectories; `false` scans only the root.
    pub recursive: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            order: DiscoveryOrder::default(),
            recursive: true,
        }
    }
}

impl From<&RunConfig> for DiscoveryOptions {
    fn from(config: &RunConfig) -> Self {
        Self {
            order: config.order,
            recursive: config.recursive,
        }
    }
}

/// Lazy iterator over the files of one kind below a root.
///
/// Unreadable directories are logged and skipped.
pub struct Discovery<T> {
    walker: walkdir::IntoIter,
    classify: fn(&Path) -> Option<T>,
}

impl<T> Iterator for Discovery<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    log::warn!("skipping unreadable path: {err}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(item) = (self.classify)(entry.path()) {
                return Some(item);
            }
        }
    }
}

impl<T> std::fmt::Debug for Discovery<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Discovery").finish_non_exhaustive()
    }
}

fn walker(root: &Path, options: DiscoveryOptions) -> walkdir::IntoIter {
    let mut walk = WalkDir::new(root).follow_links(false).min_depth(1);
    if !options.recursive {
        walk = walk.max_depth(1);
    }
    match options.order {
        DiscoveryOrder::Lexicographic => walk.sort_by_file_name(),
        DiscoveryOrder::OldestFirst => walk.sort_by(oldest_first),
    }
    .into_iter()
}

fn modified(entry: &DirEntry) -> Option<SystemTime> {
    entry.metadata().ok()?.modified().ok()
}

fn oldest_first(a: &DirEntry, b: &DirEntry) -> Ordering {
    modified(a)
        .cmp(&modified(b))
        .then_with(|| a.file_name().cmp(b.file_name()))
}

/// Enumerates ZIP and RAR archives below `root`.
///
/// # Examples
///
/// ```no_run
/// use deckprep_core::discovery::{discover, DiscoveryOptions};
///
/// for archive in discover("/data/inbox", DiscoveryOptions::default()) {
///     println!("{} ({})", archive.path().display(), archive.kind());
/// }
/// ```
pub fn discover(root: impl AsRef<Path>, options: DiscoveryOptions) -> Discovery<ArchiveFile> {
    Discovery {
        walker: walker(root.as_ref(), options),
        classify: classify_archive,
    }
}

/// Enumerates slide decks below `root`, ignoring office lock files.
pub fn discover_documents(root: impl AsRef<Path>, options: DiscoveryOptions) -> Discovery<PathBuf> {
    Discovery {
        walker: walker(root.as_ref(), options),
        classify: classify_document,
    }
}

fn classify_archive(path: &Path) -> Option<ArchiveFile> {
    ArchiveFile::from_path(path)
}

fn classify_document(path: &Path) -> Option<PathBuf> {
    is_document(path).then(|| path.to_path_buf())
}

/// Returns `true` for `.pptx` files that are not office lock files.
#[must_use]
pub fn is_document(path: &Path) -> bool {
    let is_deck = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(DOCUMENT_EXTENSION));
    let is_lock = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(OFFICE_LOCK_PREFIX));
    is_deck && !is_lock
}
