//! Archive extraction into a target directory.
//!
//! Every entry is validated with [`SafePath`] before anything touches the
//! filesystem, then applied according to the conflict resolver. Entry-level
//! rejections do not stop the remaining entries; decoding or I/O failures
//! stop the archive. An entry is never written over the archive it comes
//! from.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use crate::config::ConflictPolicy;
use crate::copy::CopyBuffer;
use crate::copy::copy_with_buffer;
use crate::error::ArchiveError;
use crate::error::Severity;
use crate::formats;
use crate::formats::RawEntry;
use crate::locks::PathLocks;
use crate::report::Outcome;
use crate::report::UnitKind;
use crate::report::UnitRecord;
use crate::types::ArchiveFile;
use crate::types::EntryType;
use crate::types::ExtractionTarget;
use crate::types::SafePath;

use super::conflict;
use super::conflict::ConflictRecord;
use super::conflict::Resolution;

/// Write buffer capacity for extracted files (64KB).
const WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// Statistics and problems collected while extracting one archive.
#[derive(Debug, Default)]
pub struct ExtractionOutcome {
    /// Files written.
    pub entries_written: usize,
    /// Directories created.
    pub directories_created: usize,
    /// Bytes written to disk.
    pub bytes_written: u64,
    /// Conflicts met while applying entries.
    pub conflicts: Vec<ConflictRecord>,
    /// Entries refused by the path-safety checks or the strict policy.
    pub rejected: Vec<ArchiveError>,
    /// Non-fatal problems.
    pub warnings: Vec<String>,
    /// Failure that stopped the archive, if any.
    pub error: Option<ArchiveError>,
    /// The archive file was removed after extraction.
    pub original_deleted: bool,
}

impl ExtractionOutcome {
    /// Returns `true` when every entry was applied and nothing failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.rejected.is_empty()
    }

    /// Converts the outcome into a report record.
    #[must_use]
    pub fn into_record(self) -> UnitRecord {
        let outcome = if let Some(err) = &self.error {
            Outcome::failed(err, Severity::Error)
        } else if let Some(first) = self.rejected.first() {
            let message = if self.rejected.len() == 1 {
                first.to_string()
            } else {
                format!("{first} (and {} more rejected entries)", self.rejected.len() - 1)
            };
            Outcome::failed(&message, Severity::Error)
        } else {
            Outcome::Success
        };

        let mut record = UnitRecord::new(UnitKind::Archive, outcome);
        record.entries_written = self.entries_written;
        record.directories_created = self.directories_created;
        record.bytes_written = self.bytes_written;
        record.conflicts = self.conflicts;
        record.warnings = self.warnings;
        record
    }
}

/// Extracts archives into target directories.
///
/// Extraction into one target is serialized through the shared
/// [`PathLocks`]; archives with different targets run independently.
///
/// # Examples
///
/// ```no_run
/// use deckprep_core::config::ConflictPolicy;
/// use deckprep_core::extraction::ArchiveExtractor;
/// use deckprep_core::locks::PathLocks;
/// use deckprep_core::types::{ArchiveFile, ExtractionTarget};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let locks = PathLocks::new();
/// let extractor = ArchiveExtractor::new(ConflictPolicy::LastWriteWins, &locks);
///
/// let archive = ArchiveFile::from_path("/data/bundle.zip").ok_or("not an archive")?;
/// let target = ExtractionTarget::new("/data")?;
/// let outcome = extractor.extract(&archive, &target, false);
/// println!("{} files written", outcome.entries_written);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ArchiveExtractor<'a> {
    policy: ConflictPolicy,
    locks: &'a PathLocks,
}

/// Mutable state for one archive.
struct ExtractionState<'a> {
    target: &'a ExtractionTarget,
    /// Canonical path of the archive being read.
    source: PathBuf,
    outcome: ExtractionOutcome,
    /// Directories created by this archive; merging into them is no conflict.
    created_dirs: HashSet<PathBuf>,
    buffer: CopyBuffer,
}

impl<'a> ArchiveExtractor<'a> {
    /// Creates an extractor sharing the run's lock table.
    #[must_use]
    pub const fn new(policy: ConflictPolicy, locks: &'a PathLocks) -> Self {
        Self { policy, locks }
    }

    /// Extracts `archive` into `target`.
    ///
    /// Never returns an error: failures are carried in the outcome so that
    /// one archive cannot affect its siblings. With `delete_original`, the
    /// archive is removed only after a fully successful extraction.
    pub fn extract(
        &self,
        archive: &ArchiveFile,
        target: &ExtractionTarget,
        delete_original: bool,
    ) -> ExtractionOutcome {
        let _target_lock = self.locks.acquire(target.as_path());
        log::debug!(
            "extracting {} into {}",
            archive.path().display(),
            target.as_path().display()
        );

        let mut state = ExtractionState::new(target, archive.path());

        match formats::open(archive) {
            Ok(mut handler) => {
                let result = handler.for_each_entry(&mut |entry| {
                    match self.apply_entry(entry, &mut state) {
                        Err(err) if err.is_entry_level() => {
                            log::warn!("rejected entry: {err}");
                            state.outcome.rejected.push(err);
                            Ok(())
                        }
                        other => other,
                    }
                });
                state.outcome.warnings.extend(handler.take_warnings());
                if let Err(err) = result {
                    state.outcome.error = Some(err);
                }
            }
            Err(err) => state.outcome.error = Some(err),
        }

        let mut outcome = state.outcome;
        if let Some(err) = &outcome.error {
            log::error!("{}: {err}", archive.path().display());
        } else if !outcome.rejected.is_empty() {
            log::error!(
                "{}: {} entries rejected",
                archive.path().display(),
                outcome.rejected.len()
            );
        } else {
            log::info!(
                "extracted {} ({} files, {} bytes)",
                archive.path().display(),
                outcome.entries_written,
                outcome.bytes_written
            );
            if delete_original {
                delete_archive(archive.path(), &mut outcome);
            }
        }
        outcome
    }

    fn apply_entry(
        &self,
        entry: RawEntry<'_>,
        state: &mut ExtractionState<'_>,
    ) -> Result<(), ArchiveError> {
        if entry.entry_type == EntryType::Directory && SafePath::is_target_root(&entry.path) {
            log::debug!("{}: names the target itself, nothing to do", entry.path.display());
            return Ok(());
        }
        let safe_path = SafePath::validate(&entry.path)?;

        if !state.prepare_ancestors(&safe_path)? {
            return Ok(());
        }

        let dest = state.target.join(&safe_path);
        if entry.entry_type == EntryType::File && state.is_source(&dest) {
            return Err(ArchiveError::OverwritesSource {
                path: safe_path.into_path_buf(),
            });
        }
        let resolution = conflict::resolve(&dest, entry.entry_type)?;
        log::debug!("{safe_path}: {resolution:?}");

        match (resolution, entry.entry_type) {
            (Resolution::ProceedFresh, EntryType::Directory) => {
                std::fs::create_dir(&dest)?;
                state.created_dirs.insert(dest);
                state.outcome.directories_created += 1;
            }
            (Resolution::ProceedFresh, EntryType::File) => {
                state.write_file(entry.reader, &dest, true)?;
            }
            (Resolution::Overwrite, _) if self.policy == ConflictPolicy::Strict => {
                return Err(ArchiveError::ConflictRefused {
                    path: safe_path.into_path_buf(),
                });
            }
            (resolution, _) => {
                let is_own_dir = matches!(resolution, Resolution::MergeInto(_))
                    && state.created_dirs.contains(&dest);
                if !is_own_dir {
                    state.note_conflict(&resolution, safe_path.as_path());
                }
                if resolution == Resolution::Overwrite {
                    state.write_file(entry.reader, &dest, false)?;
                }
            }
        }
        Ok(())
    }
}

impl<'a> ExtractionState<'a> {
    fn new(target: &'a ExtractionTarget, archive: &Path) -> Self {
        Self {
            target,
            source: archive
                .canonicalize()
                .unwrap_or_else(|_| archive.to_path_buf()),
            outcome: ExtractionOutcome::default(),
            created_dirs: HashSet::new(),
            buffer: CopyBuffer::new(),
        }
    }

    /// Returns `true` if `dest` is the archive being extracted.
    fn is_source(&self, dest: &Path) -> bool {
        dest == self.source || dest.canonicalize().is_ok_and(|resolved| resolved == self.source)
    }

    /// Creates or merges every ancestor of `safe_path`.
    ///
    /// Returns `false` when an ancestor is occupied by something that is not
    /// a directory; the entry is then skipped.
    fn prepare_ancestors(&mut self, safe_path: &SafePath) -> Result<bool, ArchiveError> {
        for ancestor in safe_path.ancestors() {
            let dir = self.target.as_path().join(ancestor);
            match conflict::resolve(&dir, EntryType::Directory)? {
                Resolution::ProceedFresh => {
                    std::fs::create_dir(&dir)?;
                    self.created_dirs.insert(dir);
                    self.outcome.directories_created += 1;
                }
                Resolution::MergeInto(_) => {}
                blocked => {
                    self.note_conflict(&blocked, ancestor);
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn note_conflict(&mut self, resolution: &Resolution, entry_path: &Path) {
        if let Some(record) = resolution.to_record(entry_path) {
            log::warn!("conflict: {record}");
            self.outcome.conflicts.push(record);
        }
    }

    /// Streams one file entry to `dest`. A failed fresh write leaves no file.
    fn write_file(
        &mut self,
        reader: &mut dyn Read,
        dest: &Path,
        fresh: bool,
    ) -> Result<(), ArchiveError> {
        let file = File::create(dest)?;
        let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);
        let result = copy_with_buffer(reader, &mut writer, &mut self.buffer).and_then(|written| {
            writer.flush()?;
            Ok(written)
        });
        drop(writer);

        match result {
            Ok(written) => {
                self.outcome.entries_written += 1;
                self.outcome.bytes_written = self.outcome.bytes_written.saturating_add(written);
                Ok(())
            }
            Err(err) => {
                if fresh && let Err(cleanup) = std::fs::remove_file(dest) {
                    log::warn!(
                        "failed to remove partial file {}: {cleanup}",
                        dest.display()
                    );
                }
                Err(err.into())
            }
        }
    }
}

fn delete_archive(path: &Path, outcome: &mut ExtractionOutcome) {
    match std::fs::remove_file(path) {
        Ok(()) => {
            log::info!("deleted {}", path.display());
            outcome.original_deleted = true;
        }
        Err(err) => {
            let message = format!("failed to delete {}: {err}", path.display());
            log::warn!("{message}");
            outcome.warnings.push(message);
        }
    }
}
