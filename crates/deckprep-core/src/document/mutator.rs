//! Transactional per-document slide removal.

use std::path::Path;

use crate::error::DocumentError;
use crate::locks::PathLocks;
use crate::report::Outcome;
use crate::report::SkipReason;
use crate::report::UnitKind;
use crate::report::UnitRecord;

use super::backup::BackupGuard;
use super::codec::DeckCodec;
use super::pptx::PptxCodec;
use super::remover::RemovalOutcome;
use super::remover::remove_last_slide;

/// Removes the last slide of one document at a time, under a backup.
///
/// Every failure is turned into a [`UnitRecord`]; nothing escapes
/// [`process`](DocumentMutator::process).
#[derive(Debug)]
pub struct DocumentMutator<'a, C = PptxCodec> {
    codec: C,
    locks: &'a PathLocks,
}

impl<'a> DocumentMutator<'a, PptxCodec> {
    /// Creates a mutator for PPTX decks.
    #[must_use]
    pub const fn new(locks: &'a PathLocks) -> Self {
        Self {
            codec: PptxCodec,
            locks,
        }
    }
}

impl<'a, C: DeckCodec> DocumentMutator<'a, C> {
    /// Creates a mutator with a custom codec.
    #[must_use]
    pub const fn with_codec(codec: C, locks: &'a PathLocks) -> Self {
        Self { codec, locks }
    }

    /// Removes the last slide of `path`.
    ///
    /// - slides present: the last one is removed, the backup deleted, and
    ///   the record is `Success`;
    /// - no slides: the file is left byte-identical, `Skipped(EmptyDeck)`;
    /// - any failure: the original is restored and the record is `Failed`.
    ///   If the restore fails too, the backup stays on disk and the failure
    ///   is critical.
    pub fn process(&self, path: &Path) -> UnitRecord {
        let guard = match BackupGuard::acquire(path, self.locks) {
            Ok(guard) => guard,
            Err(err) => return failed(path, &err),
        };
        let backup = guard.backup().to_path_buf();

        let outcome = match remove_last_slide(path, &self.codec) {
            Ok(removal) => removal,
            Err(err) => return failed(path, &guard.rollback(err)),
        };

        let mut record = match &outcome {
            RemovalOutcome::Removed(slide) => {
                log::info!("removed {slide} from {}", path.display());
                UnitRecord::new(UnitKind::Document, Outcome::Success)
            }
            RemovalOutcome::Empty => {
                log::info!("{} has no slides; left unchanged", path.display());
                UnitRecord::new(UnitKind::Document, Outcome::Skipped(SkipReason::EmptyDeck))
            }
        };

        if let Err(err) = guard.commit() {
            let message = format!("failed to remove backup {}: {err}", backup.display());
            log::warn!("{message}");
            record.warnings.push(message);
        }
        record
    }
}

fn failed(path: &Path, err: &DocumentError) -> UnitRecord {
    if err.needs_manual_recovery() {
        log::error!("{}: {err}", path.display());
    } else {
        log::error!("failed to process {}: {err}", path.display());
    }
    UnitRecord::new(UnitKind::Document, Outcome::failed(err, err.severity()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::document::backup::backup_path;
    use crate::document::codec::SlideDeck;
    use crate::document::codec::SlideRef;
    use crate::document::pptx::PptxDeck;
    use crate::error::Severity;
    use crate::report::Failure;
    use crate::test_utils::create_test_pptx;
    use tempfile::TempDir;

    struct FailingCodec;

    impl DeckCodec for FailingCodec {
        fn open(&self, _bytes: Vec<u8>) -> Result<Box<dyn SlideDeck>, DocumentError> {
            Err(DocumentError::InvalidDocument("injected".into()))
        }
    }

    /// Corrupts the deck on disk, then panics mid-parse.
    struct PanickingCodec(std::path::PathBuf);

    impl DeckCodec for PanickingCodec {
        fn open(&self, _bytes: Vec<u8>) -> Result<Box<dyn SlideDeck>, DocumentError> {
            std::fs::write(&self.0, b"half written").unwrap();
            panic!("codec blew up");
        }
    }

    fn deck(slides: usize) -> (TempDir, std::path::PathBuf) {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("deck.pptx");
        std::fs::write(&path, create_test_pptx(slides)).unwrap();
        (temp, path)
    }

    fn slides(path: &Path) -> Vec<SlideRef> {
        PptxDeck::parse(std::fs::read(path).unwrap())
            .unwrap()
            .slides()
            .to_vec()
    }

    #[test]
    fn test_success_removes_one_slide_and_backup() {
        let (_temp, path) = deck(3);
        let locks = PathLocks::new();
        let record = DocumentMutator::new(&locks).process(&path);

        assert_eq!(record.outcome, Outcome::Success);
        assert_eq!(slides(&path).len(), 2);
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn test_empty_deck_skipped_byte_identical() {
        let (_temp, path) = deck(0);
        let before = std::fs::read(&path).unwrap();
        let locks = PathLocks::new();
        let record = DocumentMutator::new(&locks).process(&path);

        assert_eq!(record.outcome, Outcome::Skipped(SkipReason::EmptyDeck));
        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn test_failure_restores_original() {
        let (_temp, path) = deck(2);
        let before = std::fs::read(&path).unwrap();
        let locks = PathLocks::new();
        let record = DocumentMutator::with_codec(FailingCodec, &locks).process(&path);

        let Outcome::Failed(Failure { message, severity }) = record.outcome else {
            panic!("expected failure");
        };
        assert!(message.contains("injected"));
        assert_eq!(severity, Severity::Error);
        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn test_codec_panic_restores_original_on_unwind() {
        let (_temp, path) = deck(2);
        let before = std::fs::read(&path).unwrap();
        let locks = PathLocks::new();
        let mutator = DocumentMutator::with_codec(PanickingCodec(path.clone()), &locks);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            mutator.process(&path)
        }));

        assert!(result.is_err());
        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert!(!backup_path(&path).exists());
        assert!(locks.try_acquire(&path).is_some());
    }

    #[test]
    fn test_leftover_backup_fails_unit() {
        let (_temp, path) = deck(2);
        std::fs::write(backup_path(&path), "from an earlier crash").unwrap();
        let locks = PathLocks::new();
        let record = DocumentMutator::new(&locks).process(&path);

        assert!(record.outcome.is_failure());
        assert_eq!(slides(&path).len(), 2);
        assert_eq!(
            std::fs::read_to_string(backup_path(&path)).unwrap(),
            "from an earlier crash"
        );
    }

    #[test]
    fn test_not_idempotent() {
        let (_temp, path) = deck(3);
        let locks = PathLocks::new();
        let mutator = DocumentMutator::new(&locks);
        mutator.process(&path);
        mutator.process(&path);
        let remaining = slides(&path);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, 256);
    }
}
