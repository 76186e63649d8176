//! Archive extraction: conflict decisions and the extraction engine.

pub mod conflict;
pub mod engine;

pub use conflict::ConflictRecord;
pub use conflict::ConflictResolution;
pub use conflict::ExistingKind;
pub use conflict::Resolution;
pub use engine::ArchiveExtractor;
pub use engine::ExtractionOutcome;
