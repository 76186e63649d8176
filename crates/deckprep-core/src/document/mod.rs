//! Slide-deck documents: codec, transactional backup and slide removal.
//!
//! [`DocumentMutator`] is the entry point used by the orchestrator. It wraps
//! [`remove_last_slide`] in a [`BackupGuard`] so that a document is either
//! fully updated or left exactly as it was.

pub mod backup;
pub mod codec;
pub mod mutator;
pub mod pptx;
pub mod remover;

pub use backup::BackupGuard;
pub use backup::backup_path;
pub use codec::DeckCodec;
pub use codec::SlideDeck;
pub use codec::SlideRef;
pub use mutator::DocumentMutator;
pub use pptx::PptxCodec;
pub use pptx::PptxDeck;
pub use remover::RemovalOutcome;
pub use remover::remove_last_slide;
