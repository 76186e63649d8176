//! Slide-deck codec seam.
//!
//! The remover works against these traits so that the container format can
//! be swapped (and failures injected in tests) without touching the backup
//! and replace logic.

use crate::error::DocumentError;

/// Identity of one slide within a deck.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlideRef {
    /// Numeric slide id, unique within the deck.
    pub id: u32,
    /// Relationship id linking the deck to the slide part.
    pub rel_id: String,
    /// Package part holding the slide.
    pub part: String,
}

impl std::fmt::Display for SlideRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "slide {} ({})", self.id, self.part)
    }
}

/// Opens serialized decks.
pub trait DeckCodec: Send + Sync {
    /// Parses a deck from its serialized bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid deck.
    fn open(&self, bytes: Vec<u8>) -> Result<Box<dyn SlideDeck>, DocumentError>;
}

impl<C: DeckCodec + ?Sized> DeckCodec for &C {
    fn open(&self, bytes: Vec<u8>) -> Result<Box<dyn SlideDeck>, DocumentError> {
        (**self).open(bytes)
    }
}

/// An opened deck.
pub trait SlideDeck {
    /// Slides in presentation order.
    fn slides(&self) -> &[SlideRef];

    /// Removes one slide and everything that only it references.
    ///
    /// # Errors
    ///
    /// Returns an error if the slide is not part of the deck or the deck
    /// structure cannot be rewritten.
    fn remove(&mut self, slide: &SlideRef) -> Result<(), DocumentError>;

    /// Serializes the deck with all removals applied.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn to_bytes(&mut self) -> Result<Vec<u8>, DocumentError>;
}
