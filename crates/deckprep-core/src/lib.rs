//! Batch preparation of slide decks delivered inside archives.
//!
//! `deckprep-core` walks a directory tree, extracts every ZIP and RAR archive
//! it finds (with path-traversal checks before any write and explicit
//! handling of name conflicts), and then removes the last slide of every
//! PPTX deck under a backup that is restored if anything goes wrong.
//!
//! Failures are isolated per unit: one corrupt archive or deck never stops
//! the others, and everything ends up in a [`RunReport`].
//!
//! # Examples
//!
//! ```no_run
//! use deckprep_core::{run_batch, RunConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RunConfig::default().with_delete_original(true);
//! let report = run_batch("/data/inbox", &config)?;
//! for (path, _, failure) in report.failures() {
//!     eprintln!("{}: {}", path.display(), failure.message);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod copy;
pub mod discovery;
pub mod document;
pub mod error;
pub mod extraction;
pub mod formats;
pub mod locks;
pub mod orchestrator;
pub mod report;
pub mod types;

#[doc(hidden)]
pub mod test_utils;

pub use config::RunConfig;
pub use error::ArchiveError;
pub use error::DocumentError;
pub use error::Error;
pub use error::Result;
pub use error::SetupError;
pub use orchestrator::CancellationToken;
pub use orchestrator::Orchestrator;
pub use orchestrator::run_batch;
pub use report::NoopProgress;
pub use report::ProgressCallback;
pub use report::RunReport;
