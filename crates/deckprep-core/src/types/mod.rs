//! Type-safe wrappers used by extraction and discovery.
//!
//! Path types are validated upon construction and cannot be created from
//! raw paths without going through validation.

pub mod archive_file;
pub mod dest_dir;
pub mod entry_type;
pub mod safe_path;

pub use archive_file::ArchiveFile;
pub use archive_file::ArchiveKind;
pub use dest_dir::ExtractionTarget;
pub use entry_type::EntryType;
pub use safe_path::SafePath;
