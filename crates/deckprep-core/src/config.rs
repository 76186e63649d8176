//! Run configuration.

use std::num::NonZeroUsize;
use std::path::PathBuf;

/// What to do when an extracted file lands on an existing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Overwrite the existing file and record the conflict.
    #[default]
    LastWriteWins,
    /// Refuse the entry and fail the archive.
    Strict,
}

/// Order in which each directory listing is visited during discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscoveryOrder {
    /// Sort entries by file name.
    #[default]
    Lexicographic,
    /// Sort entries by modification time, oldest first, then by name.
    OldestFirst,
}

/// Whether archives created by extraction are picked up in the same run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RescanMode {
    /// Discover once, extract what was found.
    #[default]
    SinglePass,
    /// Repeat discovery and extraction until no unprocessed archive is left.
    UntilStable,
}

/// Configuration for a batch run.
///
/// # Examples
///
/// ```
/// use deckprep_core::RunConfig;
/// use deckprep_core::config::ConflictPolicy;
///
/// let config = RunConfig::default()
///     .with_delete_original(true)
///     .with_conflict_policy(ConflictPolicy::Strict);
/// assert!(config.delete_original);
/// assert_eq!(config.parallelism.get(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Delete each archive after it was fully extracted.
    pub delete_original: bool,

    /// Extract every archive into this directory instead of its parent.
    pub target_dir: Option<PathBuf>,

    /// Extract each archive into a subdirectory named after its file stem
    /// (`a.zip` → `a/`) under the chosen target.
    pub into_stem: bool,

    /// Number of units processed concurrently.
    pub parallelism: NonZeroUsize,

    /// Overwrite handling for file-over-file conflicts.
    pub conflict_policy: ConflictPolicy,

    /// Single pass or repeat until no new archives appear.
    pub rescan: RescanMode,

    /// Upper bound on discovery passes in [`RescanMode::UntilStable`].
    pub max_passes: usize,

    /// Directory listing order.
    pub order: DiscoveryOrder,

    /// Descend into subdirectories.
    pub recursive: bool,

    /// Run the extraction phase.
    pub extract_archives: bool,

    /// Run the slide-removal phase.
    pub mutate_documents: bool,
}

impl Default for RunConfig {
    /// Default values:
    /// - `delete_original`: false
    /// - `target_dir`: none (archive's parent directory)
    /// - `into_stem`: false
    /// - `parallelism`: 1 (sequential)
    /// - `conflict_policy`: last write wins
    /// - `rescan`: single pass
    /// - `max_passes`: 8
    /// - `order`: lexicographic
    /// - `recursive`: true
    /// - both phases enabled
    fn default() -> Self {
        Self {
            delete_original: false,
            target_dir: None,
            into_stem: false,
            parallelism: NonZeroUsize::MIN,
            conflict_policy: ConflictPolicy::default(),
            rescan: RescanMode::default(),
            max_passes: 8,
            order: DiscoveryOrder::default(),
            recursive: true,
            extract_archives: true,
            mutate_documents: true,
        }
    }
}

impl RunConfig {
    /// Sets whether archives are deleted after successful extraction.
    #[must_use]
    pub fn with_delete_original(mut self, delete: bool) -> Self {
        self.delete_original = delete;
        self
    }

    /// Sets an explicit extraction target shared by all archives.
    #[must_use]
    pub fn with_target_dir(mut self, target: Option<PathBuf>) -> Self {
        self.target_dir = target;
        self
    }

    /// Sets whether each archive gets its own `<stem>/` directory.
    #[must_use]
    pub fn with_into_stem(mut self, into_stem: bool) -> Self {
        self.into_stem = into_stem;
        self
    }

    /// Sets the worker count. Zero is treated as one.
    #[must_use]
    pub fn with_parallelism(mut self, workers: usize) -> Self {
        self.parallelism = NonZeroUsize::new(workers).unwrap_or(NonZeroUsize::MIN);
        self
    }

    /// Sets the conflict policy.
    #[must_use]
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    /// Sets the rescan mode.
    #[must_use]
    pub fn with_rescan(mut self, rescan: RescanMode) -> Self {
        self.rescan = rescan;
        self
    }

    /// Sets the maximum number of discovery passes.
    #[must_use]
    pub fn with_max_passes(mut self, passes: usize) -> Self {
        self.max_passes = passes.max(1);
        self
    }

    /// Sets the directory listing order.
    #[must_use]
    pub fn with_order(mut self, order: DiscoveryOrder) -> Self {
        self.order = order;
        self
    }

    /// Sets whether subdirectories are scanned.
    #[must_use]
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Enables or disables the extraction phase.
    #[must_use]
    pub fn with_extract_archives(mut self, enabled: bool) -> Self {
        self.extract_archives = enabled;
        self
    }

    /// Enables or disables the slide-removal phase.
    #[must_use]
    pub fn with_mutate_documents(mut self, enabled: bool) -> Self {
        self.mutate_documents = enabled;
        self
    }

    /// Number of passes the extraction phase may run.
    #[must_use]
    pub fn pass_limit(&self) -> usize {
        match self.rescan {
            RescanMode::SinglePass => 1,
            RescanMode::UntilStable => self.max_passes.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RunConfig::default();
        assert!(!config.delete_original);
        assert!(!config.into_stem);
        assert_eq!(config.parallelism.get(), 1);
        assert_eq!(config.conflict_policy, ConflictPolicy::LastWriteWins);
        assert_eq!(config.rescan, RescanMode::SinglePass);
        assert!(config.recursive);
        assert!(config.extract_archives && config.mutate_documents);
    }

    #[test]
    fn test_zero_parallelism_is_sequential() {
        let config = RunConfig::default().with_parallelism(0);
        assert_eq!(config.parallelism.get(), 1);
    }

    #[test]
    fn test_pass_limit() {
        let config = RunConfig::default().with_max_passes(5);
        assert_eq!(config.pass_limit(), 1);

        let config = config.with_rescan(RescanMode::UntilStable);
        assert_eq!(config.pass_limit(), 5);

        let config = config.with_max_passes(0);
        assert_eq!(config.pass_limit(), 1);
    }
}
