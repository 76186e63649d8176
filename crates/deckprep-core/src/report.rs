//! Run reporting.

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Severity;
use crate::extraction::ConflictRecord;
use crate::orchestrator::RunPhase;

/// Kind of unit a report record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    /// One archive extraction.
    Archive,
    /// One slide-deck mutation.
    Document,
}

impl std::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Archive => write!(f, "archive"),
            Self::Document => write!(f, "document"),
        }
    }
}

/// Why a unit was skipped without being changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The deck has no slides to remove.
    EmptyDeck,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyDeck => write!(f, "empty"),
        }
    }
}

/// Failure details kept in the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Human-readable reason.
    pub message: String,
    /// How urgently the failure needs attention.
    pub severity: Severity,
}

/// Final state of one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The unit completed.
    Success,
    /// The unit was left untouched.
    Skipped(SkipReason),
    /// The unit failed; siblings were not affected.
    Failed(Failure),
}

impl Outcome {
    /// Builds a failed outcome from any error with the given severity.
    pub fn failed(err: &impl std::fmt::Display, severity: Severity) -> Self {
        Self::Failed(Failure {
            message: err.to_string(),
            severity,
        })
    }

    /// Returns `true` for [`Outcome::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns `true` for [`Outcome::Failed`].
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Short status label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Skipped(_) => "skipped",
            Self::Failed(_) => "failed",
        }
    }
}

/// Everything recorded about one processed unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitRecord {
    /// Archive or document.
    pub kind: UnitKind,
    /// Final state.
    pub outcome: Outcome,
    /// Files written (archives only).
    pub entries_written: usize,
    /// Directories created (archives only).
    pub directories_created: usize,
    /// Bytes written to disk (archives only).
    pub bytes_written: u64,
    /// Conflicts met while extracting (archives only).
    pub conflicts: Vec<ConflictRecord>,
    /// Non-fatal problems.
    pub warnings: Vec<String>,
}

impl UnitRecord {
    /// Creates a record with no statistics.
    #[must_use]
    pub fn new(kind: UnitKind, outcome: Outcome) -> Self {
        Self {
            kind,
            outcome,
            entries_written: 0,
            directories_created: 0,
            bytes_written: 0,
            conflicts: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Returns whether any warnings were generated.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Succeeded/skipped/failed totals for one unit kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    /// Units that succeeded.
    pub succeeded: usize,
    /// Units that were skipped.
    pub skipped: usize,
    /// Units that failed.
    pub failed: usize,
}

impl OutcomeCounts {
    fn add(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Success => self.succeeded += 1,
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }

    /// Total units counted.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }
}

/// Report of a whole run: one record per processed unit.
///
/// Records are only added by the orchestrator while the run is in progress;
/// callers receive the finished report and can only read it.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    units: BTreeMap<PathBuf, UnitRecord>,
    /// Wall-clock duration of the run.
    pub duration: Duration,
    /// Number of archive discovery passes performed.
    pub passes: usize,
    /// The run was cancelled before every unit was scheduled.
    pub cancelled: bool,
}

impl RunReport {
    /// Creates a new empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record. A path that already has a record keeps the first one.
    pub(crate) fn record(&mut self, path: PathBuf, record: UnitRecord) {
        if let Some(existing) = self.units.get(&path) {
            log::warn!(
                "{} already has a {} record; ignoring the later one",
                path.display(),
                existing.kind
            );
            return;
        }
        self.units.insert(path, record);
    }

    /// Looks up the record for a unit.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&UnitRecord> {
        self.units.get(path)
    }

    /// Iterates over all records in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&Path, &UnitRecord)> {
        self.units.iter().map(|(path, record)| (path.as_path(), record))
    }

    /// Iterates over the records of one kind.
    pub fn of_kind(&self, kind: UnitKind) -> impl Iterator<Item = (&Path, &UnitRecord)> {
        self.iter().filter(move |(_, record)| record.kind == kind)
    }

    /// Iterates over failed units with their failure details.
    pub fn failures(&self) -> impl Iterator<Item = (&Path, &UnitRecord, &Failure)> {
        self.iter().filter_map(|(path, record)| match &record.outcome {
            Outcome::Failed(failure) => Some((path, record, failure)),
            _ => None,
        })
    }

    /// Totals for one unit kind.
    #[must_use]
    pub fn counts(&self, kind: UnitKind) -> OutcomeCounts {
        let mut counts = OutcomeCounts::default();
        for (_, record) in self.of_kind(kind) {
            counts.add(&record.outcome);
        }
        counts
    }

    /// Total number of conflicts recorded across all archives.
    #[must_use]
    pub fn conflict_count(&self) -> usize {
        self.units.values().map(|record| record.conflicts.len()).sum()
    }

    /// Returns whether any unit failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.units.values().any(|record| record.outcome.is_failure())
    }

    /// Returns whether any failure needs manual recovery.
    #[must_use]
    pub fn has_critical_failures(&self) -> bool {
        self.failures()
            .any(|(_, _, failure)| failure.severity == Severity::Critical)
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns whether nothing was processed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Callback trait for progress reporting during a run.
///
/// Callbacks may be invoked from several worker threads at once, so
/// implementations must be `Sync` and take `&self`.
///
/// # Examples
///
/// ```
/// use deckprep_core::ProgressCallback;
/// use deckprep_core::orchestrator::RunPhase;
/// use deckprep_core::report::UnitRecord;
/// use std::path::Path;
///
/// struct PrintProgress;
///
/// impl ProgressCallback for PrintProgress {
///     fn on_phase_start(&self, phase: RunPhase, total: usize) {
///         println!("{phase}: {total} units");
///     }
///
///     fn on_unit_complete(&self, path: &Path, record: &UnitRecord) {
///         println!("{} {}", record.outcome.label(), path.display());
///     }
///
///     fn on_complete(&self) {}
/// }
/// ```
pub trait ProgressCallback: Sync {
    /// Called when the orchestrator enters a phase.
    ///
    /// `total` is the number of units the phase will process, or zero for
    /// discovery phases.
    fn on_phase_start(&self, phase: RunPhase, total: usize);

    /// Called after a unit produced its record.
    fn on_unit_complete(&self, path: &Path, record: &UnitRecord);

    /// Called once when the run is done.
    fn on_complete(&self);
}

/// No-op implementation of `ProgressCallback`.
#[derive(Debug, Default)]
pub struct NoopProgress;

impl ProgressCallback for NoopProgress {
    fn on_phase_start(&self, _phase: RunPhase, _total: usize) {}

    fn on_unit_complete(&self, _path: &Path, _record: &UnitRecord) {}

    fn on_complete(&self) {}
}
