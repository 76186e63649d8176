//! Batch run driver.
//!
//! A run moves through [`RunPhase`]s in a fixed order: archives are
//! discovered and extracted (repeatedly, in [`RescanMode::UntilStable`]),
//! then slide decks are discovered and mutated. Only setup problems abort a
//! run; every unit failure ends up in the [`RunReport`].

use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Instant;

use parking_lot::Mutex;
use rayon::ThreadPool;
use rayon::prelude::*;

use crate::config::RescanMode;
use crate::config::RunConfig;
use crate::discovery::DiscoveryOptions;
use crate::discovery::discover;
use crate::discovery::discover_documents;
use crate::document::DeckCodec;
use crate::document::DocumentMutator;
use crate::document::PptxCodec;
use crate::error::ArchiveError;
use crate::error::SetupError;
use crate::error::Severity;
use crate::extraction::ArchiveExtractor;
use crate::locks::PathLocks;
use crate::report::NoopProgress;
use crate::report::Outcome;
use crate::report::ProgressCallback;
use crate::report::RunReport;
use crate::report::UnitKind;
use crate::report::UnitRecord;
use crate::types::ArchiveFile;
use crate::types::ExtractionTarget;

/// Stage of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPhase {
    /// Not started.
    Idle,
    /// Enumerating archives.
    Discovering,
    /// Extracting the archives found by the last discovery pass.
    Extracting,
    /// Enumerating slide decks.
    DiscoveringDocuments,
    /// Removing the last slide of every deck.
    Mutating,
    /// Finished; the report is final.
    Done,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Discovering => write!(f, "discovering archives"),
            Self::Extracting => write!(f, "extracting"),
            Self::DiscoveringDocuments => write!(f, "discovering documents"),
            Self::Mutating => write!(f, "removing slides"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Shared flag that stops a run from scheduling more units.
///
/// Units already in flight run to completion; units never started get no
/// report record.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Runs a whole batch: extraction, then slide removal.
///
/// # Examples
///
/// ```no_run
/// use deckprep_core::{NoopProgress, Orchestrator, RunConfig};
///
/// # fn main() -> Result<(), deckprep_core::SetupError> {
/// let orchestrator = Orchestrator::new(RunConfig::default().with_delete_original(true));
/// let report = orchestrator.run("/data/inbox", &NoopProgress)?;
/// println!("{} units processed, {} failed", report.len(), report.failures().count());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Orchestrator<C = PptxCodec> {
    config: RunConfig,
    codec: C,
    locks: PathLocks,
    cancel: CancellationToken,
    phase: Mutex<RunPhase>,
}

impl Orchestrator<PptxCodec> {
    /// Creates an orchestrator for PPTX decks.
    #[must_use]
    pub fn new(config: RunConfig) -> Self {
        Self::with_codec(config, PptxCodec)
    }
}

impl<C: DeckCodec> Orchestrator<C> {
    /// Creates an orchestrator with a custom deck codec.
    #[must_use]
    pub fn with_codec(config: RunConfig, codec: C) -> Self {
        Self {
            config,
            codec,
            locks: PathLocks::new(),
            cancel: CancellationToken::new(),
            phase: Mutex::new(RunPhase::Idle),
        }
    }

    /// Uses an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this orchestrator's runs.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The run configuration.
    #[must_use]
    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Current phase of the active (or last) run.
    #[must_use]
    pub fn phase(&self) -> RunPhase {
        *self.phase.lock()
    }

    /// Processes everything below `root`.
    ///
    /// # Errors
    ///
    /// Returns a [`SetupError`] if `root` is missing or not a directory, the
    /// explicit extraction target is unusable, or the worker pool cannot be
    /// started. Nothing has been touched in that case.
    pub fn run(
        &self,
        root: impl AsRef<Path>,
        progress: &dyn ProgressCallback,
    ) -> Result<RunReport, SetupError> {
        let started = Instant::now();
        let root = validate_root(root.as_ref())?;
        let target = self.explicit_target()?;
        let pool = self.worker_pool()?;

        log::info!(
            "processing {} with {} worker(s)",
            root.display(),
            self.config.parallelism
        );

        let mut report = RunReport::new();
        if self.config.extract_archives {
            self.extract_phase(&root, target.as_ref(), pool.as_ref(), progress, &mut report);
        }
        if self.config.mutate_documents && !self.cancel.is_cancelled() {
            self.mutate_phase(&root, target.as_ref(), pool.as_ref(), progress, &mut report);
        }

        report.duration = started.elapsed();
        report.cancelled = self.cancel.is_cancelled();
        if report.cancelled {
            log::warn!("run cancelled; unscheduled units were not processed");
        }
        self.enter(RunPhase::Done, 0, progress);
        progress.on_complete();
        Ok(report)
    }

    fn explicit_target(&self) -> Result<Option<ExtractionTarget>, SetupError> {
        self.config
            .target_dir
            .as_ref()
            .map(|dir| {
                ExtractionTarget::new(dir.clone()).map_err(|err| SetupError::InvalidTarget {
                    path: dir.clone(),
                    reason: err.to_string(),
                })
            })
            .transpose()
    }

    fn worker_pool(&self) -> Result<Option<ThreadPool>, SetupError> {
        let workers = self.config.parallelism.get();
        if workers == 1 {
            return Ok(None);
        }
        rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("deckprep-worker-{index}"))
            .build()
            .map(Some)
            .map_err(|err| SetupError::WorkerPool(err.to_string()))
    }

    fn enter(&self, phase: RunPhase, total: usize, progress: &dyn ProgressCallback) {
        *self.phase.lock() = phase;
        log::debug!("entering phase: {phase}");
        progress.on_phase_start(phase, total);
    }

    /// Directories scanned after extraction: the root, plus an explicit
    /// target that lies outside it.
    fn output_roots(root: &Path, target: Option<&ExtractionTarget>) -> Vec<PathBuf> {
        let mut roots = vec![root.to_path_buf()];
        if let Some(target) = target
            && !target.as_path().starts_with(root)
        {
            roots.push(target.as_path().to_path_buf());
        }
        roots
    }

    fn extract_phase(
        &self,
        root: &Path,
        target: Option<&ExtractionTarget>,
        pool: Option<&ThreadPool>,
        progress: &dyn ProgressCallback,
        report: &mut RunReport,
    ) {
        let options = DiscoveryOptions::from(&self.config);
        let mut processed: HashSet<PathBuf> = HashSet::new();

        for pass in 1..=self.config.pass_limit() {
            if self.cancel.is_cancelled() {
                break;
            }
            self.enter(RunPhase::Discovering, 0, progress);

            let roots = if pass == 1 {
                vec![root.to_path_buf()]
            } else {
                Self::output_roots(root, target)
            };
            let archives: Vec<ArchiveFile> = roots
                .iter()
                .flat_map(|dir| discover(dir, options))
                .filter(|archive| processed.insert(archive.path().to_path_buf()))
                .collect();
            report.passes = pass;

            if archives.is_empty() {
                log::debug!("pass {pass}: no new archives");
                break;
            }
            log::info!("pass {pass}: {} archive(s) found", archives.len());

            self.enter(RunPhase::Extracting, archives.len(), progress);
            let records = self.run_units(pool, &archives, progress, |archive| {
                (archive.path().to_path_buf(), self.extract_one(archive, target))
            });
            for (path, record) in records {
                report.record(path, record);
            }

            if self.config.rescan == RescanMode::SinglePass {
                break;
            }
        }
    }

    fn extract_one(&self, archive: &ArchiveFile, target: Option<&ExtractionTarget>) -> UnitRecord {
        let base = target.map_or_else(|| archive.parent_dir(), ExtractionTarget::as_path);
        let (target, created) = match self.resolve_target(archive, base) {
            Ok(resolved) => resolved,
            Err(err) => {
                log::error!("{}: {err}", archive.path().display());
                return UnitRecord::new(UnitKind::Archive, Outcome::failed(&err, Severity::Error));
            }
        };

        let record = ArchiveExtractor::new(self.config.conflict_policy, &self.locks)
            .extract(archive, &target, self.config.delete_original)
            .into_record();
        if created && record.outcome.is_failure() {
            // only succeeds while empty; partial output is kept
            let _ = std::fs::remove_dir(target.as_path());
        }
        record
    }

    /// Picks the directory an archive extracts into. With `into_stem` this is
    /// `<base>/<stem>`, created on demand; the flag reports whether it was.
    fn resolve_target(
        &self,
        archive: &ArchiveFile,
        base: &Path,
    ) -> Result<(ExtractionTarget, bool), ArchiveError> {
        if !self.config.into_stem {
            return Ok((ExtractionTarget::new(base)?, false));
        }
        let dir = base.join(archive.stem());
        let created = match std::fs::create_dir(&dir) {
            Ok(()) => true,
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => false,
            Err(err) => return Err(err.into()),
        };
        log::debug!("{} extracts into {}", archive.path().display(), dir.display());
        Ok((ExtractionTarget::new(dir)?, created))
    }

    fn mutate_phase(
        &self,
        root: &Path,
        target: Option<&ExtractionTarget>,
        pool: Option<&ThreadPool>,
        progress: &dyn ProgressCallback,
        report: &mut RunReport,
    ) {
        self.enter(RunPhase::DiscoveringDocuments, 0, progress);
        let options = DiscoveryOptions::from(&self.config);
        let mut seen = HashSet::new();
        let documents: Vec<PathBuf> = Self::output_roots(root, target)
            .iter()
            .flat_map(|dir| discover_documents(dir, options))
            .filter(|path| seen.insert(path.clone()))
            .collect();
        log::info!("{} document(s) found", documents.len());

        self.enter(RunPhase::Mutating, documents.len(), progress);
        let mutator = DocumentMutator::with_codec(&self.codec, &self.locks);
        let records = self.run_units(pool, &documents, progress, |path| {
            (path.clone(), mutator.process(path))
        });
        for (path, record) in records {
            report.record(path, record);
        }
    }

    /// Runs `work` for every unit, sequentially or on the pool, honouring
    /// cancellation before each unit. Results keep the input order.
    fn run_units<T, F>(
        &self,
        pool: Option<&ThreadPool>,
        units: &[T],
        progress: &dyn ProgressCallback,
        work: F,
    ) -> Vec<(PathBuf, UnitRecord)>
    where
        T: Sync,
        F: Fn(&T) -> (PathBuf, UnitRecord) + Sync,
    {
        let run = |unit: &T| {
            if self.cancel.is_cancelled() {
                return None;
            }
            let (path, record) = work(unit);
            progress.on_unit_complete(&path, &record);
            Some((path, record))
        };

        match pool {
            Some(pool) => pool.install(|| units.par_iter().filter_map(&run).collect()),
            None => units.iter().filter_map(&run).collect(),
        }
    }
}

fn validate_root(root: &Path) -> Result<PathBuf, SetupError> {
    let metadata = match std::fs::metadata(root) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(SetupError::RootNotFound {
                path: root.to_path_buf(),
            });
        }
        Err(err) => return Err(err.into()),
    };
    if !metadata.is_dir() {
        return Err(SetupError::NotADirectory {
            path: root.to_path_buf(),
        });
    }
    Ok(root.canonicalize()?)
}

/// Runs one batch with default PPTX handling and no progress reporting.
///
/// # Errors
///
/// Returns a [`SetupError`] if the run cannot start.
///
/// # Examples
///
/// ```no_run
/// use deckprep_core::{run_batch, RunConfig};
///
/// # fn main() -> Result<(), deckprep_core::SetupError> {
/// let report = run_batch("/data/inbox", &RunConfig::default())?;
/// assert!(!report.cancelled);
/// # Ok(())
/// # }
/// ```
pub fn run_batch(root: impl AsRef<Path>, config: &RunConfig) -> Result<RunReport, SetupError> {
    Orchestrator::new(config.clone()).run(root, &NoopProgress)
}
