//! Progress bar implementation for CLI runs.

use console::Term;
use deckprep_core::ProgressCallback;
use deckprep_core::orchestrator::RunPhase;
use deckprep_core::report::UnitRecord;
use indicatif::ProgressBar;
use indicatif::ProgressState;
use indicatif::ProgressStyle;
use std::fmt::Write;
use std::path::Path;

/// CLI progress bar wrapper implementing `ProgressCallback`.
///
/// One bar is reused for every phase: it is reset with the phase's unit
/// count when the phase starts. Workers update it concurrently, which
/// `ProgressBar` supports through `&self`.
pub struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    /// Creates a hidden-until-used progress bar.
    #[must_use]
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);

        // Template: "extracting [████████░░░░] 42/100 units (12s)"
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg:>16} [{bar:40.cyan/blue}] {pos}/{len} units ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .with_key("eta", |state: &ProgressState, w: &mut dyn Write| {
                    write!(w, "{}", humanize_duration(state.eta())).unwrap_or(());
                })
                .progress_chars("█▓░"),
        );

        Self { bar }
    }

    /// Checks if we should show progress (TTY detection).
    #[must_use]
    pub fn should_show() -> bool {
        Term::stderr().is_term()
    }
}

impl Default for CliProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for CliProgress {
    fn on_phase_start(&self, phase: RunPhase, total: usize) {
        self.bar.set_message(phase.to_string());
        // discovery phases report 0 and must not inherit the previous count
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.reset_eta();
    }

    fn on_unit_complete(&self, path: &Path, record: &UnitRecord) {
        if record.outcome.is_failure() {
            self.bar.suspend(|| log::debug!("failed: {}", path.display()));
        }
        self.bar.inc(1);
    }

    fn on_complete(&self) {
        self.bar.finish_and_clear();
    }
}

/// Converts duration to human-readable format.
fn humanize_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h{}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}
