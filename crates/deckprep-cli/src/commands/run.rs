//! Run command implementation.

use crate::cli::RunArgs;
use crate::error::convert_setup_error;
use crate::output::OutputFormatter;
use crate::progress::CliProgress;
use anyhow::Result;
use deckprep_core::CancellationToken;
use deckprep_core::NoopProgress;
use deckprep_core::Orchestrator;
use deckprep_core::ProgressCallback;
use deckprep_core::RunReport;

/// Processes the directory and prints the report.
///
/// Returns the report so the caller can pick the exit status. Setup
/// failures come back as errors; unit failures are part of the report.
pub fn execute(
    args: &RunArgs,
    formatter: &dyn OutputFormatter,
    show_progress: bool,
) -> Result<RunReport> {
    let config = args.to_config();
    let token = CancellationToken::new();
    install_interrupt_handler(&token, formatter);

    let orchestrator = Orchestrator::new(config).with_cancellation(token);

    // Use progress bar if TTY is detected (not quiet, not JSON, is terminal)
    let report = if show_progress && CliProgress::should_show() {
        let progress = CliProgress::new();
        run_with(&orchestrator, args, &progress)?
    } else {
        run_with(&orchestrator, args, &NoopProgress)?
    };

    if report.cancelled {
        formatter.format_warning("interrupted; units that had not started were left untouched");
    }
    formatter.format_run_result(&args.root, &report)?;

    Ok(report)
}

fn run_with(
    orchestrator: &Orchestrator,
    args: &RunArgs,
    progress: &dyn ProgressCallback,
) -> Result<RunReport> {
    orchestrator
        .run(&args.root, progress)
        .map_err(convert_setup_error)
}

/// First Ctrl+C stops scheduling new units; in-flight units finish.
fn install_interrupt_handler(token: &CancellationToken, formatter: &dyn OutputFormatter) {
    let token = token.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        log::warn!("interrupt received; finishing units in progress");
        token.cancel();
    }) {
        formatter.format_warning(&format!("Ctrl+C handling unavailable: {err}"));
    }
}
